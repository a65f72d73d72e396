use crate::config::Config;
use crate::error::{Result, Socks5Error};
use crate::messages::{AuthGreeting, AuthSelection, PasswordReply, PasswordRequest};
use crate::protocol::{AuthMethod, AuthStatus};
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// CredentialChecker decides whether a username/password pair is valid.
///
/// It is called concurrently from every connection task; implementations
/// that keep mutable state must synchronize it themselves.
pub trait CredentialChecker: Send + Sync {
    fn check(&self, username: &str, password: &str) -> bool;
}

impl<F> CredentialChecker for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn check(&self, username: &str, password: &str) -> bool {
        self(username, password)
    }
}

/// UserPass holds a single username/password credential as dictated
/// server-side
#[derive(Clone)]
pub struct UserPass {
    pub username: String,
    pub password: String,
}

impl CredentialChecker for UserPass {
    fn check(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }
}

/// UserTable maps usernames to passwords. It is read-only once the server
/// is running, so lookups need no lock
#[derive(Clone, Default)]
pub struct UserTable {
    users: HashMap<String, String>,
}

impl UserTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.users.insert(username.into(), password.into());
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl<U, P> FromIterator<(U, P)> for UserTable
where
    U: Into<String>,
    P: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (U, P)>>(iter: I) -> Self {
        Self {
            users: iter
                .into_iter()
                .map(|(u, p)| (u.into(), p.into()))
                .collect(),
        }
    }
}

impl CredentialChecker for UserTable {
    fn check(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|expected| expected == password)
    }
}

/// negotiate_auth runs method negotiation and, when the configured method is
/// username/password, the RFC 1929 sub-negotiation.
///
/// The configured method must appear in the client's list verbatim. The
/// client's preference order is ignored.
pub async fn negotiate_auth<S>(stream: &mut S, config: &Config) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // A garbled greeting leaves nothing trustworthy to reply to
    let greeting = AuthGreeting::read_from(stream).await?;

    let method = config.auth_method();

    if !greeting.offers(method as u8) {
        debug!(
            "client offered {:?}, server requires {:?}",
            greeting.methods, method
        );
        // The connection is closed right after, so a failed write changes nothing
        let _ = AuthSelection::new(AuthMethod::NoAcceptable as u8)
            .write_to(stream)
            .await;
        return Err(Socks5Error::MethodNotSupported);
    }

    AuthSelection::new(method as u8).write_to(stream).await?;

    match method {
        AuthMethod::UserPass => {
            let checker = config
                .credential_checker()
                .ok_or(Socks5Error::PasswordCheckerNotSet)?;
            authenticate_userpass(stream, checker.as_ref()).await
        }
        _ => Ok(()),
    }
}

/// authenticate_userpass reads the credentials and answers with the verdict
async fn authenticate_userpass<S>(stream: &mut S, checker: &dyn CredentialChecker) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = PasswordRequest::read_from(stream).await?;

    // Answer with the sub-negotiation version the client used
    if !checker.check(&request.username, &request.password) {
        debug!("rejected credentials for user {:?}", request.username);
        let _ = PasswordReply::new(request.version, AuthStatus::Failure)
            .write_to(stream)
            .await;
        return Err(Socks5Error::PasswordAuthFailure);
    }

    PasswordReply::new(request.version, AuthStatus::Success)
        .write_to(stream)
        .await?;

    debug!("authenticated user {:?}", request.username);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn no_auth() -> Config {
        Config::builder().build().unwrap()
    }

    fn userpass() -> Config {
        let users: UserTable = [("admin", "123456"), ("lisi", "abde")].into_iter().collect();
        Config::builder()
            .auth_method(AuthMethod::UserPass)
            .credential_checker(users)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_auth_selected() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        // no-auth and GSSAPI offered
        client.write_all(&[0x05, 0x02, 0x00, 0x01]).await.unwrap();
        negotiate_auth(&mut server, &no_auth()).await.unwrap();

        let mut buf = [0u8; 2];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x05, 0x00]);
    }

    #[tokio::test]
    async fn test_configured_method_missing() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let err = negotiate_auth(&mut server, &userpass()).await.unwrap_err();
        assert!(matches!(err, Socks5Error::MethodNotSupported));

        drop(server);
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0xFF]);
    }

    #[tokio::test]
    async fn test_empty_method_list_rejected() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        client.write_all(&[0x05, 0x00]).await.unwrap();
        let err = negotiate_auth(&mut server, &no_auth()).await.unwrap_err();
        assert!(matches!(err, Socks5Error::MethodNotSupported));
    }

    #[tokio::test]
    async fn test_truncated_greeting_sends_nothing() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        client.write_all(&[0x05, 0x02, 0x00]).await.unwrap();
        client.shutdown().await.unwrap();
        let err = negotiate_auth(&mut server, &no_auth()).await.unwrap_err();
        assert!(err.is_eof());

        drop(server);
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn test_userpass_success() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        client.write_all(&[0x05, 0x02, 0x00, 0x02]).await.unwrap();
        client.write_all(b"\x01\x05admin\x06123456").await.unwrap();
        negotiate_auth(&mut server, &userpass()).await.unwrap();

        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x05, 0x02, 0x01, 0x00]);
    }

    #[tokio::test]
    async fn test_userpass_wrong_password() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
        client.write_all(b"\x01\x04lisi\x04abcd").await.unwrap();
        let err = negotiate_auth(&mut server, &userpass()).await.unwrap_err();
        assert!(matches!(err, Socks5Error::PasswordAuthFailure));

        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x05, 0x02, 0x01, 0x01]);
    }

    #[tokio::test]
    async fn test_userpass_socks5_subnegotiation_version() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
        client.write_all(b"\x05\x04lisi\x04abde").await.unwrap();
        negotiate_auth(&mut server, &userpass()).await.unwrap();

        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x05, 0x02, 0x05, 0x00]);
    }

    #[test]
    fn test_checkers() {
        let single = UserPass {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        assert!(single.check("user", "pass"));
        assert!(!single.check("user", "other"));

        let mut table = UserTable::new();
        table.insert("zhangsan", "1234");
        assert_eq!(table.len(), 1);
        assert!(table.check("zhangsan", "1234"));
        assert!(!table.check("zhangsan", ""));
        assert!(!table.check("nobody", "1234"));
    }
}
