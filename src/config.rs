use crate::auth::CredentialChecker;
use crate::error::{Result, Socks5Error};
use crate::protocol::AuthMethod;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Config is the per-server, read-only settings every connection task sees
#[derive(Clone)]
pub struct Config {
    auth_method: AuthMethod,
    credential_checker: Option<Arc<dyn CredentialChecker>>,
    dial_timeout: Option<Duration>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The single method the server accepts
    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    pub fn credential_checker(&self) -> Option<&Arc<dyn CredentialChecker>> {
        self.credential_checker.as_ref()
    }

    /// Upper bound for the outbound dial. `None` blocks until the OS gives up
    pub fn dial_timeout(&self) -> Option<Duration> {
        self.dial_timeout
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_method: AuthMethod::NoAuth,
            credential_checker: None,
            dial_timeout: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("auth_method", &self.auth_method)
            .field("credential_checker", &self.credential_checker.is_some())
            .field("dial_timeout", &self.dial_timeout)
            .finish()
    }
}

/// ConfigBuilder assembles a Config and validates it once at startup
#[derive(Default)]
pub struct ConfigBuilder {
    auth_method: Option<AuthMethod>,
    credential_checker: Option<Arc<dyn CredentialChecker>>,
    dial_timeout: Option<Duration>,
}

impl ConfigBuilder {
    pub fn auth_method(mut self, method: AuthMethod) -> Self {
        self.auth_method = Some(method);
        self
    }

    pub fn credential_checker<C>(mut self, checker: C) -> Self
    where
        C: CredentialChecker + 'static,
    {
        self.credential_checker = Some(Arc::new(checker));
        self
    }

    /// dial_timeout sets the outbound dial bound; zero means unbounded
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn build(self) -> Result<Config> {
        let auth_method = self.auth_method.unwrap_or(AuthMethod::NoAuth);

        match auth_method {
            AuthMethod::NoAuth => {}
            AuthMethod::UserPass if self.credential_checker.is_none() => {
                return Err(Socks5Error::PasswordCheckerNotSet);
            }
            AuthMethod::UserPass => {}
            other => return Err(Socks5Error::UnsupportedAuthMethod(other as u8)),
        }

        Ok(Config {
            auth_method,
            credential_checker: self.credential_checker,
            dial_timeout: self.dial_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_no_auth_unbounded() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.auth_method(), AuthMethod::NoAuth);
        assert!(config.credential_checker().is_none());
        assert_eq!(config.dial_timeout(), None);
    }

    #[test]
    fn test_userpass_requires_checker() {
        let err = Config::builder()
            .auth_method(AuthMethod::UserPass)
            .build()
            .unwrap_err();
        assert!(matches!(err, Socks5Error::PasswordCheckerNotSet));

        let config = Config::builder()
            .auth_method(AuthMethod::UserPass)
            .credential_checker(|u: &str, p: &str| u == "admin" && p == "123456")
            .build()
            .unwrap();
        assert!(config.credential_checker().unwrap().check("admin", "123456"));
    }

    #[test]
    fn test_gssapi_rejected() {
        let err = Config::builder()
            .auth_method(AuthMethod::Gssapi)
            .build()
            .unwrap_err();
        assert!(matches!(err, Socks5Error::UnsupportedAuthMethod(0x01)));
    }

    #[test]
    fn test_zero_dial_timeout_is_unbounded() {
        let config = Config::builder()
            .dial_timeout(Duration::ZERO)
            .build()
            .unwrap();
        assert_eq!(config.dial_timeout(), None);

        let config = Config::builder()
            .dial_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(config.dial_timeout(), Some(Duration::from_secs(5)));
    }
}
