//! Wire codec for every SOCKS5 message the server reads or writes.
//!
//! Decoders read exactly the bytes a message declares and fail on a short
//! read; there is no lenient or partial parse. Encoders build the whole
//! message and hand it to the sink in a single `write_all`.

use crate::address::TargetAddr;
use crate::error::{Result, Socks5Error};
use crate::protocol::{
    AddressType, AuthStatus, Command, RSV, ReplyCode, SUBNEGOTIATION_VERSION, Version,
};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// AuthGreeting is the client's opening message
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGreeting {
    pub version: u8,
    pub methods: Vec<u8>,
}

impl AuthGreeting {
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await?;

        let version = buf[0];
        let n_methods = buf[1];

        if version != Version::SOCKS5 as u8 {
            return Err(Socks5Error::VersionNotSupported(version));
        }

        // NMETHODS == 0 yields an empty list
        let mut methods = vec![0u8; n_methods as usize];
        reader.read_exact(&mut methods).await?;

        Ok(Self { version, methods })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::with_capacity(2 + self.methods.len());
        buf.push(self.version);
        buf.push(self.methods.len() as u8);
        buf.extend_from_slice(&self.methods);
        writer.write_all(&buf).await?;
        Ok(())
    }

    /// offers reports whether the client listed `method`
    pub fn offers(&self, method: u8) -> bool {
        self.methods.contains(&method)
    }
}

/// AuthSelection is the server's method choice
///
/// ```text
/// +----+--------+
/// |VER | METHOD |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSelection {
    pub version: u8,
    pub method: u8,
}

impl AuthSelection {
    pub fn new(method: u8) -> Self {
        Self {
            version: Version::SOCKS5 as u8,
            method,
        }
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await?;
        Ok(Self {
            version: buf[0],
            method: buf[1],
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&[self.version, self.method]).await?;
        Ok(())
    }
}

/// PasswordRequest is the RFC 1929 username/password sub-negotiation
///
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
/// +----+------+----------+------+----------+
/// ```
///
/// VER is accepted as either 0x01 (RFC 1929) or 0x05, since clients in the
/// wild send both.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordRequest {
    pub version: u8,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for PasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordRequest")
            .field("version", &self.version)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl PasswordRequest {
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let version = reader.read_u8().await?;
        if version != SUBNEGOTIATION_VERSION && version != Version::SOCKS5 as u8 {
            return Err(Socks5Error::MethodVersionNotSupported(version));
        }

        let username = read_length_prefixed(reader, "username").await?;
        let password = read_length_prefixed(reader, "password").await?;

        Ok(Self {
            version,
            username,
            password,
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let username = &self.username.as_bytes()[..self.username.len().min(255)];
        let password = &self.password.as_bytes()[..self.password.len().min(255)];

        let mut buf = Vec::with_capacity(3 + username.len() + password.len());
        buf.push(self.version);
        buf.push(username.len() as u8);
        buf.extend_from_slice(username);
        buf.push(password.len() as u8);
        buf.extend_from_slice(password);
        writer.write_all(&buf).await?;
        Ok(())
    }
}

async fn read_length_prefixed<R>(reader: &mut R, field: &'static str) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u8().await?;
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).await?;
    String::from_utf8(bytes).map_err(|_| Socks5Error::InvalidUtf8 { field })
}

/// PasswordReply is the sub-negotiation verdict
///
/// ```text
/// +----+--------+
/// |VER | STATUS |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordReply {
    pub version: u8,
    pub status: u8,
}

impl PasswordReply {
    pub fn new(version: u8, status: AuthStatus) -> Self {
        Self {
            version,
            status: status as u8,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AuthStatus::Success as u8
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await?;
        Ok(Self {
            version: buf[0],
            status: buf[1],
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&[self.version, self.status]).await?;
        Ok(())
    }
}

/// ConnectionRequest is the client's command
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// CMD is kept as the raw byte so an unknown command can still be answered
/// with a proper reply after the whole request has been consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub version: u8,
    pub command: u8,
    pub target: TargetAddr,
}

impl ConnectionRequest {
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header).await?;

        let [version, command, reserved, atyp] = header;

        if version != Version::SOCKS5 as u8 {
            return Err(Socks5Error::VersionNotSupported(version));
        }
        if reserved != RSV {
            return Err(Socks5Error::InvalidReservedField(reserved));
        }
        let address_type =
            AddressType::from_byte(atyp).ok_or(Socks5Error::AddressTypeNotSupported(atyp))?;

        let target = TargetAddr::read_from(reader, address_type).await?;

        Ok(Self {
            version,
            command,
            target,
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![self.version, self.command, RSV];
        self.target.encode(&mut buf);
        writer.write_all(&buf).await?;
        Ok(())
    }

    pub fn command(&self) -> Option<Command> {
        Command::from_byte(self.command)
    }

    pub fn address_type(&self) -> AddressType {
        self.target.address.address_type()
    }
}

/// ConnectionReply is the server's answer to a ConnectionRequest
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReply {
    pub reply: ReplyCode,
    pub bound: TargetAddr,
}

impl ConnectionReply {
    pub fn new(reply: ReplyCode, bound: SocketAddr) -> Self {
        Self {
            reply,
            bound: bound.into(),
        }
    }

    /// failure builds a reply carrying `reply` and an all-zero IPv4 address
    pub fn failure(reply: ReplyCode) -> Self {
        Self::new(reply, SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![Version::SOCKS5 as u8, self.reply as u8, RSV];
        self.bound.encode(&mut buf);
        buf
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.encode()).await?;
        Ok(())
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header).await?;

        let [version, rep, reserved, atyp] = header;

        if version != Version::SOCKS5 as u8 {
            return Err(Socks5Error::VersionNotSupported(version));
        }
        if reserved != RSV {
            return Err(Socks5Error::InvalidReservedField(reserved));
        }
        let reply = ReplyCode::from_byte(rep).ok_or_else(|| {
            Socks5Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unassigned reply code: {rep:#04x}"),
            ))
        })?;
        let address_type =
            AddressType::from_byte(atyp).ok_or(Socks5Error::AddressTypeNotSupported(atyp))?;

        let bound = TargetAddr::read_from(reader, address_type).await?;

        Ok(Self { reply, bound })
    }
}

/// write_connection_reply writes a reply whose ATYP follows the address
/// family of `bound_addr`
pub async fn write_connection_reply<W>(
    writer: &mut W,
    reply: ReplyCode,
    bound_addr: SocketAddr,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    ConnectionReply::new(reply, bound_addr)
        .write_to(writer)
        .await
}

/// write_failure_reply writes `reply` with a zeroed bound address, for
/// aborts that happen before any outbound socket exists
pub async fn write_failure_reply<W>(writer: &mut W, reply: ReplyCode) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    ConnectionReply::failure(reply).write_to(writer).await
}
