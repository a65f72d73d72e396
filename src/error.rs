use thiserror::Error;

/// Socks5Error covers every way a single client session can fail, plus the
/// startup configuration error
#[derive(Error, Debug)]
pub enum Socks5Error {
    #[error("protocol version not supported: {0:#04x}")]
    VersionNotSupported(u8),

    #[error("sub-negotiation method version not supported: {0:#04x}")]
    MethodVersionNotSupported(u8),

    #[error("request command not supported: {0:#04x}")]
    CommandNotSupported(u8),

    #[error("invalid reserved field: {0:#04x}")]
    InvalidReservedField(u8),

    #[error("address type not supported: {0:#04x}")]
    AddressTypeNotSupported(u8),

    #[error("no acceptable authentication method offered")]
    MethodNotSupported,

    #[error("username/password authentication failed")]
    PasswordAuthFailure,

    #[error("username/password method selected but no credential checker set")]
    PasswordCheckerNotSet,

    #[error("authentication method {0:#04x} cannot be served")]
    UnsupportedAuthMethod(u8),

    #[error("invalid utf-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Socks5Error {
    /// is_eof reports whether the peer closed the stream mid-message
    pub fn is_eof(&self) -> bool {
        matches!(self, Socks5Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

pub type Result<T> = std::result::Result<T, Socks5Error>;
