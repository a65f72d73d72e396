use crate::error::{Result, Socks5Error};
use crate::protocol::AddressType;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Address represents a network address or domain to be used as the
/// SOCKS5 target address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    IPv4(Ipv4Addr),
    DomainName(String),
    IPv6(Ipv6Addr),
}

/// TargetAddr is an address paired with its port, as carried in
/// DST.ADDR/DST.PORT and BND.ADDR/BND.PORT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddr {
    pub address: Address,
    pub port: u16,
}

impl Address {
    /// address_type returns the ATYP byte this address is encoded with
    pub fn address_type(&self) -> AddressType {
        match self {
            Address::IPv4(_) => AddressType::IPv4,
            Address::DomainName(_) => AddressType::DomainName,
            Address::IPv6(_) => AddressType::IPv6,
        }
    }
}

impl TargetAddr {
    pub fn new(address: Address, port: u16) -> Self {
        Self { address, port }
    }

    /// read_from reads the address and port that follow an ATYP byte.
    /// The payload is sized by `address_type`: 4 bytes, 1+N bytes or 16 bytes,
    /// then a big-endian port
    pub async fn read_from<R>(reader: &mut R, address_type: AddressType) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let address = match address_type {
            AddressType::IPv4 => {
                let mut addr = [0u8; 4];
                reader.read_exact(&mut addr).await?;
                Address::IPv4(Ipv4Addr::from(addr))
            }
            AddressType::DomainName => {
                // First octet in DomainName contains the number of
                // octets to follow
                let len = reader.read_u8().await?;
                let mut domain = vec![0u8; len as usize];
                reader.read_exact(&mut domain).await?;
                let domain = String::from_utf8(domain)
                    .map_err(|_| Socks5Error::InvalidUtf8 { field: "domain name" })?;
                Address::DomainName(domain)
            }
            AddressType::IPv6 => {
                let mut addr = [0u8; 16];
                reader.read_exact(&mut addr).await?;
                Address::IPv6(Ipv6Addr::from(addr))
            }
        };

        let port = reader.read_u16().await?;

        Ok(Self { address, port })
    }

    /// encode appends ATYP, address and port to `buf`.
    /// Domains longer than 255 bytes cannot be framed and are truncated
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.address.address_type() as u8);
        match &self.address {
            Address::IPv4(ip) => buf.extend_from_slice(&ip.octets()),
            Address::DomainName(domain) => {
                let bytes = &domain.as_bytes()[..domain.len().min(u8::MAX as usize)];
                buf.push(bytes.len() as u8);
                buf.extend_from_slice(bytes);
            }
            Address::IPv6(ip) => buf.extend_from_slice(&ip.octets()),
        }
        buf.extend_from_slice(&self.port.to_be_bytes());
    }

    /// to_socket_addr returns the address when it needs no name resolution
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        match &self.address {
            Address::IPv4(ip) => Some(SocketAddr::from((*ip, self.port))),
            Address::IPv6(ip) => Some(SocketAddr::from((*ip, self.port))),
            Address::DomainName(_) => None,
        }
    }
}

impl From<SocketAddr> for TargetAddr {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Self::new(Address::IPv4(*v4.ip()), v4.port()),
            SocketAddr::V6(v6) => Self::new(Address::IPv6(*v6.ip()), v6.port()),
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Address::IPv4(ip) => write!(f, "{ip}:{}", self.port),
            Address::DomainName(domain) => write!(f, "{domain}:{}", self.port),
            Address::IPv6(ip) => write!(f, "[{ip}]:{}", self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_domain_address() {
        let mut input: &[u8] = b"\x0bexample.com\x00\x50";
        let target = TargetAddr::read_from(&mut input, AddressType::DomainName)
            .await
            .unwrap();
        assert_eq!(target.address, Address::DomainName("example.com".to_string()));
        assert_eq!(target.port, 80);
        assert_eq!(target.to_string(), "example.com:80");
        assert!(input.is_empty());
    }

    #[tokio::test]
    async fn test_read_ipv6_address() {
        let mut bytes = Ipv6Addr::LOCALHOST.octets().to_vec();
        bytes.extend_from_slice(&[0x1f, 0x90]);
        let target = TargetAddr::read_from(&mut bytes.as_slice(), AddressType::IPv6)
            .await
            .unwrap();
        assert_eq!(target.address, Address::IPv6(Ipv6Addr::LOCALHOST));
        assert_eq!(target.to_string(), "[::1]:8080");
    }

    #[tokio::test]
    async fn test_short_read_is_error() {
        // Domain claims 5 bytes but only 3 follow
        let mut input: &[u8] = &[0x05, b'a', b'b', b'c'];
        let err = TargetAddr::read_from(&mut input, AddressType::DomainName)
            .await
            .unwrap_err();
        assert!(err.is_eof());

        // Missing port
        let mut input: &[u8] = &[10, 0, 0, 1, 0x00];
        let err = TargetAddr::read_from(&mut input, AddressType::IPv4)
            .await
            .unwrap_err();
        assert!(err.is_eof());
    }

    #[tokio::test]
    async fn test_invalid_utf8_domain() {
        let mut input: &[u8] = &[0x02, 0xff, 0xfe, 0x00, 0x50];
        let err = TargetAddr::read_from(&mut input, AddressType::DomainName)
            .await
            .unwrap_err();
        assert!(matches!(err, Socks5Error::InvalidUtf8 { .. }));
    }

    #[test]
    fn test_encode_ipv4() {
        let target = TargetAddr::from("10.1.2.3:443".parse::<SocketAddr>().unwrap());
        let mut buf = Vec::new();
        target.encode(&mut buf);
        assert_eq!(buf, [0x01, 10, 1, 2, 3, 0x01, 0xbb]);
        assert_eq!(target.to_socket_addr(), Some("10.1.2.3:443".parse().unwrap()));
    }
}
