use crate::address::{Address, TargetAddr};
use crate::config::Config;
use crate::error::{Result, Socks5Error};
use crate::messages::{ConnectionRequest, write_connection_reply, write_failure_reply};
use crate::protocol::{AddressType, Command, ReplyCode};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// TransportProtocol is what a request leaves behind for the relay stage
#[derive(Debug)]
pub enum TransportProtocol {
    /// CONNECT succeeded and the success reply has been sent
    Tcp(TcpStream),
    /// UDP ASSOCIATE was requested. No association exists and no reply was
    /// sent; the session ends here
    UdpAssociate,
}

/// handle_socks_request reads the client request, validates it, dials the
/// target for CONNECT and answers the client.
///
/// Decode failures return without a reply. Policy rejections and dial
/// failures are answered with a failure reply before the error is returned.
pub async fn handle_socks_request<S>(stream: &mut S, config: &Config) -> Result<TransportProtocol>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = ConnectionRequest::read_from(stream).await?;

    // IPv6 is parsed so the stream stays in sync, but never served
    if request.address_type() == AddressType::IPv6 {
        let _ = write_failure_reply(stream, ReplyCode::AddrTypeUnsupported).await;
        return Err(Socks5Error::AddressTypeNotSupported(AddressType::IPv6 as u8));
    }

    match request.command() {
        Some(Command::Connect) => {
            let outbound = handle_connect_cmd(stream, &request.target, config).await?;
            Ok(TransportProtocol::Tcp(outbound))
        }
        Some(Command::UdpAssociate) => {
            warn!(
                "UDP ASSOCIATE to {} requested; not implemented, closing without reply",
                request.target
            );
            Ok(TransportProtocol::UdpAssociate)
        }
        _ => {
            let _ = write_failure_reply(stream, ReplyCode::CommandNotSupported).await;
            Err(Socks5Error::CommandNotSupported(request.command))
        }
    }
}

// ================
// CONNECT COMMAND
// ================

/// handle_connect_cmd dials `target` and reports the outcome to the client.
/// On success the reply carries the local address of the outbound socket
async fn handle_connect_cmd<S>(
    stream: &mut S,
    target: &TargetAddr,
    config: &Config,
) -> Result<TcpStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match dial(target, config.dial_timeout()).await {
        Ok(outbound) => {
            let local_addr = outbound.local_addr()?;
            debug!("connected to {target} via {local_addr}");

            write_connection_reply(stream, ReplyCode::Succeeded, local_addr).await?;

            Ok(outbound)
        }
        Err(e) => {
            let _ = write_failure_reply(stream, ReplyCode::ConnectionRefused).await;
            Err(e.into())
        }
    }
}

/// dial opens a TCP connection to `target`, resolving domain names with the
/// system resolver. Without a timeout the dial waits as long as the OS does
async fn dial(target: &TargetAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let connect = async {
        match &target.address {
            Address::IPv4(ip) => TcpStream::connect((*ip, target.port)).await,
            Address::DomainName(domain) => TcpStream::connect((domain.as_str(), target.port)).await,
            Address::IPv6(ip) => TcpStream::connect((*ip, target.port)).await,
        }
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, connect).await.map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("dial {target} timed out after {limit:?}"),
            )
        })?,
        None => connect.await,
    }
}
