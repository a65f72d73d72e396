use crate::{
    auth,
    commands::{self, TransportProtocol},
    config::Config,
    relay,
};
use anyhow::{Context, Result, bail};
use std::{net::SocketAddr, sync::Arc};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Socks5Server represents a SOCKS5 server and houses related
/// configuration data
pub struct Socks5Server {
    pub listen_addr: String,
    config: Arc<Config>,
    listener: Option<TcpListener>,
}

/// Socks5Server implementation block
impl Socks5Server {
    /// new is a constructor for the Socks5Server type. The server starts
    /// out without authentication
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            config: Arc::new(Config::default()),
            listener: None,
        }
    }

    /// with_config replaces the connection settings
    pub fn with_config(mut self, config: Config) -> Self {
        // Arc allows every connection task to share one Config
        self.config = Arc::new(config);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// bind to the listen address and return the bound address
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if self.listener.is_some() {
            bail!("already bound to {}", self.listen_addr);
        }

        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.listen_addr))?;
        let addr = listener.local_addr()?;

        info!("SOCKS5 proxy listening on {addr}");

        self.listener = Some(listener);
        Ok(addr)
    }

    /// run accepts connections forever, binding first if needed. Each client
    /// gets its own task; nothing a client does can stop the loop
    pub async fn run(&mut self) -> Result<()> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => {
                self.bind().await?;
                self.listener
                    .take()
                    .context("listener missing after bind")?
            }
        };

        loop {
            let (inbound, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("accept failed: {e}");
                    continue;
                }
            };

            let config = Arc::clone(&self.config);

            tokio::spawn(async move {
                info!("new client: {peer_addr}");

                if let Err(e) = handle_connection(inbound, &config).await {
                    error!("connection from {peer_addr} failed: {e:#}");
                }
            });
        }
    }
}

/// handle_connection drives one client through negotiation, request handling
/// and relaying. The client stream is dropped, and so closed, on every return
pub async fn handle_connection<S>(mut stream: S, config: &Config) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    auth::negotiate_auth(&mut stream, config)
        .await
        .context("authentication failed")?;

    let outbound = match commands::handle_socks_request(&mut stream, config)
        .await
        .context("request failed")?
    {
        TransportProtocol::Tcp(outbound) => outbound,
        TransportProtocol::UdpAssociate => {
            warn!("closing session after unimplemented UDP ASSOCIATE");
            return Ok(());
        }
    };

    let target = outbound.peer_addr()?;
    let stats = relay::relay(stream, outbound)
        .await
        .with_context(|| format!("relay to {target} failed"))?;

    info!(
        "connection to {target} closed: {} bytes from client, {} bytes from server",
        stats.from_client, stats.from_target
    );

    Ok(())
}
