use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// RelayStats counts the bytes moved in each direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub from_client: u64,
    pub from_target: u64,
}

/// relay copies bytes between `client` and `target` until the target side
/// is done.
///
/// client -> target runs on its own task; target -> client runs inline and
/// decides when the relay ends. Both streams are dropped before this
/// returns, on every path, which unblocks whatever the other task was
/// waiting on.
pub async fn relay<C, T>(client: C, target: T) -> io::Result<RelayStats>
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut target_read, mut target_write) = tokio::io::split(target);

    let upstream = tokio::spawn(async move {
        let n = tokio::io::copy(&mut client_read, &mut target_write).await?;
        // Pass the client's half-close on to the target
        target_write.shutdown().await?;
        Ok::<_, io::Error>(n)
    });

    let downstream = tokio::io::copy(&mut target_read, &mut client_write).await;

    // Dropping the aborted task releases its halves of both streams
    upstream.abort();
    let from_client = match upstream.await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            debug!("client -> target copy failed: {e}");
            0
        }
        Err(_) => {
            debug!("client -> target copy cut short");
            0
        }
    };

    drop(target_read);
    drop(client_write);

    Ok(RelayStats {
        from_client,
        from_target: downstream?,
    })
}
