//! PROXY-aware TCP relay
//!
//! Accepts connections, strips the PROXY v2 header, logs the original
//! client and relays the rest of the stream to the configured upstream.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{copy_bidirectional, AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::proxy::{ProxiedStream, StreamHeaderReader, StreamSource};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Bind the configured address and serve until the listener fails
pub async fn run(config: Config) -> Result<(), BoxError> {
    let listener = TcpListener::bind(config.server.bind).await?;
    info!("PROXY v2 relay listening on {}", listener.local_addr()?);
    if config.server.upstream.is_none() {
        warn!("no upstream configured, connections are closed after the header");
    }

    serve(listener, Arc::new(config)).await
}

/// Accept loop over an already-bound listener
pub async fn serve(listener: TcpListener, config: Arc<Config>) -> Result<(), BoxError> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let config = config.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, &config).await {
                error!(%peer, "connection error: {}", e);
            }
        });
    }
}

/// Decode the header on one connection and relay what follows
pub async fn handle_connection<S>(stream: S, peer: SocketAddr, config: &Config) -> Result<(), BoxError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let pp = &config.proxy_protocol;
    let mut source = StreamSource::with_chunk_size(stream, pp.chunk_size);

    let prefix = if pp.enabled {
        let mut reader = StreamHeaderReader::new(pp.reader_options());
        match reader
            .read_header_timeout(&mut source, pp.timeout_duration())
            .await
        {
            Ok(proxied) => {
                info!(
                    %peer,
                    client = ?proxied.client_addr(),
                    command = ?proxied.header.command,
                    family = %proxied.header.family,
                    "PROXY header accepted"
                );
                proxied.remainder
            }
            Err(e) => {
                warn!(%peer, error = %e, "rejecting connection");
                return Err(e.into());
            }
        }
    } else {
        Bytes::new()
    };

    let Some(upstream_addr) = config.server.upstream else {
        debug!(%peer, "no upstream, closing");
        return Ok(());
    };

    let mut downstream = ProxiedStream::new(prefix, source);
    let mut upstream = TcpStream::connect(upstream_addr).await?;
    let (to_upstream, to_client) = copy_bidirectional(&mut downstream, &mut upstream).await?;

    debug!(%peer, to_upstream, to_client, "connection finished");
    Ok(())
}
