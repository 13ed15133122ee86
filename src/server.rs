use crate::command::SharedEngine;
use crate::config::SharedConfig;
use crate::connection::Connection;
use crate::error::{RespiteError, RespiteResult};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Accept clients until Ctrl-C or until `shutdown` is cancelled.
pub async fn run_server(
    engine: SharedEngine,
    config: SharedConfig,
    shutdown: CancellationToken,
) -> RespiteResult<()> {
    let addr = config.read().await.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Respite server listening on {addr}");

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = result?;
                debug!("New connection from {peer_addr}");

                let engine = engine.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, engine, shutdown).await {
                        debug!("Connection error from {peer_addr}: {e}");
                    }
                    debug!("Connection closed: {peer_addr}");
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                shutdown.cancel();
                return Ok(());
            }
            _ = shutdown.cancelled() => {
                info!("Shutdown requested");
                return Ok(());
            }
        }
    }
}

/// Serve requests on one stream, answering each before reading the next.
pub async fn handle_connection<S>(
    stream: S,
    engine: SharedEngine,
    shutdown: CancellationToken,
) -> RespiteResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut conn = Connection::new(stream);

    loop {
        let request = tokio::select! {
            request = conn.read_request() => request,
            _ = shutdown.cancelled() => return Ok(()),
        };

        match request {
            Ok(Some(value)) => {
                let response = engine.handle(value).await;
                conn.write_value(&response).await?;
            }
            Ok(None) => return Ok(()),
            Err(e) => {
                let err = RespiteError::Protocol(e);
                debug!("Client {} sent a malformed request: {err}", conn.id);
                conn.write_value(&err.to_resp()).await?;
                return Err(err);
            }
        }
    }
}
