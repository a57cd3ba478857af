//! Hermod demo server binary.
//!
//! Accepts WebSocket connections and serves a single echo endpoint,
//! exercising the session multiplexer end to end without any generated
//! schema code.
//!
//! # Usage
//!
//! ```bash
//! hermod-server --listen 127.0.0.1:8080
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use hermod_server::transport_ws::WebSocketTransport;
use hermod_server::{ConnectionConfig, HandlerError, Server};
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Hermod demo server: a single echo endpoint over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "hermod-server")]
#[command(about = "Hermod session-multiplexing RPC server (echo demo)")]
struct Args {
    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

const ECHO_ENDPOINT: u16 = 1;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let server: Arc<Server<()>> = Arc::new(Server::new());
    server.register_endpoint(ECHO_ENDPOINT, echo)?;

    let listener = TcpListener::bind(args.listen).await?;
    tracing::info!(addr = %args.listen, "hermod-server listening");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            tracing::info!(%peer_addr, "accepted connection");
            let upgraded = match tokio_tungstenite::accept_async(stream).await {
                Ok(upgraded) => upgraded,
                Err(err) => {
                    tracing::warn!(%peer_addr, error = %err, "websocket upgrade failed");
                    return;
                },
            };
            let transport = Arc::new(WebSocketTransport::new(upgraded));
            let connection = server.accept(transport, ConnectionConfig::default());
            if let Err(err) = connection.run().await {
                tracing::warn!(%peer_addr, error = %err, "connection ended with an error");
            }
        });
    }
}

async fn echo(
    mut ctx: hermod_server::HandlerContext<()>,
    sink: hermod_server::ResponseSink,
) -> Result<(), HandlerError> {
    while let Some(payload) = ctx.inbound.recv().await {
        sink.send(payload).await.map_err(HandlerError::from)?;
    }
    Ok(())
}
