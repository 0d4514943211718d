//! Newline-delimited JSON-RPC transport over TCP.
//!
//! Each line received on a connection is one payload (a single request or a
//! batch). A reply line is written only when the handler produced one.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rpcbase_protocol::{ErrorCode, ErrorObject, RequestContext, RequestId, Response};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::client::ClientConnection;

/// Trait implemented by the dispatch core to process raw payloads.
///
/// Called on a blocking thread for every non-empty line. `Ok(None)` means no
/// reply is due (notifications).
pub trait RequestHandler: Send + Sync + 'static {
    /// Configuration fault that aborts the connection.
    type Error: std::error::Error + Send + Sync + 'static;

    fn handle_payload(
        &self,
        payload: &str,
        context: &RequestContext,
    ) -> Result<Option<String>, Self::Error>;
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Maximum concurrent connections
    pub max_connections: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 7070,
            hostname: "127.0.0.1".into(),
            max_connections: Some(32),
        }
    }
}

/// Shared state for the transport server.
struct AppState<H: RequestHandler> {
    handler: Arc<H>,
    config: TransportConfig,
    client_count: AtomicUsize,
}

/// The transport server — accepts connections and feeds lines to the handler.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Accept loop handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Start the transport server with the given request handler.
    pub async fn start<H: RequestHandler>(
        config: TransportConfig,
        handler: H,
    ) -> Result<Self, TransportError> {
        Self::start_shared(config, Arc::new(handler)).await
    }

    /// Start the transport server with a handler shared with other owners.
    pub async fn start_shared<H: RequestHandler>(
        config: TransportConfig,
        handler: Arc<H>,
    ) -> Result<Self, TransportError> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!("JSON-RPC transport listening on tcp://{}:{}", config.hostname, actual_port);

        let state = Arc::new(AppState {
            handler,
            config,
            client_count: AtomicUsize::new(0),
        });

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            let state = state.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, peer, state).await;
                            });
                        }
                        Err(e) => warn!("Failed to accept connection: {e}"),
                    },
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop accepting connections. Open connections finish on their own.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("JSON-RPC transport stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection Handler
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_connection<H: RequestHandler>(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<AppState<H>>,
) {
    let current = state.client_count.fetch_add(1, Ordering::Relaxed);
    if let Some(max) = state.config.max_connections {
        if current >= max {
            warn!("Connection from {peer} rejected: max connections reached ({max})");
            state.client_count.fetch_sub(1, Ordering::Relaxed);
            return;
        }
    }

    let mut client = ClientConnection::new(uuid::Uuid::new_v4().to_string(), peer);
    info!("Client connected: {} ({peer})", client.id);

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                debug!("Client closed connection: {}", client.id);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Read error for {}: {e}", client.id);
                break;
            }
        }

        let reply = match std::str::from_utf8(&line) {
            Ok(text) if text.trim().is_empty() => continue,
            Ok(text) => {
                client.touch();
                match dispatch(text.trim().to_string(), client.context(), &state.handler).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!("Closing connection {}: {e}", client.id);
                        break;
                    }
                }
            }
            Err(e) => Some(parse_error(&e.to_string())),
        };

        if let Some(mut text) = reply {
            text.push('\n');
            if let Err(e) = writer.write_all(text.as_bytes()).await {
                error!("Failed to send response to {}: {e}", client.id);
                break;
            }
        }
    }

    state.client_count.fetch_sub(1, Ordering::Relaxed);
    info!(
        "Client disconnected: {} after {} payloads (total: {})",
        client.id,
        client.payloads,
        state.client_count.load(Ordering::Relaxed)
    );
}

/// Run the handler on a blocking thread; the core is synchronous and
/// handlers may block.
async fn dispatch<H: RequestHandler>(
    payload: String,
    context: RequestContext,
    handler: &Arc<H>,
) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
    let handler = handler.clone();
    let reply = tokio::task::spawn_blocking(move || handler.handle_payload(&payload, &context)).await??;
    Ok(reply)
}

fn parse_error(details: &str) -> String {
    let error = ErrorObject::new(ErrorCode::ParseError).with_data(json!({ "details": details }));
    Value::from(Response::error(RequestId::Null, error)).to_string()
}
