//! WebSocket relay server
//!
//! Handles the TCP accept loop, the `/ws/{room}` upgrade, and spawns one
//! session task plus one writer pump per connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::connection::ConnectionHandle;
use crate::error::Result;
use crate::registry::{RegistryConfig, RoomRegistry};
use crate::server::config::ServerConfig;
use crate::session::{Session, TransportError};

/// Collaborative room relay server
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<RoomRegistry>,
    next_conn_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            registry: Arc::new(RoomRegistry::with_config(registry_config)),
            next_conn_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the room registry
    ///
    /// External collaborators use this to `announce` into rooms.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "relay server listening");

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "relay server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let _permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(conn = conn_id, peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            let _permit = _permit;

            if let Err(e) = serve_connection(socket, conn_id, registry).await {
                tracing::debug!(conn = conn_id, error = %e, "Connection error");
            }

            tracing::debug!(conn = conn_id, "Connection closed");
        });
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

async fn serve_connection(
    socket: TcpStream,
    conn_id: u64,
    registry: Arc<RoomRegistry>,
) -> Result<()> {
    let mut room_id = None;
    let mut rejected = false;
    let handshake = tokio_tungstenite::accept_hdr_async(socket, |req: &Request, resp: Response| {
        match room_from_path(req.uri().path()) {
            Some(room) => {
                room_id = Some(room.to_owned());
                Ok(resp)
            }
            None => {
                tracing::warn!(
                    conn = conn_id,
                    path = %req.uri().path(),
                    "rejecting upgrade: not a /ws/{{room}} path"
                );
                rejected = true;
                let mut resp = ErrorResponse::new(Some("expected /ws/{room}".to_owned()));
                *resp.status_mut() = StatusCode::NOT_FOUND;
                Err(resp)
            }
        }
    })
    .await;

    let ws = match handshake {
        Ok(ws) => ws,
        // The rejection response was already written to the socket
        Err(_) if rejected => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let Some(room_id) = room_id else {
        return Ok(());
    };

    let (mut sink, stream) = ws.split();
    let (handle, mut outbound_rx) = ConnectionHandle::new(conn_id);

    // Writer pump: drains the handle's queue into the socket. Exits when the
    // session (and registry) have dropped every sender, or on send failure.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let text = String::from_utf8_lossy(&frame).into_owned();
            if sink.send(Message::text(text)).await.is_err() {
                break;
            }
        }
        // Closing an already-closed socket is not a fault
        let _ = sink.close().await;
    });

    let inbound = stream
        .take_while(|item| {
            futures::future::ready(!matches!(item, Ok(Message::Close(_))))
        })
        .filter_map(|item| async move {
            match item {
                Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                // Binary, ping and pong frames carry no events
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::new(e.to_string()))),
            }
        });

    Session::new(registry, room_id, handle)
        .run(Box::pin(inbound))
        .await;

    let _ = writer.await;
    Ok(())
}

fn room_from_path(path: &str) -> Option<&str> {
    let room = path.strip_prefix("/ws/")?;
    let room = room.split('?').next().unwrap_or(room);
    if room.is_empty() || room.contains('/') {
        return None;
    }
    Some(room)
}
