//! TCP accept loop for charge point connections
//!
//! Each accepted socket gets its own task. The upgrade handshake, and with
//! it the gate decision, is bounded by the configured handshake timeout;
//! after a successful upgrade the selected endpoint owns the socket.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ocpp_gate_core::{EndpointRegistry, IdentityDirectory, UpgradeGate};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::endpoint::OcppEndpoint;
use crate::handshake::{admit, Admitted};
use crate::session::SessionStore;

/// Errors running the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Gate server, configured but not yet listening
pub struct GateServer<D> {
    config: ServerConfig,
    handler: ConnectionHandler<D>,
    sessions: SessionStore,
}

impl<D: IdentityDirectory + 'static> GateServer<D> {
    /// Build the endpoint registry from `config.versions` and wire up the gate
    pub fn new(config: ServerConfig, directory: D) -> Self {
        let sessions = SessionStore::new();
        let endpoints = config
            .versions
            .iter()
            .map(|version| OcppEndpoint::new(*version, sessions.clone()))
            .collect();
        let registry = Arc::new(EndpointRegistry::new(endpoints));

        let handler = ConnectionHandler {
            gate: Arc::new(UpgradeGate::new(registry, directory)),
            ws_config: ws_config(&config),
            handshake_timeout: config.handshake_timeout,
        };

        Self {
            config,
            handler,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn gate(&self) -> &UpgradeGate<OcppEndpoint, D> {
        &self.handler.gate
    }

    /// Per-connection handler, for callers that accept sockets themselves
    pub fn handler(&self) -> ConnectionHandler<D> {
        self.handler.clone()
    }

    /// Bind the listening socket
    pub async fn bind(self) -> Result<BoundServer<D>, ServerError> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let protocols: Vec<&str> = self.gate().registry().protocol_tokens().collect();
        info!(
            "Listening on {} for protocols [{}]",
            listener.local_addr()?,
            protocols.join(", ")
        );

        Ok(BoundServer {
            listener,
            handler: self.handler,
        })
    }
}

/// Gate server with a bound listener
pub struct BoundServer<D> {
    listener: TcpListener,
    handler: ConnectionHandler<D>,
}

impl<D: IdentityDirectory + 'static> BoundServer<D> {
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Connections that were already upgraded keep running.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopped accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            debug!("Accepted TCP connection from {}", peer_addr);
                            let handler = self.handler.clone();
                            tokio::spawn(async move {
                                handler.handle(stream, Some(peer_addr)).await;
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
            }
        }
    }
}

/// Runs the handshake for one socket and hands it to the selected endpoint
pub struct ConnectionHandler<D> {
    gate: Arc<UpgradeGate<OcppEndpoint, D>>,
    ws_config: WebSocketConfig,
    handshake_timeout: Duration,
}

impl<D> Clone for ConnectionHandler<D> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            ws_config: self.ws_config.clone(),
            handshake_timeout: self.handshake_timeout,
        }
    }
}

impl<D: IdentityDirectory> ConnectionHandler<D> {
    /// Handshake, then serve until the connection closes
    pub async fn handle<S>(&self, stream: S, peer_addr: Option<SocketAddr>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut admitted: Option<Admitted> = None;

        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let (response, connection) =
                run_gate(|| admit(&self.gate, request, response, peer_addr))?;
            admitted = Some(connection);
            Ok(response)
        };

        let handshake = accept_hdr_async_with_config(stream, callback, Some(self.ws_config.clone()));
        let ws = match tokio::time::timeout(self.handshake_timeout, handshake).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                debug!(?peer_addr, "Handshake failed: {}", e);
                return;
            }
            Err(_) => {
                warn!(?peer_addr, "Handshake timed out after {:?}", self.handshake_timeout);
                return;
            }
        };

        let Some(Admitted { endpoint, context }) = admitted else {
            return;
        };

        endpoint.serve(ws, context).await;
    }
}

/// Run a gate decision from inside the synchronous handshake callback
///
/// The directory lookup may block. On a multi-threaded runtime the worker
/// hands its other tasks to a new thread first; on a current-thread runtime
/// the directory must answer without blocking.
fn run_gate<T>(decide: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(decide)
        }
        _ => decide(),
    }
}

fn ws_config(config: &ServerConfig) -> WebSocketConfig {
    WebSocketConfig {
        max_message_size: Some(config.max_message_size),
        max_frame_size: Some(config.max_frame_size),
        ..Default::default()
    }
}
