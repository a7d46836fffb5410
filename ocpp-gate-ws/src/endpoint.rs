//! Per-version OCPP-J endpoints
//!
//! One [`OcppEndpoint`] is registered per served protocol version. Once the
//! gate admits a handshake, the selected endpoint owns the connection until
//! it closes. Message semantics live above this layer: every CALL is
//! answered with `NotImplemented` and malformed frames with the version's
//! format-violation code.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use ocpp_gate_core::{EndpointHandler, HandshakeAttributes, OcppVersion, RegistrationStatus};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::frame::{CallError, ErrorCode, OcppFrame};
use crate::session::{SessionInfo, SessionStore};

/// What an endpoint learns about an admitted connection
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub charge_box_id: String,
    pub registration_status: RegistrationStatus,
    pub attributes: HandshakeAttributes,
    pub peer_addr: Option<SocketAddr>,
}

/// Destination for connections negotiated on one OCPP version
#[derive(Debug, Clone)]
pub struct OcppEndpoint {
    version: OcppVersion,
    sessions: SessionStore,
}

impl EndpointHandler for OcppEndpoint {
    fn protocol_token(&self) -> &str {
        self.version.as_str()
    }
}

impl OcppEndpoint {
    pub fn new(version: OcppVersion, sessions: SessionStore) -> Self {
        Self { version, sessions }
    }

    pub fn version(&self) -> OcppVersion {
        self.version
    }

    /// Own an upgraded connection until it closes
    pub async fn serve<S>(&self, ws: WebSocketStream<S>, ctx: ConnectionContext)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let session = SessionInfo::new(&ctx.charge_box_id, self.version, ctx.peer_addr);
        let session_id = session.session_id;

        let open = self.sessions.register(session).await;
        if open > 1 {
            warn!(
                charge_box_id = %ctx.charge_box_id,
                sessions = open,
                "Station already had an open session"
            );
        }

        if let Err(e) = self.run(ws, &ctx).await {
            error!(charge_box_id = %ctx.charge_box_id, "WebSocket error: {}", e);
        }

        self.sessions.unregister(&ctx.charge_box_id, session_id).await;
    }

    async fn run<S>(&self, mut ws: WebSocketStream<S>, ctx: &ConnectionContext) -> Result<(), tungstenite::Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        while let Some(msg) = ws.next().await {
            match msg? {
                Message::Text(text) => {
                    debug!(charge_box_id = %ctx.charge_box_id, "Received: {}", text);
                    if let Some(reply) = self.handle_text(&ctx.charge_box_id, &text) {
                        debug!(charge_box_id = %ctx.charge_box_id, "Sending: {}", reply);
                        ws.send(Message::Text(reply)).await?;
                    }
                }
                Message::Binary(data) => {
                    warn!(
                        charge_box_id = %ctx.charge_box_id,
                        "Ignoring binary frame ({} bytes), OCPP-J is text only",
                        data.len()
                    );
                }
                Message::Close(frame) => {
                    // The stream ends once the close reply has been flushed
                    info!(charge_box_id = %ctx.charge_box_id, ?frame, "WebSocket closed by station");
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }

        Ok(())
    }

    /// Handle one text frame, returning the reply to send (if any)
    pub fn handle_text(&self, charge_box_id: &str, text: &str) -> Option<String> {
        let reply = match OcppFrame::parse(text.as_bytes()) {
            Ok(OcppFrame::Call(call)) => Some(CallError::new(
                call.message_id,
                ErrorCode::NotImplemented,
                format!("Action '{}' is not handled on {}", call.action, self.version),
            )),
            Ok(OcppFrame::CallResult(result)) => {
                debug!(charge_box_id, message_id = %result.message_id, "Unsolicited CALLRESULT");
                None
            }
            Ok(OcppFrame::CallError(err)) => {
                warn!(
                    charge_box_id,
                    message_id = %err.message_id,
                    code = ?err.error_code,
                    "CALLERROR from station: {}",
                    err.error_description
                );
                None
            }
            Err(e) => {
                warn!(charge_box_id, "Failed to parse OCPP frame: {}", e);
                e.message_id().map(|message_id| {
                    CallError::new(
                        message_id,
                        ErrorCode::format_violation(self.version),
                        e.to_string(),
                    )
                })
            }
        }?;

        match reply.to_text() {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Failed to serialize CALLERROR: {}", e);
                None
            }
        }
    }
}
