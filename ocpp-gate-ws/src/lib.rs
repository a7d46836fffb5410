//! # OCPP Gate WebSocket Server
//!
//! Accepts charge point WebSocket connections and lets the
//! [`UpgradeGate`](ocpp_gate_core::UpgradeGate) decide, during the upgrade
//! handshake, whether a station is admitted and which OCPP version endpoint
//! owns the connection.
//!
//! ```text
//! Charge point
//!       │ GET /steve/websocket/CentralSystemService/{chargeBoxId}
//!       │ Sec-WebSocket-Protocol: ocpp1.6, ocpp1.5
//!       ▼
//! ┌─────────────────────────────────────┐
//! │ GateServer (TCP accept loop)        │
//! │   accept_hdr_async callback         │
//! │     └─► UpgradeGate::upgrade        │
//! │           ├─ 101 + protocol header  │
//! │           └─ 404/400 + reason       │
//! └───────────────┬─────────────────────┘
//!                 ▼
//!   OcppEndpoint(ocpp1.6) owns the socket, SessionStore tracks it
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use ocpp_gate_core::MemoryDirectory;
//! use ocpp_gate_ws::{GateServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let directory = MemoryDirectory::new().with_station("CP001");
//!     let config = ServerConfig::new("0.0.0.0:8180".parse()?);
//!
//!     GateServer::new(config, directory).bind().await?.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod frame;
pub mod session;
pub mod endpoint;
pub mod handshake;
pub mod server;

pub use config::ServerConfig;
pub use endpoint::{ConnectionContext, OcppEndpoint};
pub use frame::{CallError, ErrorCode, FrameError, OcppFrame};
pub use handshake::{Admitted, REJECTION_REASON_HEADER, REMOTE_ADDRESS_KEY};
pub use server::{BoundServer, ConnectionHandler, GateServer, ServerError};
pub use session::{SessionInfo, SessionStore};
