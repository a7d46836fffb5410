//! # OCPP Gate Core
//!
//! Admission and protocol-version dispatch for charge points opening a
//! WebSocket connection to a central system.
//!
//! Before any OCPP frame is read, every handshake attempt passes through the
//! [`UpgradeGate`]:
//!
//! ```text
//! Handshake request (path, Sec-WebSocket-Protocol, ...)
//!       │
//!       ▼
//! ┌──────────────────────────────────────────┐
//! │ UpgradeGate                              │
//! │  1. chargeBoxId = last path segment      │
//! │  2. IdentityDirectory lookup ──► 404     │
//! │  3. protocol offered?        ──► 400     │
//! │  4. EndpointRegistry lookup  ──► 400     │
//! └──────────────┬───────────────────────────┘
//!                │ Admission { endpoint, attempt }
//!                ▼
//!   transport completes the upgrade, endpoint owns the connection
//! ```
//!
//! The crate is transport-agnostic and synchronous. `ocpp-gate-ws` binds it
//! to a `tokio-tungstenite` server handshake.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use ocpp_gate_core::{
//!     EndpointHandler, EndpointRegistry, HandshakeAttempt, MemoryDirectory, UpgradeGate,
//! };
//!
//! struct Endpoint(&'static str);
//!
//! impl EndpointHandler for Endpoint {
//!     fn protocol_token(&self) -> &str {
//!         self.0
//!     }
//! }
//!
//! let registry = Arc::new(EndpointRegistry::new(vec![Endpoint("ocpp1.6"), Endpoint("ocpp2.0.1")]));
//! let directory = MemoryDirectory::new().with_station("CP001");
//! let gate = UpgradeGate::new(registry, directory);
//!
//! let attempt = HandshakeAttempt::new("/steve/websocket/CentralSystemService/CP001")
//!     .with_protocol("ocpp1.6");
//! let admission = gate.upgrade(attempt).unwrap();
//!
//! assert_eq!(admission.endpoint.protocol_token(), "ocpp1.6");
//! assert_eq!(admission.charge_box_id, "CP001");
//! ```

pub mod version;
pub mod registry;
pub mod handshake;
pub mod directory;
pub mod gate;

pub use version::{OcppVersion, VersionError};
pub use registry::{EndpointHandler, EndpointRegistry};
pub use handshake::{
    charge_box_id_from_path, negotiate_protocol, parse_protocol_header, HandshakeAttempt,
    HandshakeAttributes, CHARGE_BOX_ID_KEY,
};
pub use directory::{
    DirectoryError, IdentityDirectory, MemoryDirectory, RegistrationStatus, StationEntry,
};
pub use gate::{Admission, GateError, HandshakeStage, UpgradeGate};
