//! Upgrade gate
//!
//! Decides, once per handshake attempt, whether a charge box may connect and
//! which protocol endpoint owns the connection afterwards.
//!
//! The checks run strictly in order and stop at the first failure:
//!
//! ```text
//! Pending ──► AdmissionChecked ──► ProtocolChecked ──► Resolved ──► Accepted(endpoint)
//!    │               │                   │
//!    ▼               ▼                   ▼
//! UnknownDevice  MissingProtocol  UnsupportedProtocol
//! ```
//!
//! A rejected attempt is terminal. Retrying means the client opens a new
//! handshake.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::directory::{IdentityDirectory, RegistrationStatus};
use crate::handshake::{charge_box_id_from_path, HandshakeAttempt, CHARGE_BOX_ID_KEY};
use crate::registry::{EndpointHandler, EndpointRegistry};

/// Progress of one attempt through the gate, in check order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakeStage {
    Pending,
    /// Charge box id found in the directory
    AdmissionChecked,
    /// A protocol was offered
    ProtocolChecked,
    /// An endpoint implements the protocol
    Resolved,
}

/// Why a handshake attempt was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("ChargeBoxId '{charge_box_id}' is not recognized")]
    UnknownDevice { charge_box_id: String },

    #[error("No protocol (OCPP version) is specified")]
    MissingProtocol,

    #[error("Requested protocol '{protocol}' is not supported")]
    UnsupportedProtocol { protocol: String },
}

impl GateError {
    /// Stable, machine-readable reason reported to the client
    pub fn reason_code(&self) -> &'static str {
        match self {
            GateError::UnknownDevice { .. } => "unknown-device",
            GateError::MissingProtocol => "missing-protocol",
            GateError::UnsupportedProtocol { .. } => "unsupported-protocol",
        }
    }

    /// HTTP status used to fail the handshake
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::UnknownDevice { .. } => 404,
            GateError::MissingProtocol | GateError::UnsupportedProtocol { .. } => 400,
        }
    }

    /// Last stage the attempt reached before being refused
    pub fn stage(&self) -> HandshakeStage {
        match self {
            GateError::UnknownDevice { .. } => HandshakeStage::Pending,
            GateError::MissingProtocol => HandshakeStage::AdmissionChecked,
            GateError::UnsupportedProtocol { .. } => HandshakeStage::ProtocolChecked,
        }
    }
}

/// A successful gate decision, ready to be completed by the transport
#[derive(Debug)]
pub struct Admission<'a, H> {
    /// Endpoint that owns the connection from now on
    pub endpoint: &'a H,
    pub charge_box_id: String,
    pub registration_status: RegistrationStatus,
    /// The original attempt; its attributes now carry the charge box id
    pub attempt: HandshakeAttempt,
}

impl<H: EndpointHandler> Admission<'_, H> {
    /// Protocol token the connection was bound to
    pub fn protocol(&self) -> &str {
        self.endpoint.protocol_token()
    }
}

/// Admission and protocol dispatch for inbound handshakes
///
/// Holds no per-attempt state, so one gate serves all connections
/// concurrently.
#[derive(Debug)]
pub struct UpgradeGate<H, D> {
    registry: Arc<EndpointRegistry<H>>,
    directory: D,
}

impl<H: EndpointHandler, D: IdentityDirectory> UpgradeGate<H, D> {
    pub fn new(registry: Arc<EndpointRegistry<H>>, directory: D) -> Self {
        Self { registry, directory }
    }

    pub fn registry(&self) -> &EndpointRegistry<H> {
        &self.registry
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Run the admission and protocol checks for one attempt
    pub fn upgrade(&self, mut attempt: HandshakeAttempt) -> Result<Admission<'_, H>, GateError> {
        // 1. Check the chargeBoxId
        let charge_box_id = charge_box_id_from_path(&attempt.path).to_string();

        let Some(registration_status) = self.directory.registration_status(&charge_box_id) else {
            let err = GateError::UnknownDevice { charge_box_id };
            warn!(path = %attempt.path, reason = err.reason_code(), "{}", err);
            return Err(err);
        };

        attempt
            .attributes
            .insert(CHARGE_BOX_ID_KEY, charge_box_id.as_str());
        debug!(charge_box_id = %charge_box_id, "Stage {:?}", HandshakeStage::AdmissionChecked);

        // 2. Route according to the selected protocol
        let Some(protocol) = attempt
            .selected_protocol
            .as_deref()
            .filter(|protocol| !protocol.is_empty())
        else {
            let err = GateError::MissingProtocol;
            warn!(charge_box_id = %charge_box_id, reason = err.reason_code(), "{}", err);
            return Err(err);
        };
        debug!(charge_box_id = %charge_box_id, "Stage {:?}", HandshakeStage::ProtocolChecked);

        let Some(endpoint) = self.registry.find_handler(protocol) else {
            let err = GateError::UnsupportedProtocol {
                protocol: protocol.to_string(),
            };
            warn!(charge_box_id = %charge_box_id, reason = err.reason_code(), "{}", err);
            return Err(err);
        };
        debug!(charge_box_id = %charge_box_id, "Stage {:?}", HandshakeStage::Resolved);

        info!(
            charge_box_id = %charge_box_id,
            protocol = endpoint.protocol_token(),
            status = ?registration_status,
            "Handshake admitted"
        );

        Ok(Admission {
            endpoint,
            charge_box_id,
            registration_status,
            attempt,
        })
    }
}
