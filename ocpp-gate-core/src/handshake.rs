//! Handshake attempt data
//!
//! Everything the gate sees of one upgrade attempt, plus the helpers that
//! derive the charge box id and the sub-protocol from the raw request.

use std::collections::HashMap;

use crate::registry::{EndpointHandler, EndpointRegistry};

/// Attribute key under which the admitted charge box id is stored
pub const CHARGE_BOX_ID_KEY: &str = "chargeBoxId";

/// Mutable attribute bag attached to a single handshake attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeAttributes {
    values: HashMap<String, String>,
}

impl HandshakeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The charge box id recorded by the gate, if admitted
    pub fn charge_box_id(&self) -> Option<&str> {
        self.get(CHARGE_BOX_ID_KEY)
    }
}

/// One inbound upgrade attempt as seen by the gate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeAttempt {
    /// Request path; a trailing `?query` is stripped during extraction
    pub path: String,
    /// Sub-protocol selected during negotiation, if any
    pub selected_protocol: Option<String>,
    /// Extensions proposed by the client, forwarded verbatim
    pub extensions: Vec<String>,
    /// Authenticated principal, if the transport established one
    pub principal: Option<String>,
    pub attributes: HandshakeAttributes,
}

impl HandshakeAttempt {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.selected_protocol = Some(protocol.into());
        self
    }

    pub fn with_selected_protocol(mut self, protocol: Option<String>) -> Self {
        self.selected_protocol = protocol;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key, value);
        self
    }
}

/// Extract the charge box id from a request path
///
/// Takes the last non-empty segment after a `/`, stopping at `/` or `?`.
/// A path without such a segment is returned unchanged.
///
/// ```
/// use ocpp_gate_core::charge_box_id_from_path;
///
/// assert_eq!(charge_box_id_from_path("/ocpp/CP001"), "CP001");
/// assert_eq!(charge_box_id_from_path("/ocpp/CP001?x=1"), "CP001");
/// assert_eq!(charge_box_id_from_path("CP001"), "CP001");
/// ```
pub fn charge_box_id_from_path(path: &str) -> &str {
    for (slash, _) in path.rmatch_indices('/') {
        let rest = &path[slash + 1..];
        let end = rest.find(&['/', '?'][..]).unwrap_or(rest.len());
        if end > 0 {
            return &rest[..end];
        }
    }
    path
}

/// Split a `Sec-WebSocket-Protocol` header value into offered tokens
pub fn parse_protocol_header(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pick the sub-protocol for an attempt from the client's offer
///
/// Returns the first offered token the registry supports. If tokens were
/// offered but none is supported, the first offered token is returned so
/// that the gate can reject it as unsupported. `None` means nothing usable
/// was offered.
pub fn negotiate_protocol<H: EndpointHandler>(
    offered: &[String],
    registry: &EndpointRegistry<H>,
) -> Option<String> {
    offered
        .iter()
        .find(|token| registry.supports(token))
        .or_else(|| offered.iter().find(|token| !token.is_empty()))
        .cloned()
}
