//! Endpoint registry
//!
//! The fixed, ordered set of protocol-version endpoints a central system
//! serves. Built once at startup and shared read-only afterwards.

use std::collections::HashSet;

use tracing::debug;

/// A destination that can own an upgraded connection for one protocol token
pub trait EndpointHandler: Send + Sync {
    /// Sub-protocol token this endpoint implements (e.g. `ocpp1.6`)
    fn protocol_token(&self) -> &str;
}

impl<T: EndpointHandler + ?Sized> EndpointHandler for std::sync::Arc<T> {
    fn protocol_token(&self) -> &str {
        (**self).protocol_token()
    }
}

impl<T: EndpointHandler + ?Sized> EndpointHandler for Box<T> {
    fn protocol_token(&self) -> &str {
        (**self).protocol_token()
    }
}

/// Immutable collection of endpoints, one per protocol token
#[derive(Debug)]
pub struct EndpointRegistry<H> {
    endpoints: Vec<H>,
}

impl<H: EndpointHandler> EndpointRegistry<H> {
    /// Create a registry from endpoints in lookup order
    ///
    /// Duplicate tokens are a configuration error. They are not rejected:
    /// the first registration keeps answering lookups.
    pub fn new(endpoints: Vec<H>) -> Self {
        let mut seen = HashSet::new();
        for endpoint in &endpoints {
            if !seen.insert(endpoint.protocol_token()) {
                debug!(
                    protocol = endpoint.protocol_token(),
                    "Duplicate endpoint registration, first one wins"
                );
            }
        }

        Self { endpoints }
    }

    /// Find the endpoint for a protocol token (exact, case-sensitive match)
    pub fn find_handler(&self, token: &str) -> Option<&H> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.protocol_token() == token)
    }

    /// Whether some endpoint implements `token`
    pub fn supports(&self, token: &str) -> bool {
        self.find_handler(token).is_some()
    }

    /// Registered tokens in registration order
    pub fn protocol_tokens(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|endpoint| endpoint.protocol_token())
    }

    pub fn iter(&self) -> impl Iterator<Item = &H> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
