//! Configuration for the gate server

use std::net::SocketAddr;
use std::time::Duration;

use ocpp_gate_core::OcppVersion;

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP address to accept charge point connections on
    pub listen_addr: SocketAddr,

    /// Protocol versions to register endpoints for, in lookup order
    pub versions: Vec<OcppVersion>,

    /// Maximum size of an incoming message
    pub max_message_size: usize,

    /// Maximum size of a single frame
    pub max_frame_size: usize,

    /// Upper bound for reading the upgrade request and answering it
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8180)),
            versions: OcppVersion::ALL.to_vec(),
            max_message_size: 64 * 1024,
            max_frame_size: 16 * 1024,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Create config listening on `listen_addr` with all versions enabled
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    /// Set listen address
    pub fn with_listen_addr(mut self, listen_addr: SocketAddr) -> Self {
        self.listen_addr = listen_addr;
        self
    }

    /// Restrict the served protocol versions
    pub fn with_versions(mut self, versions: impl IntoIterator<Item = OcppVersion>) -> Self {
        self.versions = versions.into_iter().collect();
        self
    }

    /// Set message and frame size limits
    pub fn with_limits(mut self, max_message_size: usize, max_frame_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self.max_frame_size = max_frame_size;
        self
    }

    /// Set handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}
