//! Connected charge point sessions
//!
//! Tracks which charge boxes currently hold an upgraded connection and on
//! which protocol version. A station may hold more than one session at a
//! time (e.g. a reconnect racing the close of the old socket).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ocpp_gate_core::OcppVersion;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// One upgraded connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub charge_box_id: String,
    pub version: OcppVersion,
    pub peer_addr: Option<SocketAddr>,
    pub connected_at: DateTime<Utc>,
}

impl SessionInfo {
    pub fn new(
        charge_box_id: impl Into<String>,
        version: OcppVersion,
        peer_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            charge_box_id: charge_box_id.into(),
            version,
            peer_addr,
            connected_at: Utc::now(),
        }
    }
}

/// Shared store of open sessions, keyed by charge box id
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Vec<SessionInfo>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new session, returning how many the station now holds
    pub async fn register(&self, session: SessionInfo) -> usize {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(session.charge_box_id.clone()).or_default();

        info!(
            charge_box_id = %session.charge_box_id,
            session_id = %session.session_id,
            version = %session.version,
            "Session opened"
        );
        entry.push(session);
        entry.len()
    }

    /// Remove a session; the station entry disappears with its last session
    pub async fn unregister(&self, charge_box_id: &str, session_id: Uuid) -> Option<SessionInfo> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(charge_box_id)?;
        let index = entry.iter().position(|s| s.session_id == session_id)?;
        let removed = entry.remove(index);

        if entry.is_empty() {
            sessions.remove(charge_box_id);
        }

        debug!(charge_box_id, session_id = %session_id, "Session closed");
        Some(removed)
    }

    /// Sessions currently open for a station
    pub async fn sessions(&self, charge_box_id: &str) -> Vec<SessionInfo> {
        self.sessions
            .read()
            .await
            .get(charge_box_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Ids of all stations with at least one open session
    pub async fn connected_stations(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Total number of open sessions
    pub async fn count(&self) -> usize {
        self.sessions.read().await.values().map(Vec::len).sum()
    }
}
