//! Identity directory
//!
//! The service of record mapping charge box ids to their registration state.
//! The gate only asks whether an id is known; the status itself never
//! influences admission.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Registration state of a known charge box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RegistrationStatus {
    #[default]
    Accepted,
    Pending,
    Rejected,
}

/// Lookup of charge box ids against the service of record
///
/// Implementations may block; callers must not hold shared locks across
/// the call. The WebSocket server calls this from its synchronous handshake
/// callback and moves the lookup off the async worker only on a
/// multi-threaded tokio runtime, so a directory used under a current-thread
/// runtime must answer without blocking.
pub trait IdentityDirectory: Send + Sync {
    /// Registration state of `charge_box_id`, or `None` if it is unknown
    fn registration_status(&self, charge_box_id: &str) -> Option<RegistrationStatus>;
}

impl<T: IdentityDirectory + ?Sized> IdentityDirectory for Arc<T> {
    fn registration_status(&self, charge_box_id: &str) -> Option<RegistrationStatus> {
        (**self).registration_status(charge_box_id)
    }
}

impl<T: IdentityDirectory + ?Sized> IdentityDirectory for &T {
    fn registration_status(&self, charge_box_id: &str) -> Option<RegistrationStatus> {
        (**self).registration_status(charge_box_id)
    }
}

/// Errors loading a directory seed
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Failed to read station file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid station file: {0}")]
    Json(#[from] serde_json::Error),
}

/// One charge box in a seed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationEntry {
    pub charge_box_id: String,
    #[serde(default)]
    pub registration_status: RegistrationStatus,
}

/// In-memory directory that can be updated while connections are admitted
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    stations: RwLock<HashMap<String, RegistrationStatus>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an accepted station (builder style)
    pub fn with_station(self, charge_box_id: impl Into<String>) -> Self {
        self.register(charge_box_id, RegistrationStatus::Accepted);
        self
    }

    pub fn from_entries(entries: impl IntoIterator<Item = StationEntry>) -> Self {
        let directory = Self::new();
        for entry in entries {
            directory.register(entry.charge_box_id, entry.registration_status);
        }
        directory
    }

    /// Load stations from a JSON array of [`StationEntry`]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let entries: Vec<StationEntry> = serde_json::from_slice(&bytes)?;

        info!("Loaded {} stations from {}", entries.len(), path.display());
        Ok(Self::from_entries(entries))
    }

    /// Register or update a station, returning its previous status
    pub fn register(
        &self,
        charge_box_id: impl Into<String>,
        status: RegistrationStatus,
    ) -> Option<RegistrationStatus> {
        let charge_box_id = charge_box_id.into();
        debug!(charge_box_id = %charge_box_id, ?status, "Registering station");
        self.stations.write().insert(charge_box_id, status)
    }

    pub fn unregister(&self, charge_box_id: &str) -> Option<RegistrationStatus> {
        self.stations.write().remove(charge_box_id)
    }

    pub fn len(&self) -> usize {
        self.stations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.read().is_empty()
    }
}

impl IdentityDirectory for MemoryDirectory {
    fn registration_status(&self, charge_box_id: &str) -> Option<RegistrationStatus> {
        self.stations.read().get(charge_box_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_lookup_is_exact() {
        let directory = MemoryDirectory::new().with_station("CP001");

        assert_eq!(
            directory.registration_status("CP001"),
            Some(RegistrationStatus::Accepted)
        );
        assert_eq!(directory.registration_status("cp001"), None);
        assert_eq!(directory.registration_status("CP001 "), None);
    }

    #[test]
    fn test_register_and_unregister() {
        let directory = MemoryDirectory::new();
        assert!(directory.is_empty());

        assert_eq!(directory.register("CP001", RegistrationStatus::Pending), None);
        assert_eq!(
            directory.register("CP001", RegistrationStatus::Rejected),
            Some(RegistrationStatus::Pending)
        );
        assert_eq!(directory.len(), 1);

        assert_eq!(
            directory.unregister("CP001"),
            Some(RegistrationStatus::Rejected)
        );
        assert_eq!(directory.registration_status("CP001"), None);
    }

    #[test]
    fn test_shared_directory() {
        let directory = Arc::new(MemoryDirectory::new());
        let shared: Arc<dyn IdentityDirectory> = directory.clone();

        assert!(shared.registration_status("CP042").is_none());
        directory.register("CP042", RegistrationStatus::Accepted);
        assert!(shared.registration_status("CP042").is_some());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"chargeBoxId": "CP001"}},
                {{"chargeBoxId": "CP002", "registrationStatus": "Pending"}},
                {{"chargeBoxId": "CP003", "registrationStatus": "Rejected"}}
            ]"#
        )
        .unwrap();

        let directory = MemoryDirectory::from_json_file(file.path()).unwrap();

        assert_eq!(directory.len(), 3);
        assert_eq!(
            directory.registration_status("CP001"),
            Some(RegistrationStatus::Accepted)
        );
        assert_eq!(
            directory.registration_status("CP002"),
            Some(RegistrationStatus::Pending)
        );
        assert_eq!(
            directory.registration_status("CP003"),
            Some(RegistrationStatus::Rejected)
        );
    }

    #[test]
    fn test_from_json_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chargeBoxId": "CP001"}}"#).unwrap();

        assert!(matches!(
            MemoryDirectory::from_json_file(file.path()),
            Err(DirectoryError::Json(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MemoryDirectory::from_json_file(dir.path().join("missing.json")),
            Err(DirectoryError::Io(_))
        ));
    }
}
