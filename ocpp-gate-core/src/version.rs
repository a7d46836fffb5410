//! OCPP-J protocol versions
//!
//! Each version is identified on the wire by its WebSocket sub-protocol token
//! (`Sec-WebSocket-Protocol`). The set is closed: a central system supports a
//! subset of these and registers one endpoint per supported version.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OCPP-J version, named by its sub-protocol token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OcppVersion {
    #[serde(rename = "ocpp1.2")]
    V12,
    #[serde(rename = "ocpp1.5")]
    V15,
    #[serde(rename = "ocpp1.6")]
    V16,
    #[serde(rename = "ocpp2.0")]
    V20,
    #[serde(rename = "ocpp2.0.1")]
    V201,
}

/// Error parsing a sub-protocol token into a version
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Unknown OCPP version: {0}")]
    UnknownVersion(String),
}

impl OcppVersion {
    /// Every known version, oldest first
    pub const ALL: [OcppVersion; 5] = [
        OcppVersion::V12,
        OcppVersion::V15,
        OcppVersion::V16,
        OcppVersion::V20,
        OcppVersion::V201,
    ];

    /// Sub-protocol token as sent in `Sec-WebSocket-Protocol`
    pub fn as_str(&self) -> &'static str {
        match self {
            OcppVersion::V12 => "ocpp1.2",
            OcppVersion::V15 => "ocpp1.5",
            OcppVersion::V16 => "ocpp1.6",
            OcppVersion::V20 => "ocpp2.0",
            OcppVersion::V201 => "ocpp2.0.1",
        }
    }

    /// Whether this is one of the 1.x versions
    pub fn is_legacy(&self) -> bool {
        matches!(self, OcppVersion::V12 | OcppVersion::V15 | OcppVersion::V16)
    }
}

impl std::fmt::Display for OcppVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OcppVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OcppVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| VersionError::UnknownVersion(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        for version in OcppVersion::ALL {
            assert_eq!(version.as_str().parse::<OcppVersion>(), Ok(version));
        }
    }

    #[test]
    fn test_parse_is_exact() {
        assert!("OCPP1.6".parse::<OcppVersion>().is_err());
        assert!("ocpp1.6j".parse::<OcppVersion>().is_err());
        assert!(" ocpp1.6".parse::<OcppVersion>().is_err());
        assert_eq!(
            "ocpp3.0".parse::<OcppVersion>(),
            Err(VersionError::UnknownVersion("ocpp3.0".into()))
        );
    }

    #[test]
    fn test_serde_uses_token() {
        let json = serde_json::to_string(&OcppVersion::V201).unwrap();
        assert_eq!(json, "\"ocpp2.0.1\"");

        let version: OcppVersion = serde_json::from_str("\"ocpp1.5\"").unwrap();
        assert_eq!(version, OcppVersion::V15);
        assert!(version.is_legacy());
        assert!(!OcppVersion::V20.is_legacy());
    }
}
