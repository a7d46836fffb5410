//! OCPP-J RPC framing
//!
//! Every OCPP-J version shares the same JSON array envelope:
//! - CALL: [2, messageId, action, payload]
//! - CALLRESULT: [3, messageId, payload]
//! - CALLERROR: [4, messageId, errorCode, errorDescription, errorDetails]
//!
//! Actions and payloads are kept as raw JSON; their meaning belongs to the
//! version-specific message handling.

use ocpp_gate_core::OcppVersion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// OCPP message type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Call = 2,
    CallResult = 3,
    CallError = 4,
}

/// OCPP-J error codes across versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// 1.x spelling of a malformed payload
    FormationViolation,
    /// 2.x spelling of a malformed payload
    FormatViolation,
    GenericError,
    InternalError,
    MessageTypeNotSupported,
    NotImplemented,
    NotSupported,
    OccurrenceConstraintViolation,
    PropertyConstraintViolation,
    ProtocolError,
    RpcFrameworkError,
    SecurityError,
    TypeConstraintViolation,
}

impl ErrorCode {
    /// Code for a frame that could not be parsed, as spelled by `version`
    pub fn format_violation(version: OcppVersion) -> Self {
        if version.is_legacy() {
            ErrorCode::FormationViolation
        } else {
            ErrorCode::FormatViolation
        }
    }
}

/// Errors in OCPP-J frame handling
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid message format")]
    InvalidFormat { message_id: Option<String> },

    #[error("Unknown message type: {message_type}")]
    UnknownMessageType {
        message_type: i64,
        message_id: Option<String>,
    },
}

impl FrameError {
    /// Message id of the offending frame, when it could be read
    pub fn message_id(&self) -> Option<&str> {
        match self {
            FrameError::JsonError(_) => None,
            FrameError::InvalidFormat { message_id }
            | FrameError::UnknownMessageType { message_id, .. } => message_id.as_deref(),
        }
    }
}

/// OCPP CALL message (request)
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub message_id: String,
    pub action: String,
    pub payload: Value,
}

/// OCPP CALLRESULT message (success response)
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub message_id: String,
    pub payload: Value,
}

/// OCPP CALLERROR message (error response)
#[derive(Debug, Clone, PartialEq)]
pub struct CallError {
    pub message_id: String,
    pub error_code: ErrorCode,
    pub error_description: String,
    pub error_details: Value,
}

impl CallError {
    /// Create a new CALLERROR message
    pub fn new(
        message_id: impl Into<String>,
        error_code: ErrorCode,
        error_description: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            error_code,
            error_description: error_description.into(),
            error_details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Serialize to a text frame body: [4, messageId, errorCode, errorDescription, errorDetails]
    pub fn to_text(&self) -> Result<String, FrameError> {
        let array = serde_json::json!([
            MessageType::CallError as i32,
            &self.message_id,
            &self.error_code,
            &self.error_description,
            &self.error_details
        ]);
        Ok(serde_json::to_string(&array)?)
    }
}

/// Parsed OCPP-J frame (any type)
#[derive(Debug, Clone, PartialEq)]
pub enum OcppFrame {
    Call(Call),
    CallResult(CallResult),
    CallError(CallError),
}

impl OcppFrame {
    /// Parse an OCPP-J frame from JSON bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        let array: Vec<Value> = serde_json::from_slice(bytes)?;

        let message_id = array.get(1).and_then(Value::as_str).map(str::to_string);
        let invalid = || FrameError::InvalidFormat {
            message_id: message_id.clone(),
        };

        let msg_type = array
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(invalid)?;

        match msg_type {
            2 => {
                // CALL: [2, messageId, action, payload]
                if array.len() != 4 {
                    return Err(invalid());
                }

                let message_id = message_id.clone().ok_or_else(invalid)?;
                let action = array[2].as_str().ok_or_else(invalid)?.to_string();

                Ok(OcppFrame::Call(Call {
                    message_id,
                    action,
                    payload: array[3].clone(),
                }))
            }
            3 => {
                // CALLRESULT: [3, messageId, payload]
                if array.len() != 3 {
                    return Err(invalid());
                }

                Ok(OcppFrame::CallResult(CallResult {
                    message_id: message_id.clone().ok_or_else(invalid)?,
                    payload: array[2].clone(),
                }))
            }
            4 => {
                // CALLERROR: [4, messageId, errorCode, errorDescription, errorDetails]
                if array.len() != 5 {
                    return Err(invalid());
                }

                let error_code = array[2]
                    .as_str()
                    .and_then(|code| serde_json::from_value(Value::String(code.to_string())).ok())
                    .unwrap_or(ErrorCode::GenericError);

                Ok(OcppFrame::CallError(CallError {
                    message_id: message_id.clone().ok_or_else(invalid)?,
                    error_code,
                    error_description: array[3].as_str().unwrap_or("").to_string(),
                    error_details: array[4].clone(),
                }))
            }
            _ => Err(FrameError::UnknownMessageType {
                message_type: msg_type,
                message_id: message_id.clone(),
            }),
        }
    }

    /// Get the message ID
    pub fn message_id(&self) -> &str {
        match self {
            OcppFrame::Call(c) => &c.message_id,
            OcppFrame::CallResult(r) => &r.message_id,
            OcppFrame::CallError(e) => &e.message_id,
        }
    }
}
