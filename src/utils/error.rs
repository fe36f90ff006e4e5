//! Error types and handling
//!
//! Common error types used across the crate.

use serde::Serialize;
use thiserror::Error;

use crate::device::transport::TransportError;

/// Crate-wide error type
///
/// Per-device command failures are not errors: they are captured as
/// [`PerDeviceResult`](crate::recorder::PerDeviceResult) values and surfaced
/// through the aggregated outcome. Only contract violations and ambient I/O
/// problems travel through this type.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid state for {operation}: {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("a command dispatch is already in flight")]
    DispatchInFlight,

    #[error("device {device} is not ready: {reason}")]
    DeviceNotReady { device: String, reason: String },

    #[error("devices not ready: {0}")]
    DevicesNotReady(String),

    #[error("no devices connected")]
    NoDevices,

    #[error("a previous start left devices recording; stop them before starting again")]
    ResyncRequired,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("dispatch unit failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Error response for presentation consumers
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&ControlError> for ErrorResponse {
    fn from(error: &ControlError) -> Self {
        let code = match error {
            ControlError::Io(_) => "IO_ERROR",
            ControlError::Serialization(_) => "SERIALIZATION_ERROR",
            ControlError::InvalidState { .. } => "INVALID_STATE",
            ControlError::DispatchInFlight => "DISPATCH_IN_FLIGHT",
            ControlError::DeviceNotReady { .. } => "DEVICE_NOT_READY",
            ControlError::DevicesNotReady(_) => "DEVICES_NOT_READY",
            ControlError::NoDevices => "NO_DEVICES",
            ControlError::ResyncRequired => "RESYNC_REQUIRED",
            ControlError::Transport(_) => "TRANSPORT_ERROR",
            ControlError::Join(_) => "DISPATCH_UNIT_FAILED",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using ControlError
pub type ControlResult<T> = Result<T, ControlError>;
