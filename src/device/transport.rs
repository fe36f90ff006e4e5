//! Transport trait definitions
//!
//! Vendor-agnostic contract for one camera's wireless link. The crate only
//! depends on this result/error contract; pairing, discovery and the vendor
//! command protocol live behind it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a transport operation can fail with
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The link could not be established
    #[error("link unavailable: {0}")]
    LinkUnavailable(String),

    /// The device rejected a prepare setting
    #[error("unsupported setting: {0}")]
    UnsupportedSetting(String),

    /// The device did not answer within the transport's own budget
    #[error("command timed out")]
    Timeout,

    /// The device answered with a rejection
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The link dropped mid-command
    #[error("link lost")]
    LinkLost,
}

/// Shutter action carried by a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutterCommand {
    Start,
    Stop,
}

impl std::fmt::Display for ShutterCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutterCommand::Start => write!(f, "start"),
            ShutterCommand::Stop => write!(f, "stop"),
        }
    }
}

/// A discovered device, before any connection is made
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Stable device identifier (e.g. BLE address)
    pub id: String,

    /// Human-readable label (e.g. advertised name)
    pub label: String,
}

/// Acknowledgement returned by the device for a shutter command
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandAck {
    /// Device-reported acknowledgement time (unix milliseconds)
    pub acked_unix_ms: u64,
}

/// Health snapshot reported by a connected device
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHealth {
    /// Battery level, 0-100
    pub battery_percent: u8,

    /// Remaining storage on the device's card in megabytes
    pub storage_remaining_mb: f64,
}

/// Settings handed to the device during the prepare step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareSettings {
    /// Requested recording resolution (vendor keyword, e.g. "4k")
    pub video_resolution: Option<String>,

    /// Requested frame rate
    pub frame_rate: Option<u32>,

    /// Whether to bring up the device's Wi-Fi access point alongside BLE
    #[serde(default)]
    pub enable_wifi: bool,
}

impl Default for PrepareSettings {
    fn default() -> Self {
        Self {
            video_resolution: None,
            frame_rate: None,
            enable_wifi: false,
        }
    }
}

/// One camera's wireless link
///
/// Implementations wrap a vendor SDK or protocol stack. All methods are
/// expected to be cancel-safe; the session layer applies its own per-command
/// budget on top of whatever the transport does internally.
#[async_trait]
pub trait ShutterTransport: Send + Sync {
    /// Establish the link to the device
    async fn connect(&self) -> Result<(), TransportError>;

    /// Apply recording settings ahead of a shutter command
    async fn prepare(&self, settings: &PrepareSettings) -> Result<(), TransportError>;

    /// Whether the device is currently able to accept a shutter command
    async fn is_ready(&self) -> Result<bool, TransportError>;

    /// Send a start/stop shutter command and wait for the acknowledgement
    async fn send_shutter(&self, command: ShutterCommand) -> Result<CommandAck, TransportError>;

    /// Query battery and storage state
    async fn query_status(&self) -> Result<DeviceHealth, TransportError>;

    /// Release the link gracefully
    ///
    /// Skipping this can leave the device in a state that refuses the next
    /// pairing attempt, so teardown paths must always call it.
    async fn disconnect(&self) -> Result<(), TransportError>;
}
