//! Shutterlink - synchronized shutter control for multi-camera wireless rigs.
//!
//! One trigger press, every camera. The crate tracks per-device connection
//! and readiness state, fans a start/stop command out to all ready devices
//! concurrently, measures the resulting time skew, and folds the per-device
//! results into a single outcome the rest of an application can act on.
//!
//! The wireless link itself is a trait boundary
//! ([`ShutterTransport`](device::ShutterTransport)); trigger input and
//! presentation are channel/event boundaries. Everything in between —
//! sessions, registry, coordinator, controller — lives here.

pub mod config;
pub mod device;
pub mod recorder;
pub mod trigger;
pub mod utils;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::RecorderConfig;
pub use device::{
    DeviceDescriptor, DeviceRegistry, DeviceSession, DeviceState, ShutterCommand,
    ShutterTransport,
};
pub use recorder::{
    AggregatedOutcome, ControlState, OverallStatus, RecorderEvent, RecordingController,
    ShutterCoordinator,
};
pub use utils::{ControlError, ControlResult};
