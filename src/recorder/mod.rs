//! Recording control module
//!
//! This module implements the synchronized recording architecture:
//! - ShutterCoordinator fans one command out to every eligible session
//! - RecordingController drives the arm/record lifecycle and admission
//! - Outcome types aggregate per-device results for the presentation layer

pub mod controller;
pub mod coordinator;
pub mod outcome;
pub mod state;

pub use controller::{DeviceReport, RecordingController};
pub use coordinator::ShutterCoordinator;
pub use outcome::{
    AggregatedOutcome, CommandRequest, DeviceOutcome, OverallStatus, PerDeviceResult,
};
pub use state::{ControlState, RecorderEvent};
