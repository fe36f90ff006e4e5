//! Device layer
//!
//! Sessions over vendor transports, plus the registry that owns them.

pub mod registry;
pub mod session;
pub mod transport;

pub use registry::{DeviceRegistry, DeviceSummary};
pub use session::{DeviceSession, DeviceState};
pub use transport::{
    CommandAck, DeviceDescriptor, DeviceHealth, PrepareSettings, ShutterCommand,
    ShutterTransport, TransportError,
};
