//! Shared utilities

pub mod error;
pub mod logging;

pub use error::{ControlError, ControlResult, ErrorResponse};
pub use logging::init_logging;
