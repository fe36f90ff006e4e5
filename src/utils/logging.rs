//! Logging setup
//!
//! Console logging with an env-filter, optionally teeing every record into
//! a timestamped file so each run leaves its own log behind.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::utils::error::ControlResult;

/// Initialize tracing for the process.
///
/// With `log_dir` set, records also go to `<log_dir>/<timestamp>.log`.
/// Call once at startup; a second call panics (the global subscriber is
/// already set).
pub fn init_logging(log_dir: Option<&Path>) -> ControlResult<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shutterlink=debug".into());

    match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let name = format!("{}.log", Local::now().format("%Y-%m-%d_%H-%M-%S"));
            let file = File::create(dir.join(name))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}
