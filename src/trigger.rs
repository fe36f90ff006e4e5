//! Trigger input boundary
//!
//! Delivers logical "trigger pressed" events to the controller. Where the
//! events come from (a remote keypress, a foot pedal, a UI button) is the
//! input collaborator's business; every event is treated identically here.
//! Admission — whether an event starts, stops or gets discarded — belongs
//! entirely to the controller.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::recorder::controller::RecordingController;

/// One trigger press
#[derive(Debug, Clone, Copy)]
pub struct TriggerEvent {
    /// When the press was observed by the input collaborator
    pub pressed_at: Instant,
}

impl TriggerEvent {
    pub fn now() -> Self {
        Self {
            pressed_at: Instant::now(),
        }
    }
}

/// Channel pair connecting an input collaborator to the trigger loop
pub fn trigger_channel(capacity: usize) -> (mpsc::Sender<TriggerEvent>, mpsc::Receiver<TriggerEvent>) {
    mpsc::channel(capacity)
}

/// Forward trigger events to the controller until the source closes.
///
/// Runs as its own task. Discards and errors are logged; neither stops the
/// loop — the next press must always get a chance.
pub async fn run_trigger_loop(
    controller: Arc<RecordingController>,
    mut events: mpsc::Receiver<TriggerEvent>,
) {
    while let Some(event) = events.recv().await {
        let queued_ms = event.pressed_at.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(queued_ms, "trigger event received");
        match controller.trigger().await {
            Ok(Some(outcome)) => {
                tracing::info!(
                    pass = %outcome.pass_id,
                    command = %outcome.command,
                    status = ?outcome.status,
                    "trigger handled"
                );
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(error = %err, "trigger handling failed");
            }
        }
    }
    tracing::info!("trigger source closed");
}
