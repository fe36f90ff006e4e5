//! Recording control state
//!
//! Defines the session-wide control states and the events broadcast to
//! presentation consumers.

use serde::Serialize;

use crate::recorder::outcome::AggregatedOutcome;

/// Session-wide control state
///
/// A trigger event is accepted only in Armed (starts a recording) or
/// Recording (stops it); in every other state it is discarded and logged,
/// never queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlState {
    /// No recording activity; devices may be connected but are unverified
    Idle,
    /// Preparing devices and waiting for all of them to report ready
    Arming,
    /// Every device confirmed ready; a start trigger is accepted
    Armed,
    /// Devices are recording; a stop trigger is accepted
    Recording,
    /// A stop dispatch is in flight
    Stopping,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for ControlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ControlState::Idle => "idle",
            ControlState::Arming => "arming",
            ControlState::Armed => "armed",
            ControlState::Recording => "recording",
            ControlState::Stopping => "stopping",
        };
        write!(f, "{}", name)
    }
}

impl ControlState {
    /// Whether a trigger event is accepted in this state
    pub fn accepts_trigger(&self) -> bool {
        matches!(self, ControlState::Armed | ControlState::Recording)
    }
}

/// Events emitted by the controller
///
/// Read-only notifications for the presentation boundary: roster display,
/// recording status, error messages.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// Control state changed
    StateChanged {
        from: ControlState,
        to: ControlState,
    },
    /// A device connected and joined the roster
    DeviceConnected { id: String, label: String },
    /// A device was removed from the roster
    DeviceRemoved { id: String },
    /// All devices confirmed ready
    Armed,
    /// Recording started on every device
    Started,
    /// Recording stopped on every device
    Stopped,
    /// A trigger event was discarded
    TriggerIgnored { state: ControlState },
    /// A coordination pass finished, in whatever status
    PassCompleted(AggregatedOutcome),
    /// Error surfaced to the operator
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_acceptance() {
        assert!(ControlState::Armed.accepts_trigger());
        assert!(ControlState::Recording.accepts_trigger());
        assert!(!ControlState::Idle.accepts_trigger());
        assert!(!ControlState::Arming.accepts_trigger());
        assert!(!ControlState::Stopping.accepts_trigger());
    }
}
