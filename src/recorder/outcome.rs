//! Command and outcome types
//!
//! One pass = one `CommandRequest` fanned out to every eligible session,
//! collected into an `AggregatedOutcome`. The outcome is immutable once
//! built and is the only input the controller uses to pick its next state.

use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::device::transport::ShutterCommand;

/// Terminal outcome of one device's command unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceOutcome {
    Success,
    Timeout,
    ProtocolError,
    LinkLost,
}

impl DeviceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeviceOutcome::Success)
    }
}

/// Result of one device's unit within a pass
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerDeviceResult {
    /// Stable device identifier
    pub device_id: String,

    /// Human-readable label, carried so failures name the physical camera
    pub label: String,

    /// Terminal outcome of this unit
    pub outcome: DeviceOutcome,

    /// Operator-facing detail for non-success outcomes
    pub detail: Option<String>,

    /// Measured command round trip in milliseconds
    pub round_trip_ms: f64,

    /// Completion time as unix milliseconds
    pub completed_unix_ms: u64,

    /// Monotonic completion stamp, used for skew computation
    #[serde(skip)]
    pub completed_at: Instant,
}

/// A single logical command addressed to every eligible session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    /// Pass id for log correlation
    pub pass_id: Uuid,

    /// The command being dispatched
    pub command: ShutterCommand,

    /// Identifiers of the sessions targeted by this pass, fixed at issue time
    pub targets: Vec<String>,

    /// Monotonic issue stamp
    #[serde(skip)]
    pub issued_at: Instant,
}

impl CommandRequest {
    /// Snapshot a new request. Target identifiers are copied, never live
    /// session references, so the set cannot change under an in-flight pass.
    pub fn new(command: ShutterCommand, targets: Vec<String>) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            command,
            targets,
            issued_at: Instant::now(),
        }
    }
}

/// Overall classification of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverallStatus {
    AllSucceeded,
    PartialFailure,
    TotalFailure,
}

/// Aggregated, immutable result of one pass
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedOutcome {
    /// Pass id, copied from the request
    pub pass_id: Uuid,

    /// The command that was dispatched
    pub command: ShutterCommand,

    /// Overall classification
    pub status: OverallStatus,

    /// Per-device results, in completion order (not dispatch order)
    pub results: Vec<PerDeviceResult>,

    /// Spread between earliest and latest successful completion, in
    /// milliseconds. None when fewer than two units succeeded.
    pub skew_ms: Option<f64>,
}

impl AggregatedOutcome {
    /// Classify a completed pass from its collected results.
    pub fn from_results(request: &CommandRequest, results: Vec<PerDeviceResult>) -> Self {
        let successes = results.iter().filter(|r| r.outcome.is_success()).count();
        let status = if successes == results.len() && !results.is_empty() {
            OverallStatus::AllSucceeded
        } else if successes == 0 {
            OverallStatus::TotalFailure
        } else {
            OverallStatus::PartialFailure
        };

        Self {
            pass_id: request.pass_id,
            command: request.command,
            status,
            skew_ms: compute_skew(&results),
            results,
        }
    }

    /// Outcome for a pass that found zero eligible sessions. No command was
    /// dispatched; distinct from every device failing.
    pub fn no_eligible(request: &CommandRequest) -> Self {
        Self {
            pass_id: request.pass_id,
            command: request.command,
            status: OverallStatus::TotalFailure,
            results: Vec::new(),
            skew_ms: None,
        }
    }

    /// Whether this outcome is the no-eligible-devices case
    pub fn no_eligible_devices(&self) -> bool {
        self.status == OverallStatus::TotalFailure && self.results.is_empty()
    }

    /// Results of the devices that completed successfully
    pub fn succeeded(&self) -> impl Iterator<Item = &PerDeviceResult> {
        self.results.iter().filter(|r| r.outcome.is_success())
    }

    /// Results of the devices that failed
    pub fn failed(&self) -> impl Iterator<Item = &PerDeviceResult> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }

    /// Operator-facing summary of what went wrong, naming each failed camera
    /// and its error kind. None when the pass fully succeeded.
    pub fn failure_summary(&self) -> Option<String> {
        if self.status == OverallStatus::AllSucceeded {
            return None;
        }
        if self.no_eligible_devices() {
            return Some("no eligible devices".to_string());
        }
        let failed: Vec<String> = self
            .failed()
            .map(|r| match &r.detail {
                Some(detail) => format!("{} ({:?}: {})", r.label, r.outcome, detail),
                None => format!("{} ({:?})", r.label, r.outcome),
            })
            .collect();
        Some(failed.join(", "))
    }
}

/// Skew is only meaningful across successful completions; a timestamp from a
/// timed-out unit measures the budget, not the device.
fn compute_skew(results: &[PerDeviceResult]) -> Option<f64> {
    let stamps: Vec<Instant> = results
        .iter()
        .filter(|r| r.outcome.is_success())
        .map(|r| r.completed_at)
        .collect();
    if stamps.len() < 2 {
        return None;
    }
    let earliest = stamps.iter().min()?;
    let latest = stamps.iter().max()?;
    Some(latest.duration_since(*earliest).as_secs_f64() * 1000.0)
}
