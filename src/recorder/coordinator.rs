//! Shutter coordinator
//!
//! Fans one shutter command out to every eligible session concurrently and
//! joins the per-device results into a single aggregated outcome. This is
//! the only place in the crate that dispatches device I/O in parallel;
//! sequential dispatch is the primary cause of start/stop skew and is not
//! an option here.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::device::registry::DeviceRegistry;
use crate::device::transport::ShutterCommand;
use crate::recorder::outcome::{AggregatedOutcome, CommandRequest};
use crate::utils::error::{ControlError, ControlResult};

/// Dispatches one command to all eligible sessions and aggregates results
pub struct ShutterCoordinator {
    registry: Arc<DeviceRegistry>,
}

impl ShutterCoordinator {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self { registry }
    }

    /// Run one coordination pass.
    ///
    /// Snapshots the eligible sessions, spawns one unit of work per target,
    /// and waits for every unit to reach a terminal outcome. Units are
    /// isolated: one device timing out or failing never blocks or cancels a
    /// sibling, and there is no early exit on first failure. Results arrive
    /// in completion order.
    ///
    /// With zero eligible sessions the pass resolves immediately to a
    /// TotalFailure outcome without touching any device. Contract
    /// violations raised by a unit (and unit panics) surface as `Err`, but
    /// only after every other unit has drained.
    pub async fn dispatch(&self, command: ShutterCommand) -> ControlResult<AggregatedOutcome> {
        let targets = self.registry.snapshot_ready(command)?;
        let request = CommandRequest::new(
            command,
            targets.iter().map(|s| s.id().to_string()).collect(),
        );

        if targets.is_empty() {
            self.registry.complete_pass();
            tracing::warn!(pass = %request.pass_id, command = %command, "no eligible devices");
            return Ok(AggregatedOutcome::no_eligible(&request));
        }

        tracing::info!(
            pass = %request.pass_id,
            command = %command,
            targets = targets.len(),
            "dispatching shutter command"
        );

        let mut units = JoinSet::new();
        for session in targets {
            units.spawn(async move { session.issue(command).await });
        }

        let mut results = Vec::with_capacity(request.targets.len());
        let mut hard_failure: Option<ControlError> = None;
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(Ok(result)) => {
                    tracing::debug!(
                        pass = %request.pass_id,
                        device = %result.device_id,
                        outcome = ?result.outcome,
                        round_trip_ms = result.round_trip_ms,
                        "unit complete"
                    );
                    results.push(result);
                }
                Ok(Err(err)) => {
                    tracing::error!(pass = %request.pass_id, error = %err, "unit contract failure");
                    hard_failure.get_or_insert(err);
                }
                Err(join_err) => {
                    tracing::error!(pass = %request.pass_id, error = %join_err, "unit panicked");
                    hard_failure.get_or_insert(join_err.into());
                }
            }
        }

        self.registry.complete_pass();

        if let Some(err) = hard_failure {
            return Err(err);
        }

        let outcome = AggregatedOutcome::from_results(&request, results);
        tracing::info!(
            pass = %outcome.pass_id,
            status = ?outcome.status,
            skew_ms = ?outcome.skew_ms,
            "pass complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::session::DeviceState;
    use crate::recorder::outcome::{DeviceOutcome, OverallStatus};
    use crate::testutil::{ready_session, MockTransport, ShutterBehavior};
    use tokio::time::Instant;

    async fn registry_with(
        specs: Vec<(&str, MockTransport)>,
    ) -> (Arc<DeviceRegistry>, Vec<Arc<MockTransport>>) {
        let registry = Arc::new(DeviceRegistry::new());
        let mut mocks = Vec::new();
        for (id, mock) in specs {
            let (session, mock) = ready_session(id, mock).await;
            registry.insert(session);
            mocks.push(mock);
        }
        (registry, mocks)
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_devices_succeed() {
        let (registry, _mocks) = registry_with(vec![
            ("cam-a", MockTransport::new().with_shutter_delay(40)),
            ("cam-b", MockTransport::new().with_shutter_delay(10)),
            ("cam-c", MockTransport::new().with_shutter_delay(55)),
        ])
        .await;
        let coordinator = ShutterCoordinator::new(registry.clone());

        let outcome = coordinator.dispatch(ShutterCommand::Start).await.unwrap();

        assert_eq!(outcome.status, OverallStatus::AllSucceeded);
        assert_eq!(outcome.results.len(), 3);
        // completion order, not dispatch order
        assert_eq!(outcome.results[0].device_id, "cam-b");
        assert_eq!(outcome.results[2].device_id, "cam-c");
        assert!((outcome.skew_ms.unwrap() - 45.0).abs() < 1e-6);
        for session in registry.sessions() {
            assert_eq!(session.state(), DeviceState::Recording);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_timeout_does_not_cancel_siblings() {
        // B times out; A and C land 15ms apart
        let (registry, mocks) = registry_with(vec![
            ("cam-a", MockTransport::new().with_shutter_delay(40)),
            ("cam-b", MockTransport::new().with_start(ShutterBehavior::Hang)),
            ("cam-c", MockTransport::new().with_shutter_delay(55)),
        ])
        .await;
        let coordinator = ShutterCoordinator::new(registry.clone());

        let started = Instant::now();
        let outcome = coordinator.dispatch(ShutterCommand::Start).await.unwrap();

        assert_eq!(outcome.status, OverallStatus::PartialFailure);
        assert_eq!(outcome.results.len(), 3);
        assert!((outcome.skew_ms.unwrap() - 15.0).abs() < 1e-6);

        let b = outcome
            .results
            .iter()
            .find(|r| r.device_id == "cam-b")
            .unwrap();
        assert_eq!(b.outcome, DeviceOutcome::Timeout);
        assert_eq!(outcome.succeeded().count(), 2);

        // every sibling's command went out despite the hang
        assert_eq!(mocks[0].shutter_calls(), 1);
        assert_eq!(mocks[2].shutter_calls(), 1);

        assert_eq!(registry.get("cam-a").unwrap().state(), DeviceState::Recording);
        assert_eq!(registry.get("cam-b").unwrap().state(), DeviceState::Faulted);
        assert_eq!(registry.get("cam-c").unwrap().state(), DeviceState::Recording);

        // pass duration is bounded by the per-device budget, not the sum
        let elapsed = started.elapsed();
        assert!(elapsed <= crate::config::RecorderConfig::default().command_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_eligible_devices_is_immediate_total_failure() {
        let registry = Arc::new(DeviceRegistry::new());
        let coordinator = ShutterCoordinator::new(registry.clone());

        let outcome = coordinator.dispatch(ShutterCommand::Start).await.unwrap();

        assert_eq!(outcome.status, OverallStatus::TotalFailure);
        assert!(outcome.no_eligible_devices());

        // the pass closed, so the registry accepts the next one
        assert!(registry.snapshot_ready(ShutterCommand::Start).is_ok());
        registry.complete_pass();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_io_when_nothing_is_eligible() {
        // connected but never prepared, so not a legal start target
        let registry = Arc::new(DeviceRegistry::new());
        let (session, mock) =
            crate::testutil::connected_session("cam-a", MockTransport::new()).await;
        registry.insert(session);
        let coordinator = ShutterCoordinator::new(registry);

        let outcome = coordinator.dispatch(ShutterCommand::Start).await.unwrap();

        assert!(outcome.no_eligible_devices());
        assert_eq!(mock.shutter_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_rejected_while_pass_open() {
        let (registry, _mocks) =
            registry_with(vec![("cam-a", MockTransport::new())]).await;
        let coordinator = ShutterCoordinator::new(registry.clone());

        let _held = registry.snapshot_ready(ShutterCommand::Start).unwrap();
        let err = coordinator.dispatch(ShutterCommand::Start).await.unwrap_err();
        assert!(matches!(err, ControlError::DispatchInFlight));
        registry.complete_pass();
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_when_every_device_fails() {
        let (registry, _mocks) = registry_with(vec![
            ("cam-a", MockTransport::new().with_start(ShutterBehavior::Hang)),
            (
                "cam-b",
                MockTransport::new().with_start(ShutterBehavior::Fail(
                    crate::device::transport::TransportError::ProtocolError("busy".into()),
                )),
            ),
        ])
        .await;
        let coordinator = ShutterCoordinator::new(registry);

        let outcome = coordinator.dispatch(ShutterCommand::Start).await.unwrap();

        assert_eq!(outcome.status, OverallStatus::TotalFailure);
        assert!(!outcome.no_eligible_devices());
        let summary = outcome.failure_summary().unwrap();
        assert!(summary.contains("cam-a"));
        assert!(summary.contains("cam-b"));
        assert!(summary.contains("busy"));
    }
}
