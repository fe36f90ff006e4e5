//! Recording controller
//!
//! Drives the arm/record lifecycle across the whole rig. Owns the device
//! registry, the shutter coordinator, the single-slot admission gate and
//! the event broadcast. At most one command dispatch is in flight at any
//! time; trigger events that arrive while one is are discarded, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::RecorderConfig;
use crate::device::registry::{DeviceRegistry, DeviceSummary};
use crate::device::session::{DeviceSession, DeviceState};
use crate::device::transport::{DeviceDescriptor, ShutterCommand, ShutterTransport};
use crate::recorder::coordinator::ShutterCoordinator;
use crate::recorder::outcome::{AggregatedOutcome, OverallStatus};
use crate::recorder::state::{ControlState, RecorderEvent};
use crate::utils::error::{ControlError, ControlResult};

/// Per-device entry of a health report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReport {
    pub id: String,
    pub label: String,
    pub state: DeviceState,
    pub battery_percent: Option<u8>,
    pub storage_remaining_mb: Option<f64>,
}

/// Coordinates the recording lifecycle across all connected devices
pub struct RecordingController {
    registry: Arc<DeviceRegistry>,
    coordinator: ShutterCoordinator,
    config: RecorderConfig,
    state: RwLock<ControlState>,
    /// Single-slot admission gate; held for the duration of one dispatch
    dispatch_gate: AtomicBool,
    /// Devices left recording by a partially failed start; a start is
    /// refused until these are explicitly stopped
    resync_pending: Mutex<Vec<String>>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl RecordingController {
    pub fn new(config: RecorderConfig) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let (event_tx, _) = broadcast::channel(100);
        Self {
            coordinator: ShutterCoordinator::new(registry.clone()),
            registry,
            config,
            state: RwLock::new(ControlState::Idle),
            dispatch_gate: AtomicBool::new(false),
            resync_pending: Mutex::new(Vec::new()),
            event_tx,
        }
    }

    /// The device registry, shared with presentation consumers
    pub fn registry(&self) -> Arc<DeviceRegistry> {
        self.registry.clone()
    }

    /// Current control state
    pub fn state(&self) -> ControlState {
        *self.state.read()
    }

    /// Subscribe to controller events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    /// Devices awaiting an explicit stop after a partially failed start
    pub fn resync_pending(&self) -> Vec<String> {
        self.resync_pending.lock().clone()
    }

    /// Read-only roster summaries
    pub fn roster(&self) -> Vec<DeviceSummary> {
        self.registry.roster()
    }

    fn set_state(&self, to: ControlState) {
        let from = {
            let mut state = self.state.write();
            let from = *state;
            *state = to;
            from
        };
        if from != to {
            tracing::info!(%from, %to, "control state change");
            let _ = self.event_tx.send(RecorderEvent::StateChanged { from, to });
        }
    }

    fn emit(&self, event: RecorderEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Connect a discovered device and add it to the roster.
    ///
    /// A device already in the roster is left untouched. A session that
    /// fails to connect is not added; the error names the device.
    pub async fn connect_device(
        &self,
        descriptor: DeviceDescriptor,
        transport: Arc<dyn ShutterTransport>,
    ) -> ControlResult<()> {
        if self.registry.get(&descriptor.id).is_some() {
            tracing::warn!(device = %descriptor.id, "already connected");
            return Ok(());
        }
        let id = descriptor.id.clone();
        let label = descriptor.label.clone();
        let session = Arc::new(DeviceSession::new(descriptor, transport, &self.config));
        session.connect().await?;
        self.registry.insert(session);
        self.emit(RecorderEvent::DeviceConnected { id, label });
        Ok(())
    }

    /// Disconnect a device and drop it from the roster
    pub async fn remove_device(&self, id: &str) -> ControlResult<()> {
        let Some(session) = self.registry.get(id) else {
            tracing::warn!(device = %id, "remove requested for unknown device");
            return Ok(());
        };
        let _ = session.disconnect().await;
        self.registry.remove(id);
        self.resync_pending.lock().retain(|pending| pending != id);
        self.emit(RecorderEvent::DeviceRemoved { id: id.to_string() });
        Ok(())
    }

    /// Prepare every connected device and verify readiness.
    ///
    /// Legal only from Idle. If every session ends Ready the controller is
    /// Armed; otherwise it returns to Idle and the error names each device
    /// that failed. Sessions that did reach Ready keep that state.
    pub async fn arm(&self) -> ControlResult<()> {
        {
            let mut state = self.state.write();
            if *state != ControlState::Idle {
                return Err(ControlError::InvalidState {
                    operation: "arm",
                    state: state.to_string(),
                });
            }
            *state = ControlState::Arming;
        }
        let _ = self.event_tx.send(RecorderEvent::StateChanged {
            from: ControlState::Idle,
            to: ControlState::Arming,
        });

        let sessions = self.registry.sessions();
        if sessions.is_empty() {
            self.set_state(ControlState::Idle);
            return Err(ControlError::NoDevices);
        }

        let mut not_ready: Vec<String> = Vec::new();
        for session in sessions {
            match session.state() {
                DeviceState::Ready => {}
                DeviceState::Connected => {
                    if let Err(err) = session.prepare(&self.config.prepare).await {
                        not_ready.push(format!("{}: {}", session.label(), err));
                    }
                }
                other => {
                    not_ready.push(format!("{}: in state {}", session.label(), other));
                }
            }
        }

        if not_ready.is_empty() {
            self.set_state(ControlState::Armed);
            self.emit(RecorderEvent::Armed);
            tracing::info!("all devices ready");
            Ok(())
        } else {
            self.set_state(ControlState::Idle);
            let detail = not_ready.join(", ");
            self.emit(RecorderEvent::Error(format!("not ready: {}", detail)));
            Err(ControlError::DevicesNotReady(detail))
        }
    }

    /// Handle one trigger event.
    ///
    /// Accepted only in Armed (starts) or Recording (stops), and only while
    /// no other dispatch is in flight; a discarded event returns `Ok(None)`
    /// and is logged, never queued.
    pub async fn trigger(&self) -> ControlResult<Option<AggregatedOutcome>> {
        if self
            .dispatch_gate
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let state = self.state();
            tracing::info!(%state, "trigger discarded, dispatch in flight");
            self.emit(RecorderEvent::TriggerIgnored { state });
            return Ok(None);
        }

        // gate held from here; release on every path
        let state = self.state();
        let result = match state {
            ControlState::Armed => self.run_start().await.map(Some),
            ControlState::Recording => self.run_stop().await.map(Some),
            other => {
                tracing::info!(state = %other, "trigger discarded");
                self.emit(RecorderEvent::TriggerIgnored { state: other });
                Ok(None)
            }
        };
        self.dispatch_gate.store(false, Ordering::Release);
        result
    }

    async fn run_start(&self) -> ControlResult<AggregatedOutcome> {
        if !self.resync_pending.lock().is_empty() {
            self.emit(RecorderEvent::Error(
                "start refused: devices from a previous start are still recording".to_string(),
            ));
            return Err(ControlError::ResyncRequired);
        }

        let outcome = self.coordinator.dispatch(ShutterCommand::Start).await?;
        match outcome.status {
            OverallStatus::AllSucceeded => {
                self.set_state(ControlState::Recording);
                self.emit(RecorderEvent::Started);
            }
            OverallStatus::PartialFailure => {
                // some cameras are now rolling and some are not; hold the
                // rig in Armed and demand an explicit stop before any retry
                let started: Vec<String> =
                    outcome.succeeded().map(|r| r.device_id.clone()).collect();
                tracing::warn!(
                    started = ?started,
                    "start partially failed, explicit stop required"
                );
                *self.resync_pending.lock() = started;
                self.surface_failure(&outcome);
            }
            OverallStatus::TotalFailure => {
                self.surface_failure(&outcome);
            }
        }
        self.emit(RecorderEvent::PassCompleted(outcome.clone()));
        Ok(outcome)
    }

    async fn run_stop(&self) -> ControlResult<AggregatedOutcome> {
        self.set_state(ControlState::Stopping);
        let outcome = match self.coordinator.dispatch(ShutterCommand::Stop).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.set_state(ControlState::Recording);
                return Err(err);
            }
        };
        match outcome.status {
            OverallStatus::AllSucceeded => {
                self.set_state(ControlState::Idle);
                self.emit(RecorderEvent::Stopped);
            }
            OverallStatus::PartialFailure | OverallStatus::TotalFailure => {
                // whatever is still recording stays the target of the next
                // stop trigger
                self.set_state(ControlState::Recording);
                self.surface_failure(&outcome);
            }
        }
        self.emit(RecorderEvent::PassCompleted(outcome.clone()));
        Ok(outcome)
    }

    /// Stop the devices left recording by a partially failed start.
    ///
    /// Legal only from Armed with such devices outstanding. Once every one
    /// of them acknowledges the stop, starts are accepted again.
    pub async fn resync(&self) -> ControlResult<AggregatedOutcome> {
        let state = self.state();
        if state != ControlState::Armed {
            return Err(ControlError::InvalidState {
                operation: "resync",
                state: state.to_string(),
            });
        }
        if self.resync_pending.lock().is_empty() {
            return Err(ControlError::InvalidState {
                operation: "resync",
                state: "no devices pending".to_string(),
            });
        }
        if self
            .dispatch_gate
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ControlError::DispatchInFlight);
        }

        let dispatched = self.coordinator.dispatch(ShutterCommand::Stop).await;
        self.dispatch_gate.store(false, Ordering::Release);
        let outcome = dispatched?;

        {
            let mut pending = self.resync_pending.lock();
            let stopped: Vec<&str> = outcome
                .succeeded()
                .map(|r| r.device_id.as_str())
                .collect();
            pending.retain(|id| !stopped.contains(&id.as_str()));
            if pending.is_empty() {
                tracing::info!("rig resynchronized");
            } else {
                tracing::warn!(pending = ?*pending, "devices still unstopped after resync");
            }
        }
        if let Some(summary) = outcome.failure_summary() {
            self.emit(RecorderEvent::Error(format!("resync: {}", summary)));
        }
        self.emit(RecorderEvent::PassCompleted(outcome.clone()));
        Ok(outcome)
    }

    /// Query battery and storage from every device that can answer
    pub async fn health_report(&self) -> Vec<DeviceReport> {
        let mut reports = Vec::new();
        for session in self.registry.sessions() {
            let health = match session.health().await {
                Ok(health) => Some(health),
                Err(err) => {
                    tracing::debug!(device = %session.id(), error = %err, "health query failed");
                    None
                }
            };
            reports.push(DeviceReport {
                id: session.id().to_string(),
                label: session.label().to_string(),
                state: session.state(),
                battery_percent: health.as_ref().map(|h| h.battery_percent),
                storage_remaining_mb: health.as_ref().map(|h| h.storage_remaining_mb),
            });
        }
        reports
    }

    /// Disconnect every device and clear the roster
    pub async fn shutdown(&self) {
        tracing::info!("shutting down, disconnecting all devices");
        for session in self.registry.sessions() {
            let _ = session.disconnect().await;
            self.registry.remove(session.id());
        }
        self.resync_pending.lock().clear();
        self.set_state(ControlState::Idle);
    }

    fn surface_failure(&self, outcome: &AggregatedOutcome) {
        if let Some(summary) = outcome.failure_summary() {
            tracing::warn!(pass = %outcome.pass_id, %summary, "pass failed");
            self.emit(RecorderEvent::Error(summary));
        }
    }
}
