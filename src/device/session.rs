//! Device session
//!
//! Wraps one physical camera's link and exposes its async command
//! primitives. State transitions happen only here or in the coordinator's
//! dispatch path; no other component mutates a session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::{sleep, timeout, Instant};

use crate::config::RecorderConfig;
use crate::device::transport::{
    DeviceDescriptor, DeviceHealth, PrepareSettings, ShutterCommand, ShutterTransport,
    TransportError,
};
use crate::recorder::outcome::{DeviceOutcome, PerDeviceResult};
use crate::utils::error::{ControlError, ControlResult};

/// Connection/readiness state of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Disconnected,
    Connecting,
    Connected,
    Preparing,
    Ready,
    Recording,
    Faulted,
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeviceState::Disconnected => "disconnected",
            DeviceState::Connecting => "connecting",
            DeviceState::Connected => "connected",
            DeviceState::Preparing => "preparing",
            DeviceState::Ready => "ready",
            DeviceState::Recording => "recording",
            DeviceState::Faulted => "faulted",
        };
        write!(f, "{}", name)
    }
}

/// One physical camera's connection and command state
pub struct DeviceSession {
    id: String,
    label: String,
    transport: Arc<dyn ShutterTransport>,
    state: RwLock<DeviceState>,
    latency: RwLock<Option<Duration>>,
    command_timeout: Duration,
    connect_timeout: Duration,
    ready_poll_attempts: u32,
    ready_poll_interval: Duration,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("state", &*self.state.read())
            .field("latency", &*self.latency.read())
            .finish()
    }
}

impl DeviceSession {
    /// Create a session for a discovered device. The session starts
    /// Disconnected; call [`connect`](Self::connect) to bring the link up.
    pub fn new(
        descriptor: DeviceDescriptor,
        transport: Arc<dyn ShutterTransport>,
        config: &RecorderConfig,
    ) -> Self {
        Self {
            id: descriptor.id,
            label: descriptor.label,
            transport,
            state: RwLock::new(DeviceState::Disconnected),
            latency: RwLock::new(None),
            command_timeout: config.command_timeout(),
            connect_timeout: config.connect_timeout(),
            ready_poll_attempts: config.ready_poll_attempts,
            ready_poll_interval: config.ready_poll_interval(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current state
    pub fn state(&self) -> DeviceState {
        *self.state.read()
    }

    /// Most recent command round trip, if any command has completed
    pub fn latency(&self) -> Option<Duration> {
        *self.latency.read()
    }

    /// Whether this session's state legally accepts the given command
    pub fn accepts(&self, command: ShutterCommand) -> bool {
        matches!(
            (command, self.state()),
            (ShutterCommand::Start, DeviceState::Ready)
                | (ShutterCommand::Stop, DeviceState::Recording)
        )
    }

    fn set_state(&self, to: DeviceState) {
        let mut state = self.state.write();
        tracing::debug!(device = %self.id, from = %*state, to = %to, "session state change");
        *state = to;
    }

    /// Session state after a transport failure outside the issue path.
    /// A rejected setting leaves the link usable; a dropped link does not.
    fn apply_fault(&self, err: &TransportError) {
        let next = match err {
            TransportError::UnsupportedSetting(_) => DeviceState::Connected,
            TransportError::LinkLost | TransportError::LinkUnavailable(_) => {
                DeviceState::Disconnected
            }
            TransportError::Timeout | TransportError::ProtocolError(_) => DeviceState::Faulted,
        };
        tracing::warn!(device = %self.id, error = %err, next = %next, "transport fault");
        self.set_state(next);
    }

    /// Establish the link. Legal from Disconnected and from Faulted (a
    /// faulted device requires a full reconnect, not just a re-prepare).
    pub async fn connect(&self) -> ControlResult<()> {
        let current = self.state();
        if !matches!(current, DeviceState::Disconnected | DeviceState::Faulted) {
            return Err(ControlError::InvalidState {
                operation: "connect",
                state: current.to_string(),
            });
        }
        self.set_state(DeviceState::Connecting);

        match timeout(self.connect_timeout, self.transport.connect()).await {
            Ok(Ok(())) => {
                self.set_state(DeviceState::Connected);
                tracing::info!(device = %self.id, label = %self.label, "connected");
                Ok(())
            }
            Ok(Err(err)) => {
                self.set_state(DeviceState::Disconnected);
                tracing::warn!(device = %self.id, error = %err, "connect failed");
                Err(err.into())
            }
            Err(_) => {
                self.set_state(DeviceState::Disconnected);
                tracing::warn!(device = %self.id, "connect timed out");
                Err(TransportError::Timeout.into())
            }
        }
    }

    /// Apply recording settings, then poll the device until it reports ready.
    /// On success the session is Ready; if the poll budget runs out the
    /// session returns to Connected so the operator can retry.
    pub async fn prepare(&self, settings: &PrepareSettings) -> ControlResult<()> {
        let current = self.state();
        if current != DeviceState::Connected {
            return Err(ControlError::InvalidState {
                operation: "prepare",
                state: current.to_string(),
            });
        }
        self.set_state(DeviceState::Preparing);

        if let Err(err) = self.transport.prepare(settings).await {
            self.apply_fault(&err);
            return Err(err.into());
        }

        for attempt in 0..self.ready_poll_attempts {
            match self.transport.is_ready().await {
                Ok(true) => {
                    self.set_state(DeviceState::Ready);
                    tracing::info!(device = %self.id, label = %self.label, "ready");
                    return Ok(());
                }
                Ok(false) => {
                    tracing::debug!(device = %self.id, attempt, "not ready yet");
                    sleep(self.ready_poll_interval).await;
                }
                Err(err) => {
                    self.apply_fault(&err);
                    return Err(err.into());
                }
            }
        }

        self.set_state(DeviceState::Connected);
        Err(ControlError::DeviceNotReady {
            device: self.label.clone(),
            reason: format!(
                "did not report ready within {} polls",
                self.ready_poll_attempts
            ),
        })
    }

    /// Issue a shutter command with the per-command budget applied.
    ///
    /// Only legal when the state accepts the command (Ready for Start,
    /// Recording for Stop); anywhere else this fails without side effects.
    /// Failures are returned as result values, never retried here: retry
    /// policy belongs to the caller at whole-command granularity.
    pub async fn issue(&self, command: ShutterCommand) -> ControlResult<PerDeviceResult> {
        let current = self.state();
        if !matches!(
            (command, current),
            (ShutterCommand::Start, DeviceState::Ready)
                | (ShutterCommand::Stop, DeviceState::Recording)
        ) {
            return Err(ControlError::InvalidState {
                operation: "issue",
                state: current.to_string(),
            });
        }

        let started = Instant::now();
        let (outcome, detail) =
            match timeout(self.command_timeout, self.transport.send_shutter(command)).await {
                Ok(Ok(_ack)) => (DeviceOutcome::Success, None),
                Ok(Err(err)) => classify_transport_error(&err),
                Err(_) => (DeviceOutcome::Timeout, None),
            };
        let completed_at = Instant::now();
        let round_trip = completed_at.duration_since(started);

        let next = match outcome {
            DeviceOutcome::Success => match command {
                ShutterCommand::Start => DeviceState::Recording,
                ShutterCommand::Stop => DeviceState::Ready,
            },
            DeviceOutcome::Timeout | DeviceOutcome::ProtocolError => DeviceState::Faulted,
            DeviceOutcome::LinkLost => DeviceState::Disconnected,
        };
        self.set_state(next);

        if outcome.is_success() {
            *self.latency.write() = Some(round_trip);
        } else {
            tracing::warn!(
                device = %self.id,
                label = %self.label,
                command = %command,
                outcome = ?outcome,
                "shutter command failed"
            );
        }

        Ok(PerDeviceResult {
            device_id: self.id.clone(),
            label: self.label.clone(),
            outcome,
            detail,
            round_trip_ms: round_trip.as_secs_f64() * 1000.0,
            completed_unix_ms: Utc::now().timestamp_millis() as u64,
            completed_at,
        })
    }

    /// Query battery and storage state from the device
    pub async fn health(&self) -> ControlResult<DeviceHealth> {
        let current = self.state();
        if matches!(current, DeviceState::Disconnected | DeviceState::Connecting) {
            return Err(ControlError::InvalidState {
                operation: "health",
                state: current.to_string(),
            });
        }
        Ok(self.transport.query_status().await?)
    }

    /// Release the link. Always safe to call; the session ends Disconnected.
    pub async fn disconnect(&self) -> ControlResult<()> {
        if self.state() == DeviceState::Disconnected {
            return Ok(());
        }
        let result = self.transport.disconnect().await;
        self.set_state(DeviceState::Disconnected);
        if let Err(err) = result {
            tracing::warn!(device = %self.id, error = %err, "disconnect reported an error");
            return Err(err.into());
        }
        tracing::info!(device = %self.id, label = %self.label, "disconnected");
        Ok(())
    }
}

/// Map a transport failure onto a per-device outcome, keeping the vendor
/// detail for operator messages.
fn classify_transport_error(err: &TransportError) -> (DeviceOutcome, Option<String>) {
    match err {
        TransportError::Timeout => (DeviceOutcome::Timeout, None),
        TransportError::ProtocolError(detail) => {
            (DeviceOutcome::ProtocolError, Some(detail.clone()))
        }
        TransportError::UnsupportedSetting(detail) => {
            (DeviceOutcome::ProtocolError, Some(detail.clone()))
        }
        TransportError::LinkLost => (DeviceOutcome::LinkLost, None),
        TransportError::LinkUnavailable(detail) => {
            (DeviceOutcome::LinkLost, Some(detail.clone()))
        }
    }
}
