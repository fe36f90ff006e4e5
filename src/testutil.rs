//! Test support
//!
//! A scripted transport standing in for a real camera link, plus helpers
//! for building sessions in known states.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::sleep;

use crate::config::RecorderConfig;
use crate::device::session::DeviceSession;
use crate::device::transport::{
    CommandAck, DeviceDescriptor, DeviceHealth, PrepareSettings, ShutterCommand,
    ShutterTransport, TransportError,
};

/// What a scripted operation should do when called
#[derive(Debug, Clone)]
pub enum ShutterBehavior {
    Succeed,
    Fail(TransportError),
    /// Never answer; the session's budget decides when to give up
    Hang,
}

/// Scripted transport for tests
pub struct MockTransport {
    shutter_delay: Duration,
    start_behavior: ShutterBehavior,
    stop_behavior: ShutterBehavior,
    prepare_behavior: ShutterBehavior,
    connect_behavior: ShutterBehavior,
    /// is_ready reports true from this many polls onward
    ready_after_polls: usize,
    shutter_calls: AtomicUsize,
    ready_polls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            shutter_delay: Duration::ZERO,
            start_behavior: ShutterBehavior::Succeed,
            stop_behavior: ShutterBehavior::Succeed,
            prepare_behavior: ShutterBehavior::Succeed,
            connect_behavior: ShutterBehavior::Succeed,
            ready_after_polls: 0,
            shutter_calls: AtomicUsize::new(0),
            ready_polls: AtomicUsize::new(0),
        }
    }

    pub fn with_shutter_delay(mut self, millis: u64) -> Self {
        self.shutter_delay = Duration::from_millis(millis);
        self
    }

    pub fn with_start(mut self, behavior: ShutterBehavior) -> Self {
        self.start_behavior = behavior;
        self
    }

    pub fn with_stop(mut self, behavior: ShutterBehavior) -> Self {
        self.stop_behavior = behavior;
        self
    }

    pub fn with_prepare(mut self, behavior: ShutterBehavior) -> Self {
        self.prepare_behavior = behavior;
        self
    }

    pub fn with_ready_after_polls(mut self, polls: usize) -> Self {
        self.ready_after_polls = polls;
        self
    }

    /// How many shutter commands actually reached this transport
    pub fn shutter_calls(&self) -> usize {
        self.shutter_calls.load(Ordering::SeqCst)
    }

    /// How many readiness polls this transport has answered
    pub fn ready_polls(&self) -> usize {
        self.ready_polls.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShutterTransport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        match &self.connect_behavior {
            ShutterBehavior::Succeed => Ok(()),
            ShutterBehavior::Fail(err) => Err(err.clone()),
            ShutterBehavior::Hang => {
                sleep(Duration::from_secs(3_600)).await;
                Err(TransportError::Timeout)
            }
        }
    }

    async fn prepare(&self, _settings: &PrepareSettings) -> Result<(), TransportError> {
        match &self.prepare_behavior {
            ShutterBehavior::Succeed => Ok(()),
            ShutterBehavior::Fail(err) => Err(err.clone()),
            ShutterBehavior::Hang => {
                sleep(Duration::from_secs(3_600)).await;
                Err(TransportError::Timeout)
            }
        }
    }

    async fn is_ready(&self) -> Result<bool, TransportError> {
        let polls = self.ready_polls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(polls >= self.ready_after_polls)
    }

    async fn send_shutter(&self, command: ShutterCommand) -> Result<CommandAck, TransportError> {
        self.shutter_calls.fetch_add(1, Ordering::SeqCst);
        sleep(self.shutter_delay).await;
        let behavior = match command {
            ShutterCommand::Start => &self.start_behavior,
            ShutterCommand::Stop => &self.stop_behavior,
        };
        match behavior {
            ShutterBehavior::Succeed => Ok(CommandAck {
                acked_unix_ms: Utc::now().timestamp_millis() as u64,
            }),
            ShutterBehavior::Fail(err) => Err(err.clone()),
            ShutterBehavior::Hang => {
                sleep(Duration::from_secs(3_600)).await;
                Err(TransportError::Timeout)
            }
        }
    }

    async fn query_status(&self) -> Result<DeviceHealth, TransportError> {
        Ok(DeviceHealth {
            battery_percent: 82,
            storage_remaining_mb: 12_800.0,
        })
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub fn descriptor(id: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        id: id.to_string(),
        label: id.to_string(),
    }
}

/// A session that has connected but not prepared
pub async fn connected_session(
    id: &str,
    mock: MockTransport,
) -> (Arc<DeviceSession>, Arc<MockTransport>) {
    let mock = Arc::new(mock);
    let session = Arc::new(DeviceSession::new(
        descriptor(id),
        mock.clone(),
        &RecorderConfig::default(),
    ));
    session.connect().await.unwrap();
    (session, mock)
}

/// A session connected, prepared and Ready
pub async fn ready_session(
    id: &str,
    mock: MockTransport,
) -> (Arc<DeviceSession>, Arc<MockTransport>) {
    let (session, mock) = connected_session(id, mock).await;
    session.prepare(&PrepareSettings::default()).await.unwrap();
    (session, mock)
}
