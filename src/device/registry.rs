//! Device registry
//!
//! Owns every session discovered during a run and hands the coordinator a
//! stable target snapshot per pass. Membership changes that arrive while a
//! pass is in flight are queued and applied atomically once it completes,
//! so a snapshot is always a self-consistent view.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::device::session::{DeviceSession, DeviceState};
use crate::device::transport::ShutterCommand;
use crate::utils::error::{ControlError, ControlResult};

/// Read-only per-device summary for the presentation boundary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub id: String,
    pub label: String,
    pub state: DeviceState,
    pub latency_ms: Option<f64>,
}

enum PendingChange {
    Add(Arc<DeviceSession>),
    Remove(String),
}

struct Inner {
    sessions: BTreeMap<String, Arc<DeviceSession>>,
    pass_active: bool,
    pending: Vec<PendingChange>,
}

/// Registry of all known device sessions, keyed by device id
pub struct DeviceRegistry {
    inner: Mutex<Inner>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: BTreeMap::new(),
                pass_active: false,
                pending: Vec::new(),
            }),
        }
    }

    /// Add a session. Deferred until after the current pass if one is active.
    pub fn insert(&self, session: Arc<DeviceSession>) {
        let mut inner = self.inner.lock();
        if inner.pass_active {
            tracing::debug!(device = %session.id(), "pass in flight, deferring insert");
            inner.pending.push(PendingChange::Add(session));
            return;
        }
        apply_insert(&mut inner.sessions, session);
    }

    /// Remove a session by id. Deferred until after the current pass if one
    /// is active.
    pub fn remove(&self, id: &str) {
        let mut inner = self.inner.lock();
        if inner.pass_active {
            tracing::debug!(device = %id, "pass in flight, deferring removal");
            inner.pending.push(PendingChange::Remove(id.to_string()));
            return;
        }
        inner.sessions.remove(id);
    }

    pub fn get(&self, id: &str) -> Option<Arc<DeviceSession>> {
        self.inner.lock().sessions.get(id).cloned()
    }

    /// All current sessions, in id order
    pub fn sessions(&self) -> Vec<Arc<DeviceSession>> {
        self.inner.lock().sessions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().sessions.is_empty()
    }

    /// Snapshot the sessions whose state legally accepts `command`, in id
    /// order, and open a pass. The returned handles are cloned `Arc`s: the
    /// target set stays valid even if membership changes are queued behind
    /// the pass. Fails if a pass is already open.
    pub fn snapshot_ready(
        &self,
        command: ShutterCommand,
    ) -> ControlResult<Vec<Arc<DeviceSession>>> {
        let mut inner = self.inner.lock();
        if inner.pass_active {
            return Err(ControlError::DispatchInFlight);
        }
        inner.pass_active = true;
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.accepts(command))
            .cloned()
            .collect())
    }

    /// Close the pass opened by [`snapshot_ready`](Self::snapshot_ready) and
    /// apply queued membership changes in arrival order.
    pub fn complete_pass(&self) {
        let mut inner = self.inner.lock();
        inner.pass_active = false;
        let pending = std::mem::take(&mut inner.pending);
        for change in pending {
            match change {
                PendingChange::Add(session) => apply_insert(&mut inner.sessions, session),
                PendingChange::Remove(id) => {
                    inner.sessions.remove(&id);
                }
            }
        }
    }

    /// Immutable summaries of every session, for roster display
    pub fn roster(&self) -> Vec<DeviceSummary> {
        self.inner
            .lock()
            .sessions
            .values()
            .map(|s| DeviceSummary {
                id: s.id().to_string(),
                label: s.label().to_string(),
                state: s.state(),
                latency_ms: s.latency().map(|d| d.as_secs_f64() * 1000.0),
            })
            .collect()
    }

    /// Ids of sessions currently in the given state
    pub fn ids_in_state(&self, state: DeviceState) -> Vec<String> {
        self.inner
            .lock()
            .sessions
            .values()
            .filter(|s| s.state() == state)
            .map(|s| s.id().to_string())
            .collect()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_insert(sessions: &mut BTreeMap<String, Arc<DeviceSession>>, session: Arc<DeviceSession>) {
    let id = session.id().to_string();
    if sessions.insert(id.clone(), session).is_some() {
        tracing::warn!(device = %id, "replaced existing session with the same id");
    }
}
