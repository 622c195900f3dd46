use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::domains::run::{RunId, RunState};

struct RunEntry {
    state: RunState,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Tracked {
    runs: HashMap<RunId, RunEntry>,
    pending_acks: usize,
}

impl Tracked {
    fn is_idle(&self) -> bool {
        self.runs.is_empty() && self.pending_acks == 0
    }
}

/// Owns every in-flight run until it reaches a terminal state, and counts
/// the acknowledgments those runs still have on the wire.
///
/// Entries are inserted before the run's task is spawned and removed by the
/// task itself, so a run that finishes quickly can never be left behind.
/// Concurrent runs are not coalesced.
pub struct RunRegistry {
    tracked: Mutex<Tracked>,
    next_id: AtomicU64,
    idle: Notify,
}

/// Held by an acknowledgment task for as long as its request is pending.
/// Dropping it, including when the task is aborted, settles the count.
pub struct PendingAck {
    registry: Arc<RunRegistry>,
}

impl Drop for PendingAck {
    fn drop(&mut self) {
        let now_idle = {
            let mut tracked = self.registry.tracked();
            tracked.pending_acks = tracked.pending_acks.saturating_sub(1);
            tracked.is_idle()
        };
        if now_idle {
            self.registry.idle.notify_waiters();
        }
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            tracked: Mutex::new(Tracked::default()),
            next_id: AtomicU64::new(1),
            idle: Notify::new(),
        }
    }

    /// Allocate a fresh id and register it in the `Fetching` state.
    pub fn begin(&self) -> RunId {
        let id = RunId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tracked().runs.insert(
            id,
            RunEntry {
                state: RunState::Fetching,
                handle: None,
            },
        );
        id
    }

    /// Keep the task handle alongside its entry. A run that already finished
    /// has no entry left and the handle is simply dropped.
    pub fn attach(&self, id: RunId, handle: JoinHandle<()>) {
        if let Some(entry) = self.tracked().runs.get_mut(&id) {
            entry.handle = Some(handle);
        }
    }

    pub fn set_state(&self, id: RunId, state: RunState) {
        if let Some(entry) = self.tracked().runs.get_mut(&id) {
            entry.state = state;
        }
    }

    /// Drop the entry for a finished run. Returns false if it was already gone.
    pub fn remove(&self, id: RunId) -> bool {
        let (removed, now_idle) = {
            let mut tracked = self.tracked();
            let removed = tracked.runs.remove(&id).is_some();
            (removed, tracked.is_idle())
        };
        if now_idle {
            self.idle.notify_waiters();
        }
        removed
    }

    /// Count one acknowledgment as outstanding until the guard is dropped.
    pub fn track_ack(self: &Arc<Self>) -> PendingAck {
        self.tracked().pending_acks += 1;
        PendingAck {
            registry: self.clone(),
        }
    }

    pub fn pending_acks(&self) -> usize {
        self.tracked().pending_acks
    }

    pub fn state(&self, id: RunId) -> Option<RunState> {
        self.tracked().runs.get(&id).map(|entry| entry.state)
    }

    pub fn len(&self) -> usize {
        self.tracked().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked().runs.is_empty()
    }

    pub fn ids(&self) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self.tracked().runs.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Resolve once no run is in flight and no acknowledgment is pending.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.tracked().is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn tracked(&self) -> MutexGuard<'_, Tracked> {
        self.tracked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
