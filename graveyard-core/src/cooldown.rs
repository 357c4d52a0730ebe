//! Post-respawn safety cooldowns.
//!
//! Each actor can hold at most one pending protection window at a time.
//! Granting while protected cancels the old timer and installs a fresh
//! one (replace, not stack), so the window resets rather than extends.
//! State is in-memory only: a process restart clears all cooldowns.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::events::{EventSink, GraveyardEvent};
use crate::schedule::{ScheduleHandle, Scheduler};
use crate::types::ActorId;

struct Entry {
    /// Identifies which timer owns this entry. A fired timer whose
    /// generation no longer matches lost a race with cancellation and
    /// must not act.
    generation: u64,
    handle: ScheduleHandle,
}

/// Tracks temporary protected status per actor, with one-shot expiry.
pub struct SafetyCooldownManager {
    entries: DashMap<ActorId, Entry>,
    scheduler: Arc<dyn Scheduler>,
    sink: Arc<dyn EventSink>,
    next_generation: AtomicU64,
}

impl SafetyCooldownManager {
    /// Create a manager that schedules expiry on `scheduler` and reports
    /// grants/expiries to `sink`.
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            entries: DashMap::new(),
            scheduler,
            sink,
            next_generation: AtomicU64::new(0),
        }
    }

    /// Grant the actor protection for `seconds`.
    ///
    /// A non-positive duration is a no-op. If the actor is already
    /// protected, the pending timer is cancelled and replaced; the
    /// actor stays continuously protected across the re-grant.
    pub fn grant(self: &Arc<Self>, actor: ActorId, seconds: i64) {
        if seconds <= 0 {
            return;
        }
        let duration = Duration::from_secs(seconds.unsigned_abs());
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);

        let manager = Arc::clone(self);
        let handle = self
            .scheduler
            .schedule_once(duration, Box::new(move || manager.expire(actor, generation)));

        // DashMap::insert is atomic per key: whatever timer it displaces
        // is cancelled here, never left racing the new one.
        if let Some(old) = self.entries.insert(actor, Entry { generation, handle }) {
            old.handle.cancel();
        }

        debug!(actor = %actor, seconds, "safety cooldown granted");
        self.sink
            .notify(GraveyardEvent::ProtectionGranted { actor, duration });
    }

    /// Whether the actor currently holds a protection window.
    #[must_use]
    pub fn is_protected(&self, actor: ActorId) -> bool {
        self.entries.contains_key(&actor)
    }

    /// Drop the actor's protection and cancel its timer, if any. Used
    /// for explicit cancellation (e.g. disconnect); idempotent, emits
    /// no expiry notification.
    pub fn remove(&self, actor: ActorId) {
        if let Some((_, entry)) = self.entries.remove(&actor) {
            entry.handle.cancel();
            debug!(actor = %actor, "safety cooldown removed");
        }
    }

    /// Number of actors currently protected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no actor is currently protected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Timer callback: remove the entry if this timer still owns it.
    /// Losing the race to a cancel or re-grant makes this a no-op.
    fn expire(&self, actor: ActorId, generation: u64) {
        let removed = self
            .entries
            .remove_if(&actor, |_, entry| entry.generation == generation)
            .is_some();
        if removed {
            debug!(actor = %actor, "safety cooldown expired");
            self.sink.notify(GraveyardEvent::ProtectionExpired { actor });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
