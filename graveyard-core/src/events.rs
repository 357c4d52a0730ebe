//! Notification events emitted by the core.
//!
//! The core decides *that* a notification fires and with what data; a
//! host-supplied [`EventSink`] turns it into user-visible text, sound, or
//! anything else. The core never formats messages itself.

use std::time::Duration;

use crate::types::{ActorId, Graveyard};

/// A notification raised by the core for external consumption.
#[derive(Debug, Clone)]
pub enum GraveyardEvent {
    /// An actor came within discovery range of a graveyard for the
    /// first time.
    Discovered {
        /// The discovering actor.
        actor: ActorId,
        /// The graveyard that was discovered.
        graveyard: Graveyard,
    },

    /// An actor was routed to a graveyard after a respawn-like event.
    Respawned {
        /// The respawning actor.
        actor: ActorId,
        /// The graveyard the actor was routed to.
        graveyard: Graveyard,
    },

    /// An actor was granted a temporary protection window.
    ProtectionGranted {
        /// The protected actor.
        actor: ActorId,
        /// Length of the window.
        duration: Duration,
    },

    /// An actor's protection window ran out.
    ProtectionExpired {
        /// The formerly protected actor.
        actor: ActorId,
    },
}

/// Sink for [`GraveyardEvent`]s, implemented by the host messaging layer.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block; implementations that do real
    /// I/O should hand off internally.
    fn notify(&self, event: GraveyardEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn notify(&self, _event: GraveyardEvent) {}
}

/// Sink that records events for later inspection. Intended for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<GraveyardEvent>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events delivered so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<GraveyardEvent> {
        self.events.lock().clone()
    }

    /// Number of events delivered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether no events were delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: GraveyardEvent) {
        self.events.lock().push(event);
    }
}
