//! Respawn flow — route a dead actor to a graveyard and shield them.
//!
//! The host calls [`RespawnHandler::on_respawn`] from its death/respawn
//! event with a snapshot of where the actor died; the handler picks the
//! nearest eligible graveyard, announces the routing, and opens the
//! graveyard's safety window. Disconnects drop any open window so a
//! relog never carries protection over.

use std::sync::Arc;

use graveyard_core::config::SafetyConfig;
use graveyard_core::cooldown::SafetyCooldownManager;
use graveyard_core::events::{EventSink, GraveyardEvent};
use graveyard_core::ports::{ActorSnapshot, Permissions};
use graveyard_core::resolver::{ProximityResolver, ResolveOptions};
use graveyard_core::types::{ActorId, Graveyard};
use tracing::{debug, info};

/// Connects the proximity resolver and cooldown manager to the host's
/// respawn events.
pub struct RespawnHandler {
    resolver: ProximityResolver,
    cooldowns: Arc<SafetyCooldownManager>,
    sink: Arc<dyn EventSink>,
    default_safety: i64,
}

impl RespawnHandler {
    /// Build a handler; `config` supplies the fallback safety window for
    /// graveyards that carry the negative sentinel.
    #[must_use]
    pub fn new(
        resolver: ProximityResolver,
        cooldowns: Arc<SafetyCooldownManager>,
        sink: Arc<dyn EventSink>,
        config: &SafetyConfig,
    ) -> Self {
        Self {
            resolver,
            cooldowns,
            sink,
            default_safety: config.default_seconds,
        }
    }

    /// Resolve the respawn target for an actor who died at `snapshot`.
    ///
    /// When a graveyard is found, a `Respawned` event fires and the
    /// actor receives that graveyard's effective safety window. Returns
    /// the chosen graveyard so the host can teleport the actor; `None`
    /// means the host should fall back to its own respawn logic.
    pub fn on_respawn(
        &self,
        snapshot: &ActorSnapshot,
        perms: &dyn Permissions,
    ) -> Option<Graveyard> {
        let Some(graveyard) = self
            .resolver
            .nearest(snapshot, perms, ResolveOptions::default())
        else {
            debug!(actor = %snapshot.actor, "no eligible graveyard; host fallback");
            return None;
        };

        info!(
            actor = %snapshot.actor,
            key = graveyard.search_key(),
            "respawn routed"
        );
        self.sink.notify(GraveyardEvent::Respawned {
            actor: snapshot.actor,
            graveyard: graveyard.clone(),
        });
        self.cooldowns
            .grant(snapshot.actor, graveyard.safety_time_or(self.default_safety));
        Some(graveyard)
    }

    /// Drop any open safety window when an actor disconnects.
    pub fn on_disconnect(&self, actor: ActorId) {
        self.cooldowns.remove(actor);
    }

    /// True while the actor is inside a safety window.
    #[must_use]
    pub fn is_protected(&self, actor: ActorId) -> bool {
        self.cooldowns.is_protected(actor)
    }
}
