//! Nearest-eligible-graveyard resolution.
//!
//! Given where an actor stands, pick the single closest graveyard that
//! the actor is allowed to use. Record counts are small, so this is a
//! plain scan over the store — no spatial index.

use std::sync::Arc;

use tracing::debug;

use crate::ports::{ActorSnapshot, Permissions, WorldCatalog, group_allows};
use crate::store::Store;
use crate::types::Graveyard;

/// Resolution policy toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Consider hidden graveyards the actor has not discovered. Used by
    /// admin inspection, never by the normal respawn path.
    pub include_undiscovered_hidden: bool,
}

/// Finds the nearest eligible graveyard for an actor.
pub struct ProximityResolver {
    store: Arc<Store>,
    worlds: Arc<dyn WorldCatalog>,
}

impl ProximityResolver {
    /// Create a resolver over the given store.
    #[must_use]
    pub fn new(store: Arc<Store>, worlds: Arc<dyn WorldCatalog>) -> Self {
        Self { store, worlds }
    }

    /// The nearest eligible graveyard for the actor at `snapshot`, or
    /// `None` when no candidate qualifies.
    ///
    /// Eligibility: same world as the actor, resolvable location,
    /// enabled, group open or permitted, and — for hidden graveyards —
    /// already discovered unless overridden. Distance is squared
    /// Euclidean; an exact tie goes to whichever candidate the store
    /// iterated first.
    #[must_use]
    pub fn nearest(
        &self,
        snapshot: &ActorSnapshot,
        perms: &dyn Permissions,
        options: ResolveOptions,
    ) -> Option<Graveyard> {
        // Only fetched when a hidden candidate shows up.
        let mut discovered = None;

        let mut best: Option<(f64, Graveyard)> = None;
        for graveyard in self.store.select_all() {
            let Some(site) = graveyard.resolved_site(self.worlds.as_ref()) else {
                continue;
            };
            if site.world != snapshot.world || !graveyard.enabled() {
                continue;
            }
            if !group_allows(perms, snapshot.actor, graveyard.group()) {
                continue;
            }
            if graveyard.hidden() && !options.include_undiscovered_hidden {
                let discovered = discovered
                    .get_or_insert_with(|| self.store.select_discovered_keys(snapshot.actor));
                if !discovered.contains(graveyard.search_key()) {
                    continue;
                }
            }

            let dist_sq = site.distance_sq(snapshot.x, snapshot.y, snapshot.z);
            if best.as_ref().is_none_or(|(best_sq, _)| dist_sq < *best_sq) {
                best = Some((dist_sq, graveyard));
            }
        }

        let result = best.map(|(dist_sq, graveyard)| {
            debug!(
                actor = %snapshot.actor,
                graveyard = graveyard.search_key(),
                dist_sq,
                "resolved nearest graveyard"
            );
            graveyard
        });
        if result.is_none() {
            debug!(actor = %snapshot.actor, world = %snapshot.world, "no eligible graveyard");
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{AllowAll, StaticWorlds};
    use crate::types::{ActorId, Discovery, Site, WorldId};

    fn worlds() -> Arc<StaticWorlds> {
        Arc::new(StaticWorlds::of(["overworld", "nether"]))
    }

    fn setup() -> (Arc<Store>, ProximityResolver) {
        let worlds = worlds();
        let store =
            Arc::new(Store::open_in_memory(worlds.clone()).expect("open"));
        let resolver = ProximityResolver::new(Arc::clone(&store), worlds);
        (store, resolver)
    }

    fn at(name: &str, world: &str, x: f64) -> Graveyard {
        Graveyard::new(name, Site::new(WorldId::from(world), x, 0.0, 0.0))
    }

    fn actor_at_origin() -> ActorSnapshot {
        ActorSnapshot::new(ActorId::new(), WorldId::from("overworld"), 0.0, 0.0, 0.0)
    }

    struct DenyAll;
    impl Permissions for DenyAll {
        fn has(&self, _actor: ActorId, _node: &str) -> bool {
            false
        }
    }

    #[test]
    fn picks_the_closest_enabled() {
        let (store, resolver) = setup();
        store.insert(at("Near", "overworld", 10.0));
        store.insert(at("Mid", "overworld", 20.0));
        store.insert(at("Far", "overworld", 30.0));
        store.flush();

        let best = resolver
            .nearest(&actor_at_origin(), &AllowAll, ResolveOptions::default())
            .expect("resolved");
        assert_eq!(best.search_key(), "Near");
    }

    #[test]
    fn disabled_falls_through_to_next() {
        let (store, resolver) = setup();
        store.insert(at("Near", "overworld", 10.0).with_enabled(false));
        store.insert(at("Mid", "overworld", 20.0));
        store.insert(at("Far", "overworld", 30.0));
        store.flush();

        let best = resolver
            .nearest(&actor_at_origin(), &AllowAll, ResolveOptions::default())
            .expect("resolved");
        assert_eq!(best.search_key(), "Mid");
    }

    #[test]
    fn cross_world_candidates_are_never_returned() {
        let (store, resolver) = setup();
        // Numerically adjacent, but in another world.
        store.insert(at("Wrong", "nether", 1.0));
        store.insert(at("Right", "overworld", 500.0));
        store.flush();

        let best = resolver
            .nearest(&actor_at_origin(), &AllowAll, ResolveOptions::default())
            .expect("resolved");
        assert_eq!(best.search_key(), "Right");
    }

    #[test]
    fn no_candidates_is_none() {
        let (_store, resolver) = setup();
        assert!(
            resolver
                .nearest(&actor_at_origin(), &AllowAll, ResolveOptions::default())
                .is_none()
        );
    }

    #[test]
    fn group_restriction_requires_permission() {
        let (store, resolver) = setup();
        store.insert(at("Members", "overworld", 5.0).with_group("vip"));
        store.insert(at("Open", "overworld", 50.0));
        store.flush();

        let snapshot = actor_at_origin();
        let denied = resolver
            .nearest(&snapshot, &DenyAll, ResolveOptions::default())
            .expect("resolved");
        assert_eq!(denied.search_key(), "Open");

        let allowed = resolver
            .nearest(&snapshot, &AllowAll, ResolveOptions::default())
            .expect("resolved");
        assert_eq!(allowed.search_key(), "Members");
    }

    #[test]
    fn hidden_needs_discovery_unless_overridden() {
        let (store, resolver) = setup();
        store.insert(at("Secret", "overworld", 5.0).with_hidden(true));
        store.insert(at("Open", "overworld", 50.0));
        store.flush();

        let snapshot = actor_at_origin();
        let before = resolver
            .nearest(&snapshot, &AllowAll, ResolveOptions::default())
            .expect("resolved");
        assert_eq!(before.search_key(), "Open");

        let admin_view = resolver
            .nearest(
                &snapshot,
                &AllowAll,
                ResolveOptions {
                    include_undiscovered_hidden: true,
                },
            )
            .expect("resolved");
        assert_eq!(admin_view.search_key(), "Secret");

        store.insert_discovery(Discovery::new("Secret", snapshot.actor));
        store.flush();
        let after = resolver
            .nearest(&snapshot, &AllowAll, ResolveOptions::default())
            .expect("resolved");
        assert_eq!(after.search_key(), "Secret");
    }

    #[test]
    fn unresolved_world_candidate_is_skipped() {
        let worlds = worlds();
        let store = Arc::new(Store::open_in_memory(worlds.clone()).expect("open"));
        let resolver = ProximityResolver::new(Arc::clone(&store), worlds);

        store.insert(at("Home", "overworld", 100.0));
        store.flush();

        // A world can unload after records were persisted; simulate by
        // resolving against a catalog that no longer lists it.
        let gone = Arc::new(StaticWorlds::of(["nether"]));
        let resolver_gone = ProximityResolver::new(Arc::clone(&store), gone);
        let snapshot = actor_at_origin();

        assert!(resolver_gone
            .nearest(&snapshot, &AllowAll, ResolveOptions::default())
            .is_none());
        assert!(resolver
            .nearest(&snapshot, &AllowAll, ResolveOptions::default())
            .is_some());
    }
}
