//! Periodic discovery scanning.
//!
//! On each pass, every online actor holding the discover permission is
//! checked against the graveyards they have not yet encountered. Coming
//! within discovery range records the pair and raises one
//! [`GraveyardEvent::Discovered`]; the transition is one-way, undone only
//! by an explicit forget through the store.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::DiscoveryConfig;
use crate::events::{EventSink, GraveyardEvent};
use crate::ports::{ActorProvider, NODE_DISCOVER, Permissions, WorldCatalog, group_allows};
use crate::schedule::{ScheduleHandle, Scheduler};
use crate::store::Store;
use crate::types::Discovery;

/// Recurring proximity-discovery pass over all online actors.
pub struct DiscoveryScanner {
    store: Arc<Store>,
    worlds: Arc<dyn WorldCatalog>,
    actors: Arc<dyn ActorProvider>,
    perms: Arc<dyn Permissions>,
    sink: Arc<dyn EventSink>,
    default_range: i32,
    interval: Duration,
}

impl DiscoveryScanner {
    /// Wire a scanner over the given store and host ports.
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        worlds: Arc<dyn WorldCatalog>,
        actors: Arc<dyn ActorProvider>,
        perms: Arc<dyn Permissions>,
        sink: Arc<dyn EventSink>,
        config: &DiscoveryConfig,
    ) -> Self {
        Self {
            store,
            worlds,
            actors,
            perms,
            sink,
            default_range: config.default_range,
            interval: Duration::from_secs(config.scan_interval_seconds),
        }
    }

    /// Run one scan pass.
    ///
    /// An actor without the discover permission is skipped for the pass;
    /// a graveyard whose world is unloaded is skipped for that actor. One
    /// pass may discover several graveyards for one actor. The new
    /// discovery record is queued through the store's async writer — the
    /// scan interval dwarfs queue latency, so the next pass sees it.
    pub fn run_pass(&self) {
        let mut found = 0_usize;
        for snapshot in self.actors.online_actors() {
            if !self.perms.has(snapshot.actor, NODE_DISCOVER) {
                continue;
            }
            for graveyard in self.store.select_undiscovered(snapshot.actor) {
                let Some(site) = graveyard.resolved_site(self.worlds.as_ref()) else {
                    continue;
                };
                if site.world != snapshot.world {
                    continue;
                }
                if !group_allows(self.perms.as_ref(), snapshot.actor, graveyard.group()) {
                    continue;
                }
                let range = f64::from(graveyard.discovery_range_or(self.default_range));
                if site.distance_sq(snapshot.x, snapshot.y, snapshot.z) > range * range {
                    continue;
                }

                debug!(
                    actor = %snapshot.actor,
                    graveyard = graveyard.search_key(),
                    "graveyard discovered"
                );
                self.store
                    .insert_discovery(Discovery::new(graveyard.search_key(), snapshot.actor));
                self.sink.notify(GraveyardEvent::Discovered {
                    actor: snapshot.actor,
                    graveyard,
                });
                found += 1;
            }
        }
        if found > 0 {
            debug!(found, "discovery pass complete");
        }
    }

    /// Configured pass interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the recurring pass on `scheduler`. Cancel the returned
    /// handle to stop scanning.
    #[must_use]
    pub fn spawn_on(self: &Arc<Self>, scheduler: &dyn Scheduler) -> ScheduleHandle {
        let scanner = Arc::clone(self);
        scheduler.schedule_every(self.interval, Arc::new(move || scanner.run_pass()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::ports::{ActorSnapshot, AllowAll, StaticWorlds};
    use crate::schedule::ManualScheduler;
    use crate::types::{ActorId, Graveyard, Site, WorldId};
    use parking_lot::Mutex;

    struct StubActors(Mutex<Vec<ActorSnapshot>>);

    impl StubActors {
        fn one(snapshot: ActorSnapshot) -> Arc<Self> {
            Arc::new(Self(Mutex::new(vec![snapshot])))
        }
    }

    impl ActorProvider for StubActors {
        fn online_actors(&self) -> Vec<ActorSnapshot> {
            self.0.lock().clone()
        }
    }

    struct NoDiscoverPerm;

    impl Permissions for NoDiscoverPerm {
        fn has(&self, _actor: ActorId, node: &str) -> bool {
            node != NODE_DISCOVER
        }
    }

    fn worlds() -> Arc<StaticWorlds> {
        Arc::new(StaticWorlds::of(["overworld"]))
    }

    fn graveyard_at(name: &str, x: f64) -> Graveyard {
        Graveyard::new(name, Site::new(WorldId::from("overworld"), x, 0.0, 0.0))
    }

    fn scanner_with(
        store: Arc<Store>,
        actors: Arc<dyn ActorProvider>,
        perms: Arc<dyn Permissions>,
    ) -> (Arc<DiscoveryScanner>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let scanner = Arc::new(DiscoveryScanner::new(
            store,
            worlds(),
            actors,
            perms,
            Arc::clone(&sink) as Arc<dyn EventSink>,
            &DiscoveryConfig::default(),
        ));
        (scanner, sink)
    }

    fn store() -> Arc<Store> {
        Arc::new(Store::open_in_memory(worlds()).expect("open"))
    }

    #[test]
    fn discovers_within_range_once() {
        let store = store();
        let actor = ActorId::new();
        store.insert(graveyard_at("Near", 10.0).with_discovery_range(20));
        store.flush();

        let snapshot = ActorSnapshot::new(actor, WorldId::from("overworld"), 0.0, 0.0, 0.0);
        let (scanner, sink) = scanner_with(
            Arc::clone(&store),
            StubActors::one(snapshot),
            Arc::new(AllowAll),
        );

        scanner.run_pass();
        store.flush();
        assert_eq!(sink.len(), 1);
        assert!(store.select_discovered_keys(actor).contains("Near"));

        // Second pass: already discovered, no second event.
        scanner.run_pass();
        store.flush();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn out_of_range_is_not_discovered() {
        let store = store();
        let actor = ActorId::new();
        store.insert(graveyard_at("Far", 100.0).with_discovery_range(20));
        store.flush();

        let snapshot = ActorSnapshot::new(actor, WorldId::from("overworld"), 0.0, 0.0, 0.0);
        let (scanner, sink) = scanner_with(
            Arc::clone(&store),
            StubActors::one(snapshot),
            Arc::new(AllowAll),
        );

        scanner.run_pass();
        store.flush();
        assert!(sink.is_empty());
        assert!(store.select_discovered_keys(actor).is_empty());
    }

    #[test]
    fn sentinel_range_falls_back_to_default() {
        let store = store();
        let actor = ActorId::new();
        // Default range is 40; the sentinel record sits at distance 35.
        store.insert(graveyard_at("Sentinel", 35.0));
        store.flush();

        let snapshot = ActorSnapshot::new(actor, WorldId::from("overworld"), 0.0, 0.0, 0.0);
        let (scanner, sink) = scanner_with(
            Arc::clone(&store),
            StubActors::one(snapshot),
            Arc::new(AllowAll),
        );

        scanner.run_pass();
        store.flush();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn one_pass_can_discover_several() {
        let store = store();
        let actor = ActorId::new();
        store.insert(graveyard_at("A", 5.0));
        store.insert(graveyard_at("B", -5.0));
        store.flush();

        let snapshot = ActorSnapshot::new(actor, WorldId::from("overworld"), 0.0, 0.0, 0.0);
        let (scanner, sink) = scanner_with(
            Arc::clone(&store),
            StubActors::one(snapshot),
            Arc::new(AllowAll),
        );

        scanner.run_pass();
        store.flush();
        assert_eq!(sink.len(), 2);
        assert_eq!(store.select_discovered_keys(actor).len(), 2);
    }

    #[test]
    fn actor_without_permission_is_skipped() {
        let store = store();
        let actor = ActorId::new();
        store.insert(graveyard_at("Near", 5.0));
        store.flush();

        let snapshot = ActorSnapshot::new(actor, WorldId::from("overworld"), 0.0, 0.0, 0.0);
        let (scanner, sink) = scanner_with(
            Arc::clone(&store),
            StubActors::one(snapshot),
            Arc::new(NoDiscoverPerm),
        );

        scanner.run_pass();
        store.flush();
        assert!(sink.is_empty());
    }

    #[test]
    fn forget_allows_rediscovery() {
        let store = store();
        let actor = ActorId::new();
        store.insert(graveyard_at("Near", 5.0));
        store.flush();

        let snapshot = ActorSnapshot::new(actor, WorldId::from("overworld"), 0.0, 0.0, 0.0);
        let (scanner, sink) = scanner_with(
            Arc::clone(&store),
            StubActors::one(snapshot),
            Arc::new(AllowAll),
        );

        scanner.run_pass();
        store.flush();
        assert!(store.delete_discovery("Near", actor));
        store.flush();

        scanner.run_pass();
        store.flush();
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn scheduled_passes_fire_on_interval() {
        let store = store();
        let actor = ActorId::new();
        store.insert(graveyard_at("Near", 5.0));
        store.flush();

        let snapshot = ActorSnapshot::new(actor, WorldId::from("overworld"), 0.0, 0.0, 0.0);
        let (scanner, sink) = scanner_with(
            Arc::clone(&store),
            StubActors::one(snapshot),
            Arc::new(AllowAll),
        );

        let sched = ManualScheduler::new();
        let handle = scanner.spawn_on(&sched);

        sched.advance(scanner.interval());
        store.flush();
        assert_eq!(sink.len(), 1);

        handle.cancel();
        sched.advance(scanner.interval() * 5);
        assert_eq!(sink.len(), 1);
    }
}
