//! Admin service — the operations a host exposes to its command layer.
//!
//! Command parsing, argument tokenizing, and reply formatting stay on the
//! host side; this service takes already-parsed arguments and enforces the
//! validation rules before anything touches the store. Every mutation
//! reports success or a [`ServiceError`] the caller can turn into a reply.

use std::sync::Arc;

use graveyard_core::ports::WorldCatalog;
use graveyard_core::store::Store;
use graveyard_core::types::{search_key, ActorId, Discovery, Graveyard, Site};
use thiserror::Error;
use tracing::info;

/// Why an admin operation was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The name normalizes to an empty search key.
    #[error("graveyard name is empty after normalization")]
    EmptyName,

    /// A graveyard with the same search key already exists.
    #[error("graveyard '{0}' already exists")]
    DuplicateName(String),

    /// No graveyard matches the given name.
    #[error("no graveyard named '{0}'")]
    UnknownGraveyard(String),

    /// The target world is not currently loaded.
    #[error("world '{0}' is not loaded")]
    WorldNotLoaded(String),
}

/// Admin-facing facade over the [`Store`].
///
/// Reads go through a flush first so an operator always sees their own
/// just-issued writes; admin traffic is rare enough that the barrier
/// cost does not matter.
pub struct GraveyardService {
    store: Arc<Store>,
    worlds: Arc<dyn WorldCatalog>,
}

impl GraveyardService {
    /// Wrap a store and the world catalog used for placement checks.
    #[must_use]
    pub fn new(store: Arc<Store>, worlds: Arc<dyn WorldCatalog>) -> Self {
        Self { store, worlds }
    }

    // -----------------------------------------------------------------------
    // Creation and deletion
    // -----------------------------------------------------------------------

    /// Create a graveyard at the given site.
    ///
    /// Refused when the name is empty after normalization, a graveyard
    /// with the same search key exists, or the site's world is not
    /// loaded. The returned value is the record as queued (identity is
    /// assigned by storage, so `id()` is still `None` here).
    pub fn create(&self, name: &str, site: Site) -> Result<Graveyard, ServiceError> {
        let key = search_key(name);
        if key.is_empty() {
            return Err(ServiceError::EmptyName);
        }
        if !self.worlds.is_loaded(&site.world) {
            return Err(ServiceError::WorldNotLoaded(site.world.to_string()));
        }
        self.store.flush();
        if self.store.select_by_key(name).is_some() {
            return Err(ServiceError::DuplicateName(key));
        }
        let graveyard = Graveyard::new(name, site);
        info!(key = graveyard.search_key(), "graveyard created");
        self.store.insert(graveyard.clone());
        Ok(graveyard)
    }

    /// Delete a graveyard by name, returning the removed record.
    pub fn delete(&self, name: &str) -> Result<Graveyard, ServiceError> {
        self.store.flush();
        let removed = self
            .store
            .delete(name)
            .ok_or_else(|| ServiceError::UnknownGraveyard(search_key(name)))?;
        info!(key = removed.search_key(), "graveyard deleted");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Attribute updates
    // -----------------------------------------------------------------------

    /// Move a graveyard to a new site. The target world must be loaded.
    pub fn relocate(&self, name: &str, site: Site) -> Result<Graveyard, ServiceError> {
        if !self.worlds.is_loaded(&site.world) {
            return Err(ServiceError::WorldNotLoaded(site.world.to_string()));
        }
        self.modify(name, |g| g.with_site(site))
    }

    /// Enable or disable a graveyard for resolution.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<Graveyard, ServiceError> {
        self.modify(name, |g| g.with_enabled(enabled))
    }

    /// Mark a graveyard hidden (discovery-gated) or public.
    pub fn set_hidden(&self, name: &str, hidden: bool) -> Result<Graveyard, ServiceError> {
        self.modify(name, |g| g.with_hidden(hidden))
    }

    /// Set the discovery range in blocks; negative restores the default.
    pub fn set_discovery_range(&self, name: &str, range: i32) -> Result<Graveyard, ServiceError> {
        self.modify(name, |g| g.with_discovery_range(range))
    }

    /// Set the discovery message override; empty restores the default.
    pub fn set_discovery_message(
        &self,
        name: &str,
        message: &str,
    ) -> Result<Graveyard, ServiceError> {
        self.modify(name, |g| g.with_discovery_message(message))
    }

    /// Set the respawn message override; empty restores the default.
    pub fn set_respawn_message(
        &self,
        name: &str,
        message: &str,
    ) -> Result<Graveyard, ServiceError> {
        self.modify(name, |g| g.with_respawn_message(message))
    }

    /// Set the permission group gate; empty opens the graveyard to all.
    pub fn set_group(&self, name: &str, group: &str) -> Result<Graveyard, ServiceError> {
        self.modify(name, |g| g.with_group(group))
    }

    /// Set the safety window in seconds; negative restores the default.
    pub fn set_safety_time(&self, name: &str, seconds: i64) -> Result<Graveyard, ServiceError> {
        self.modify(name, |g| g.with_safety_time(seconds))
    }

    // -----------------------------------------------------------------------
    // Listing and lookup
    // -----------------------------------------------------------------------

    /// Every stored graveyard, including records whose world is not
    /// currently loaded.
    #[must_use]
    pub fn list(&self) -> Vec<Graveyard> {
        self.store.flush();
        self.store.select_all()
    }

    /// Look up a single graveyard by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Graveyard> {
        self.store.flush();
        self.store.select_by_key(name)
    }

    /// Search keys starting with the given prefix, for tab completion.
    /// The match is case-insensitive.
    #[must_use]
    pub fn complete_name(&self, prefix: &str) -> Vec<String> {
        self.store.flush();
        self.store.select_matching_names(prefix)
    }

    // -----------------------------------------------------------------------
    // Discovery administration
    // -----------------------------------------------------------------------

    /// Forget an actor's discovery of a graveyard. Returns whether a
    /// discovery existed to forget.
    pub fn forget_discovery(&self, name: &str, actor: ActorId) -> Result<bool, ServiceError> {
        self.store.flush();
        self.require(name)?;
        let existed = self.store.delete_discovery(name, actor);
        if existed {
            info!(key = search_key(name), actor = %actor, "discovery forgotten");
        }
        Ok(existed)
    }

    /// Grant an actor a discovery without them having walked into range.
    pub fn grant_discovery(&self, name: &str, actor: ActorId) -> Result<(), ServiceError> {
        self.store.flush();
        let graveyard = self.require(name)?;
        info!(key = graveyard.search_key(), actor = %actor, "discovery granted");
        self.store
            .insert_discovery(Discovery::new(graveyard.search_key(), actor));
        Ok(())
    }

    // -----------------------------------------------------------------------

    fn require(&self, name: &str) -> Result<Graveyard, ServiceError> {
        self.store
            .select_by_key(name)
            .ok_or_else(|| ServiceError::UnknownGraveyard(search_key(name)))
    }

    fn modify(
        &self,
        name: &str,
        apply: impl FnOnce(Graveyard) -> Graveyard,
    ) -> Result<Graveyard, ServiceError> {
        self.store.flush();
        let updated = apply(self.require(name)?);
        self.store.update(updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graveyard_core::ports::StaticWorlds;
    use graveyard_core::types::WorldId;

    fn service() -> GraveyardService {
        let worlds = Arc::new(StaticWorlds::of(["overworld"]));
        let store = Arc::new(Store::open_in_memory(worlds.clone()).expect("open"));
        GraveyardService::new(store, worlds)
    }

    fn site(x: f64) -> Site {
        Site::new(WorldId::from("overworld"), x, 64.0, 0.0)
    }

    #[test]
    fn create_rejects_empty_and_duplicate_names() {
        let svc = service();
        assert_eq!(svc.create("  ", site(0.0)), Err(ServiceError::EmptyName));
        assert_eq!(
            svc.create("\u{00a7}c", site(0.0)),
            Err(ServiceError::EmptyName)
        );

        svc.create("Town Yard", site(0.0)).expect("create");
        // A decorated rendering of the same name collapses to the same key.
        assert_eq!(
            svc.create("\u{00a7}cTown Yard", site(5.0)),
            Err(ServiceError::DuplicateName("Town_Yard".to_string()))
        );
    }

    #[test]
    fn create_rejects_unloaded_world() {
        let svc = service();
        let elsewhere = Site::new(WorldId::from("the_end"), 0.0, 64.0, 0.0);
        assert_eq!(
            svc.create("End Yard", elsewhere),
            Err(ServiceError::WorldNotLoaded("the_end".to_string()))
        );
        assert!(svc.list().is_empty());
    }

    #[test]
    fn attribute_updates_round_trip_through_the_store() {
        let svc = service();
        svc.create("Town Yard", site(0.0)).expect("create");

        svc.set_hidden("Town Yard", true).expect("hide");
        svc.set_discovery_range("Town Yard", 25).expect("range");
        svc.set_group("Town Yard", "vip").expect("group");
        svc.set_safety_time("Town Yard", 45).expect("safety");
        svc.set_enabled("Town Yard", false).expect("disable");

        let stored = svc.get("Town Yard").expect("stored");
        assert!(stored.hidden());
        assert!(!stored.enabled());
        assert_eq!(stored.discovery_range_or(40), 25);
        assert_eq!(stored.group(), "vip");
        assert_eq!(stored.safety_time_or(30), 45);
    }

    #[test]
    fn relocate_validates_the_target_world() {
        let svc = service();
        svc.create("Town Yard", site(0.0)).expect("create");

        let moved = svc.relocate("Town Yard", site(100.0)).expect("move");
        assert!((moved.site().x - 100.0).abs() < f64::EPSILON);

        let elsewhere = Site::new(WorldId::from("void"), 0.0, 0.0, 0.0);
        assert_eq!(
            svc.relocate("Town Yard", elsewhere),
            Err(ServiceError::WorldNotLoaded("void".to_string()))
        );
    }

    #[test]
    fn updates_on_unknown_names_are_refused() {
        let svc = service();
        assert_eq!(
            svc.set_enabled("Ghost Yard", true),
            Err(ServiceError::UnknownGraveyard("Ghost_Yard".to_string()))
        );
        assert_eq!(
            svc.delete("Ghost Yard").unwrap_err(),
            ServiceError::UnknownGraveyard("Ghost_Yard".to_string())
        );
    }

    #[test]
    fn completion_matches_prefixes_case_insensitively() {
        let svc = service();
        svc.create("Town Yard", site(0.0)).expect("create");
        svc.create("Tower Crypt", site(5.0)).expect("create");
        svc.create("Harbor", site(10.0)).expect("create");

        let matches = svc.complete_name("tow");
        assert_eq!(matches.len(), 2);
        assert!(matches.contains(&"Town_Yard".to_string()));
        assert!(matches.contains(&"Tower_Crypt".to_string()));
    }

    #[test]
    fn grant_and_forget_discovery() {
        let svc = service();
        let actor = ActorId::new();
        svc.create("Sunken Crypt", site(0.0)).expect("create");

        assert_eq!(svc.forget_discovery("Sunken Crypt", actor), Ok(false));
        svc.grant_discovery("Sunken Crypt", actor).expect("grant");
        assert_eq!(svc.forget_discovery("Sunken Crypt", actor), Ok(true));

        assert_eq!(
            svc.grant_discovery("Ghost Yard", actor),
            Err(ServiceError::UnknownGraveyard("Ghost_Yard".to_string()))
        );
    }

    #[test]
    fn delete_returns_the_removed_record() {
        let svc = service();
        svc.create("Town Yard", site(0.0)).expect("create");
        let removed = svc.delete("Town_Yard").expect("delete");
        assert_eq!(removed.search_key(), "Town_Yard");
        assert!(svc.get("Town Yard").is_none());
    }
}
