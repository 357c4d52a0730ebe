//! Collaborator ports consumed by the core.
//!
//! The host server supplies implementations of these traits: which worlds
//! are loaded, who is online and where, and what an actor is permitted to
//! do. The core never talks to the host API directly.

use crate::types::{ActorId, WorldId};

// ---------------------------------------------------------------------------
// Permission nodes
// ---------------------------------------------------------------------------

/// Permission node required for an actor to discover graveyards.
pub const NODE_DISCOVER: &str = "graveyard.discover";

/// Permission node granting access to a restricted graveyard group.
#[must_use]
pub fn group_node(group: &str) -> String {
    format!("graveyard.group.{group}")
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Which worlds are currently loaded on the host.
pub trait WorldCatalog: Send + Sync {
    /// True if the world is loaded and locations in it are usable.
    fn is_loaded(&self, world: &WorldId) -> bool;
}

/// Permission predicate service.
pub trait Permissions: Send + Sync {
    /// True if the actor holds the given permission node.
    fn has(&self, actor: ActorId, node: &str) -> bool;
}

/// Enumeration of online actors with their current positions.
pub trait ActorProvider: Send + Sync {
    /// Snapshot of every online actor.
    fn online_actors(&self) -> Vec<ActorSnapshot>;
}

/// An actor's world and coordinates at a single instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSnapshot {
    /// The actor.
    pub actor: ActorId,
    /// World the actor is currently in.
    pub world: WorldId,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl ActorSnapshot {
    /// Create a snapshot.
    #[must_use]
    pub fn new(actor: ActorId, world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self {
            actor,
            world,
            x,
            y,
            z,
        }
    }
}

/// Group eligibility: a graveyard with no group is open to everyone;
/// otherwise the actor needs the matching group node.
#[must_use]
pub fn group_allows(perms: &dyn Permissions, actor: ActorId, group: &str) -> bool {
    group.is_empty() || perms.has(actor, &group_node(group))
}

// ---------------------------------------------------------------------------
// Simple implementations (tests and single-host setups)
// ---------------------------------------------------------------------------

/// A fixed set of loaded worlds.
#[derive(Debug, Clone, Default)]
pub struct StaticWorlds {
    worlds: Vec<WorldId>,
}

impl StaticWorlds {
    /// Build from a list of world names.
    #[must_use]
    pub fn of<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            worlds: names.into_iter().map(|n| WorldId(n.into())).collect(),
        }
    }
}

impl WorldCatalog for StaticWorlds {
    fn is_loaded(&self, world: &WorldId) -> bool {
        self.worlds.contains(world)
    }
}

/// Grants every permission to every actor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Permissions for AllowAll {
    fn has(&self, _actor: ActorId, _node: &str) -> bool {
        true
    }
}
