//! Core type definitions for the graveyard registry.
//!
//! The central value is [`Graveyard`]: an immutable record with
//! copy-with-override mutators. Every change produces a fresh value that
//! is persisted whole, so no caller ever observes a half-updated record.

use std::fmt;

use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Stable unique identifier for an actor (player) on the host server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(pub Uuid);

impl ActorId {
    /// Create a new random actor ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage-assigned identity of a persisted graveyard row.
///
/// Absent on values that have not been inserted yet; immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraveyardId(pub i64);

impl fmt::Display for GraveyardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier for a host world. Worlds are name-addressed on the
/// host side; equality is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorldId(pub String);

impl WorldId {
    /// Wrap a world name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorldId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

// ---------------------------------------------------------------------------
// Search Key Normalization
// ---------------------------------------------------------------------------

/// Formatting-code escape character used by the host chat system.
const FORMAT_ESCAPE: char = '\u{00a7}'; // '§'

/// Derive the unique lookup key for a display name.
///
/// Strips `§x` formatting sequences, trims surrounding whitespace, and
/// replaces interior spaces with underscores. Case is preserved. The
/// function is idempotent: `search_key(search_key(n)) == search_key(n)`.
///
/// An empty result means the name had no usable content and cannot
/// identify a graveyard.
#[must_use]
pub fn search_key(display_name: &str) -> String {
    let mut out = String::with_capacity(display_name.len());
    let mut chars = display_name.chars();
    while let Some(c) = chars.next() {
        if c == FORMAT_ESCAPE {
            // Swallow the code character too; a dangling escape is dropped.
            chars.next();
        } else {
            out.push(c);
        }
    }
    out.trim().replace(' ', "_")
}

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// A located point in a specific host world, with facing.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    /// World this site belongs to.
    pub world: WorldId,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
    /// Horizontal facing in degrees.
    pub yaw: f32,
    /// Vertical facing in degrees.
    pub pitch: f32,
}

impl Site {
    /// Create a site with neutral facing.
    #[must_use]
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self {
            world,
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Squared Euclidean distance to a point, ignoring facing.
    ///
    /// Only meaningful when the point is in the same world; callers
    /// filter on world first.
    #[must_use]
    pub fn distance_sq(&self, x: f64, y: f64, z: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        let dz = self.z - z;
        dx * dx + dy * dy + dz * dz
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.1}, {:.1}, {:.1})",
            self.world, self.x, self.y, self.z
        )
    }
}

// ---------------------------------------------------------------------------
// Graveyard
// ---------------------------------------------------------------------------

/// Sentinel on per-graveyard numeric overrides meaning "use the
/// configured default".
pub const USE_DEFAULT: i64 = -1;

/// [`USE_DEFAULT`] for the `i32`-typed discovery range.
pub const USE_DEFAULT_RANGE: i32 = USE_DEFAULT as i32;

/// A named, located safe point an actor may be directed to.
///
/// Immutable: all mutators are `with_*` copy constructors returning a new
/// value. The search key is derived from the display name at construction
/// and kept consistent by [`Graveyard::with_display_name`].
#[derive(Debug, Clone, PartialEq)]
pub struct Graveyard {
    id: Option<GraveyardId>,
    search_key: String,
    display_name: String,
    enabled: bool,
    hidden: bool,
    discovery_range: i32,
    discovery_message: String,
    respawn_message: String,
    group: String,
    safety_time: i64,
    site: Site,
}

impl Graveyard {
    /// Create a new graveyard with default attributes: enabled, listed,
    /// configured-default discovery range and safety time, no group, no
    /// message overrides.
    #[must_use]
    pub fn new(display_name: impl Into<String>, site: Site) -> Self {
        let display_name = display_name.into();
        Self {
            id: None,
            search_key: search_key(&display_name),
            display_name,
            enabled: true,
            hidden: false,
            discovery_range: USE_DEFAULT_RANGE,
            discovery_message: String::new(),
            respawn_message: String::new(),
            group: String::new(),
            safety_time: USE_DEFAULT,
            site,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Storage identity, if this value has been persisted.
    #[must_use]
    pub fn id(&self) -> Option<GraveyardId> {
        self.id
    }

    /// Unique normalized lookup key, derived from the display name.
    #[must_use]
    pub fn search_key(&self) -> &str {
        &self.search_key
    }

    /// Free-text display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Whether this graveyard participates in resolution.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether this graveyard must be discovered rather than always listed.
    #[must_use]
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Raw discovery range; negative means "use configured default".
    #[must_use]
    pub fn discovery_range(&self) -> i32 {
        self.discovery_range
    }

    /// Discovery range with the sentinel resolved against `default`.
    #[must_use]
    pub fn discovery_range_or(&self, default: i32) -> i32 {
        if self.discovery_range < 0 {
            default
        } else {
            self.discovery_range
        }
    }

    /// Discovery message override; empty means "use default".
    #[must_use]
    pub fn discovery_message(&self) -> &str {
        &self.discovery_message
    }

    /// Discovery message with the empty sentinel resolved against `default`.
    #[must_use]
    pub fn discovery_message_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.discovery_message.is_empty() {
            default
        } else {
            &self.discovery_message
        }
    }

    /// Respawn message override; empty means "use default".
    #[must_use]
    pub fn respawn_message(&self) -> &str {
        &self.respawn_message
    }

    /// Respawn message with the empty sentinel resolved against `default`.
    #[must_use]
    pub fn respawn_message_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.respawn_message.is_empty() {
            default
        } else {
            &self.respawn_message
        }
    }

    /// Group restriction; empty means "no restriction".
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Safety window in seconds; negative means "use configured default".
    #[must_use]
    pub fn safety_time(&self) -> i64 {
        self.safety_time
    }

    /// Safety time with the sentinel resolved against `default`.
    #[must_use]
    pub fn safety_time_or(&self, default: i64) -> i64 {
        if self.safety_time < 0 {
            default
        } else {
            self.safety_time
        }
    }

    /// Raw stored site. Whether it currently resolves to a loaded world
    /// is a separate question — see [`Graveyard::resolved_site`].
    #[must_use]
    pub fn site(&self) -> &Site {
        &self.site
    }

    /// The site, but only if its world is currently loaded on the host.
    ///
    /// A graveyard whose world is not loaded has no valid location: it is
    /// excluded from resolution and discovery but remains stored and
    /// listable.
    #[must_use]
    pub fn resolved_site(&self, worlds: &dyn crate::ports::WorldCatalog) -> Option<&Site> {
        worlds.is_loaded(&self.site.world).then_some(&self.site)
    }

    // ------------------------------------------------------------------
    // Copy-with-override mutators
    // ------------------------------------------------------------------

    /// Rename, re-deriving the search key from the new display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self.search_key = search_key(&self.display_name);
        self
    }

    /// Set the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the hidden flag.
    #[must_use]
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set the discovery range (negative restores the configured default).
    #[must_use]
    pub fn with_discovery_range(mut self, range: i32) -> Self {
        self.discovery_range = range;
        self
    }

    /// Set the discovery message override (empty restores the default).
    #[must_use]
    pub fn with_discovery_message(mut self, message: impl Into<String>) -> Self {
        self.discovery_message = message.into();
        self
    }

    /// Set the respawn message override (empty restores the default).
    #[must_use]
    pub fn with_respawn_message(mut self, message: impl Into<String>) -> Self {
        self.respawn_message = message.into();
        self
    }

    /// Set the group restriction (empty removes it).
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Set the safety time in seconds (negative restores the configured
    /// default).
    #[must_use]
    pub fn with_safety_time(mut self, seconds: i64) -> Self {
        self.safety_time = seconds;
        self
    }

    /// Relocate the graveyard.
    #[must_use]
    pub fn with_site(mut self, site: Site) -> Self {
        self.site = site;
        self
    }

    /// Attach the storage identity. Used by backends when materialising
    /// rows; identity is never changed once set.
    pub(crate) fn with_id(mut self, id: GraveyardId) -> Self {
        self.id = Some(id);
        self
    }
}

impl fmt::Display for Graveyard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.search_key, self.site)
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Recorded fact that an actor has encountered a graveyard.
///
/// Existence is the state: a discovery is created once, deleted by an
/// explicit forget, and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Discovery {
    /// Search key of the discovered graveyard.
    pub graveyard_key: String,
    /// Actor who made the discovery.
    pub actor: ActorId,
}

impl Discovery {
    /// Create a discovery record.
    #[must_use]
    pub fn new(graveyard_key: impl Into<String>, actor: ActorId) -> Self {
        Self {
            graveyard_key: graveyard_key.into(),
            actor,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::StaticWorlds;

    fn site() -> Site {
        Site::new(WorldId::from("overworld"), 10.0, 64.0, -20.0)
    }

    #[test]
    fn search_key_strips_formatting_and_spaces() {
        assert_eq!(search_key("§6Old §lChapel Yard"), "Old_Chapel_Yard");
        assert_eq!(search_key("  plain name  "), "plain_name");
        assert_eq!(search_key("Keep§"), "Keep");
    }

    #[test]
    fn search_key_is_idempotent() {
        let once = search_key("§4Crimson Rest");
        assert_eq!(search_key(&once), once);
    }

    #[test]
    fn search_key_preserves_case() {
        assert_eq!(search_key("NorthGate"), "NorthGate");
    }

    #[test]
    fn new_graveyard_defaults() {
        let g = Graveyard::new("Hollow Rest", site());
        assert!(g.id().is_none());
        assert_eq!(g.search_key(), "Hollow_Rest");
        assert!(g.enabled());
        assert!(!g.hidden());
        assert_eq!(g.discovery_range(), USE_DEFAULT_RANGE);
        assert_eq!(g.safety_time(), USE_DEFAULT);
        assert_eq!(g.discovery_range_or(40), 40);
        assert_eq!(g.safety_time_or(30), 30);
        assert_eq!(g.discovery_message_or("default"), "default");
        assert!(g.group().is_empty());
    }

    #[test]
    fn with_override_replaces_single_field() {
        let g = Graveyard::new("Hollow Rest", site());
        let g2 = g.clone().with_discovery_range(12).with_hidden(true);
        assert_eq!(g2.discovery_range_or(40), 12);
        assert!(g2.hidden());
        // Untouched fields carry over.
        assert_eq!(g2.search_key(), g.search_key());
        assert_eq!(g2.site(), g.site());
    }

    #[test]
    fn rename_rederives_search_key() {
        let g = Graveyard::new("Hollow Rest", site()).with_display_name("§bNew Dawn");
        assert_eq!(g.search_key(), "New_Dawn");
        assert_eq!(g.display_name(), "§bNew Dawn");
    }

    #[test]
    fn resolved_site_requires_loaded_world() {
        let g = Graveyard::new("Hollow Rest", site());
        let loaded = StaticWorlds::of(["overworld"]);
        let empty = StaticWorlds::of::<&str>([]);
        assert!(g.resolved_site(&loaded).is_some());
        assert!(g.resolved_site(&empty).is_none());
    }

    #[test]
    fn distance_sq_ignores_facing() {
        let mut s = site();
        s.yaw = 90.0;
        s.pitch = 45.0;
        assert!((s.distance_sq(10.0, 64.0, -20.0)).abs() < f64::EPSILON);
        assert!((s.distance_sq(13.0, 68.0, -20.0) - 25.0).abs() < 1e-9);
    }
}
