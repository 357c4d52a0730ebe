//! SQLite backend for the graveyard store.
//!
//! Two tables, one per logical record type:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS graveyards (
//!     id                INTEGER PRIMARY KEY,
//!     search_key        TEXT NOT NULL UNIQUE,
//!     display_name      TEXT NOT NULL,
//!     enabled           INTEGER NOT NULL,
//!     hidden            INTEGER NOT NULL,
//!     discovery_range   INTEGER NOT NULL,
//!     discovery_message TEXT NOT NULL,
//!     respawn_message   TEXT NOT NULL,
//!     group_name        TEXT NOT NULL,
//!     safety_time       INTEGER NOT NULL,
//!     world             TEXT NOT NULL,
//!     x REAL NOT NULL, y REAL NOT NULL, z REAL NOT NULL,
//!     yaw REAL NOT NULL, pitch REAL NOT NULL,
//!     updated_at        TEXT NOT NULL
//! );
//! CREATE TABLE IF NOT EXISTS discoveries (
//!     graveyard_key TEXT NOT NULL,
//!     actor_id      TEXT NOT NULL,
//!     PRIMARY KEY (graveyard_key, actor_id)
//! );
//! ```
//!
//! WAL mode keeps reads cheap while the async writer commits. The search
//! key column is uniquely indexed; a duplicate insert surfaces as a
//! constraint error to the writer, which logs and drops it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::StoreBackend;
use crate::types::{ActorId, Discovery, Graveyard, GraveyardId, Site, WorldId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS graveyards (
        id                INTEGER PRIMARY KEY,
        search_key        TEXT NOT NULL UNIQUE,
        display_name      TEXT NOT NULL,
        enabled           INTEGER NOT NULL,
        hidden            INTEGER NOT NULL,
        discovery_range   INTEGER NOT NULL,
        discovery_message TEXT NOT NULL,
        respawn_message   TEXT NOT NULL,
        group_name        TEXT NOT NULL,
        safety_time       INTEGER NOT NULL,
        world             TEXT NOT NULL,
        x REAL NOT NULL, y REAL NOT NULL, z REAL NOT NULL,
        yaw REAL NOT NULL, pitch REAL NOT NULL,
        updated_at        TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS discoveries (
        graveyard_key TEXT NOT NULL,
        actor_id      TEXT NOT NULL,
        PRIMARY KEY (graveyard_key, actor_id)
    );
";

const GRAVEYARD_COLUMNS: &str = "id, search_key, display_name, enabled, hidden, \
     discovery_range, discovery_message, respawn_message, group_name, \
     safety_time, world, x, y, z, yaw, pitch";

/// Handle to an open SQLite database holding graveyards and discoveries.
pub struct SqliteBackend {
    conn: Connection,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open (or create) an SQLite database at `path`.
    ///
    /// The schema is created if it does not exist. WAL mode is enabled
    /// when `wal_mode` is true.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GraveyardError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, wal_mode: bool) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = wal_mode,
            "graveyard store opened"
        );

        Ok(Self { conn, db_path })
    }

    /// Open an in-memory database (useful for tests). Note that an
    /// in-memory database cannot survive a facade reload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GraveyardError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Create a backup of the database to `dest_path` using SQLite's
    /// online-backup API. Safe to call while the database is in use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GraveyardError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;
        info!(dest = %dest_path.as_ref().display(), "graveyard store backup completed");
        Ok(())
    }

    fn row_to_graveyard(row: &rusqlite::Row<'_>) -> rusqlite::Result<Graveyard> {
        let id: i64 = row.get(0)?;
        let display_name: String = row.get(2)?;
        let site = Site {
            world: WorldId(row.get(10)?),
            x: row.get(11)?,
            y: row.get(12)?,
            z: row.get(13)?,
            yaw: row.get(14)?,
            pitch: row.get(15)?,
        };
        Ok(Graveyard::new(display_name, site)
            .with_enabled(row.get(3)?)
            .with_hidden(row.get(4)?)
            .with_discovery_range(row.get(5)?)
            .with_discovery_message(row.get::<_, String>(6)?)
            .with_respawn_message(row.get::<_, String>(7)?)
            .with_group(row.get::<_, String>(8)?)
            .with_safety_time(row.get(9)?)
            .with_id(GraveyardId(id)))
    }

    fn bind_insert(conn: &Connection, graveyard: &Graveyard) -> rusqlite::Result<()> {
        let site = graveyard.site();
        conn.execute(
            "INSERT INTO graveyards (search_key, display_name, enabled, hidden, \
             discovery_range, discovery_message, respawn_message, group_name, \
             safety_time, world, x, y, z, yaw, pitch, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                graveyard.search_key(),
                graveyard.display_name(),
                graveyard.enabled(),
                graveyard.hidden(),
                graveyard.discovery_range(),
                graveyard.discovery_message(),
                graveyard.respawn_message(),
                graveyard.group(),
                graveyard.safety_time(),
                site.world.0,
                site.x,
                site.y,
                site.z,
                site.yaw,
                site.pitch,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl StoreBackend for SqliteBackend {
    fn select_all(&self) -> Result<Vec<Graveyard>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {GRAVEYARD_COLUMNS} FROM graveyards"))?;
        let rows = stmt.query_map([], Self::row_to_graveyard)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn select_by_key(&self, key: &str) -> Result<Option<Graveyard>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {GRAVEYARD_COLUMNS} FROM graveyards WHERE search_key = ?1"
        ))?;
        Ok(stmt
            .query_row(params![key], Self::row_to_graveyard)
            .optional()?)
    }

    fn select_matching_names(&self, prefix: &str) -> Result<Vec<String>> {
        // LIKE is case-insensitive for ASCII; escape the pattern
        // metacharacters since search keys contain underscores.
        let escaped = prefix
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let mut stmt = self.conn.prepare_cached(
            "SELECT search_key FROM graveyards \
             WHERE search_key LIKE ?1 ESCAPE '\\' ORDER BY search_key",
        )?;
        let rows = stmt.query_map(params![format!("{escaped}%")], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn insert(&mut self, graveyard: &Graveyard) -> Result<GraveyardId> {
        Self::bind_insert(&self.conn, graveyard)?;
        let id = GraveyardId(self.conn.last_insert_rowid());
        debug!(key = graveyard.search_key(), id = %id, "graveyard inserted");
        Ok(id)
    }

    fn insert_batch(&mut self, graveyards: &[Graveyard]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut count = 0_usize;
        for graveyard in graveyards {
            Self::bind_insert(&tx, graveyard)?;
            count += 1;
        }
        tx.commit()?;
        debug!(count, "graveyard batch inserted");
        Ok(count)
    }

    fn update(&mut self, graveyard: &Graveyard) -> Result<()> {
        let Some(id) = graveyard.id() else {
            warn!(
                key = graveyard.search_key(),
                "update skipped: record has no storage identity"
            );
            return Ok(());
        };
        let site = graveyard.site();
        let changed = self.conn.execute(
            "UPDATE graveyards SET search_key = ?1, display_name = ?2, enabled = ?3, \
             hidden = ?4, discovery_range = ?5, discovery_message = ?6, \
             respawn_message = ?7, group_name = ?8, safety_time = ?9, world = ?10, \
             x = ?11, y = ?12, z = ?13, yaw = ?14, pitch = ?15, updated_at = ?16 \
             WHERE id = ?17",
            params![
                graveyard.search_key(),
                graveyard.display_name(),
                graveyard.enabled(),
                graveyard.hidden(),
                graveyard.discovery_range(),
                graveyard.discovery_message(),
                graveyard.respawn_message(),
                graveyard.group(),
                graveyard.safety_time(),
                site.world.0,
                site.x,
                site.y,
                site.z,
                site.yaw,
                site.pitch,
                Utc::now().to_rfc3339(),
                id.0,
            ],
        )?;
        if changed == 0 {
            warn!(id = %id, key = graveyard.search_key(), "update matched no row");
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<Option<Graveyard>> {
        let prior = self.select_by_key(key)?;
        if prior.is_some() {
            self.conn
                .execute("DELETE FROM graveyards WHERE search_key = ?1", params![key])?;
            // Discoveries are meaningless once the graveyard is gone.
            self.conn.execute(
                "DELETE FROM discoveries WHERE graveyard_key = ?1",
                params![key],
            )?;
            debug!(key, "graveyard deleted");
        }
        Ok(prior)
    }

    fn insert_discovery(&mut self, discovery: &Discovery) -> Result<()> {
        // OR IGNORE: rediscovery is a no-op, existence is the state.
        self.conn.execute(
            "INSERT OR IGNORE INTO discoveries (graveyard_key, actor_id) VALUES (?1, ?2)",
            params![discovery.graveyard_key, discovery.actor.0.to_string()],
        )?;
        Ok(())
    }

    fn delete_discovery(&mut self, key: &str, actor: ActorId) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM discoveries WHERE graveyard_key = ?1 AND actor_id = ?2",
            params![key, actor.0.to_string()],
        )?;
        Ok(deleted > 0)
    }

    fn select_discovered_keys(&self, actor: ActorId) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT graveyard_key FROM discoveries WHERE actor_id = ?1")?;
        let rows = stmt.query_map(params![actor.0.to_string()], |row| row.get(0))?;
        let mut out = HashSet::new();
        for row in rows {
            out.insert(row?);
        }
        Ok(out)
    }

    fn select_undiscovered(&self, actor: ActorId) -> Result<Vec<Graveyard>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {GRAVEYARD_COLUMNS} FROM graveyards WHERE search_key NOT IN \
             (SELECT graveyard_key FROM discoveries WHERE actor_id = ?1)"
        ))?;
        let rows = stmt.query_map(params![actor.0.to_string()], Self::row_to_graveyard)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn select_actors_with_discoveries(&self) -> Result<Vec<ActorId>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT DISTINCT actor_id FROM discoveries")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            let id_str = row?;
            if let Ok(uuid) = uuid::Uuid::parse_str(&id_str) {
                out.push(ActorId(uuid));
            } else {
                warn!(id = %id_str, "skipping discovery row with invalid actor UUID");
            }
        }
        Ok(out)
    }
}

/// Extension trait that adds an `.optional()` combinator to `rusqlite::Result`.
///
/// Converts `Err(QueryReturnedNoRows)` into `Ok(None)`.
trait OptionalExt<T> {
    /// Convert `QueryReturnedNoRows` into `Ok(None)`.
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
