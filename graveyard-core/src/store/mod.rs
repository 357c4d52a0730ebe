//! Durable storage for graveyards and discoveries.
//!
//! The concrete engine hides behind [`StoreBackend`]; [`SqliteBackend`] is
//! the shipped implementation. Callers go through the [`Store`] facade,
//! which enforces the failure semantics of the core:
//!
//! - reads are synchronous; a backend error is logged and reported as
//!   "no data", never propagated
//! - writes are queued to a dedicated writer thread and never block the
//!   caller; a failed write is logged, not retried
//! - writes to the shared connection are serialised by one mutex, which
//!   reads also take briefly
//! - inserts and updates whose world is not loaded are rejected up front:
//!   a graveyard with no recoverable location is meaningless downstream
//!
//! Callers must not expect a read issued right after a write to observe
//! it; [`Store::flush`] is the explicit barrier for the few places
//! (shutdown, reload, tests) that need one.

mod migrate;
mod sqlite;

pub use migrate::copy_between;
pub use sqlite::SqliteBackend;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::StorageConfig;
use crate::error::{GraveyardError, Result};
use crate::ports::WorldCatalog;
use crate::types::{ActorId, Discovery, Graveyard, GraveyardId, search_key};

// ---------------------------------------------------------------------------
// Backend interface
// ---------------------------------------------------------------------------

/// Interface every storage engine implements.
///
/// Methods taking a `key` expect an already-normalized search key; the
/// [`Store`] facade performs the normalization.
pub trait StoreBackend: Send {
    /// All stored graveyards, including those with unresolved locations.
    fn select_all(&self) -> Result<Vec<Graveyard>>;
    /// Exact lookup by search key.
    fn select_by_key(&self, key: &str) -> Result<Option<Graveyard>>;
    /// Case-insensitive prefix match over search keys.
    fn select_matching_names(&self, prefix: &str) -> Result<Vec<String>>;
    /// Insert one graveyard, assigning storage identity.
    fn insert(&mut self, graveyard: &Graveyard) -> Result<GraveyardId>;
    /// Insert many graveyards in one transaction; returns the row count.
    fn insert_batch(&mut self, graveyards: &[Graveyard]) -> Result<usize>;
    /// Full-record replace keyed by storage identity.
    fn update(&mut self, graveyard: &Graveyard) -> Result<()>;
    /// Delete by search key, returning the prior value.
    fn delete(&mut self, key: &str) -> Result<Option<Graveyard>>;
    /// Record a discovery; recording an existing one is a no-op.
    fn insert_discovery(&mut self, discovery: &Discovery) -> Result<()>;
    /// Forget a discovery; true if one existed.
    fn delete_discovery(&mut self, key: &str, actor: ActorId) -> Result<bool>;
    /// Search keys of every graveyard the actor has discovered.
    fn select_discovered_keys(&self, actor: ActorId) -> Result<HashSet<String>>;
    /// Graveyards the actor has not discovered yet.
    fn select_undiscovered(&self, actor: ActorId) -> Result<Vec<Graveyard>>;
    /// Every actor with at least one discovery on record.
    fn select_actors_with_discoveries(&self) -> Result<Vec<ActorId>>;
}

/// Constructor for a backend, reusable across [`Store::reload`].
pub type BackendOpener = Box<dyn Fn() -> Result<Box<dyn StoreBackend>> + Send + Sync>;

/// Storage engines selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    /// File-backed embedded SQLite.
    Sqlite,
}

impl StorageBackendKind {
    /// Parse the configured backend name.
    ///
    /// # Errors
    /// Returns `GraveyardError::Config` for an unknown engine name.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.backend.as_str() {
            "sqlite" => Ok(Self::Sqlite),
            other => Err(GraveyardError::Config(format!(
                "unknown storage backend: {other}"
            ))),
        }
    }

    /// Build the opener closure for this engine.
    #[must_use]
    pub fn opener(self, config: &StorageConfig) -> BackendOpener {
        match self {
            Self::Sqlite => {
                let path = config.path.clone();
                let wal = config.wal_mode;
                Box::new(move || {
                    Ok(Box::new(SqliteBackend::open(&path, wal)?) as Box<dyn StoreBackend>)
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Write queue
// ---------------------------------------------------------------------------

enum WriteOp {
    Insert(Graveyard),
    InsertBatch(Vec<Graveyard>),
    Update(Graveyard),
    Delete(String),
    InsertDiscovery(Discovery),
    DeleteDiscovery(String, ActorId),
    /// Ack once every preceding op has been applied.
    Barrier(std::sync::mpsc::Sender<()>),
    Shutdown,
}

impl WriteOp {
    fn name(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::InsertBatch(_) => "insert_batch",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
            Self::InsertDiscovery(_) => "insert_discovery",
            Self::DeleteDiscovery(..) => "delete_discovery",
            Self::Barrier(_) => "barrier",
            Self::Shutdown => "shutdown",
        }
    }
}

type SharedBackend = Arc<Mutex<Option<Box<dyn StoreBackend>>>>;

fn run_writer(backend: SharedBackend, mut rx: mpsc::UnboundedReceiver<WriteOp>) {
    while let Some(op) = rx.blocking_recv() {
        let op_name = op.name();
        match op {
            WriteOp::Barrier(ack) => {
                // Sends fail only if the flusher gave up waiting.
                let _ = ack.send(());
                continue;
            }
            WriteOp::Shutdown => break,
            op => {
                let mut guard = backend.lock();
                let Some(backend) = guard.as_deref_mut() else {
                    warn!(op = op_name, "store closed; write dropped");
                    continue;
                };
                let result = match op {
                    WriteOp::Insert(g) => backend.insert(&g).map(|_| ()),
                    WriteOp::InsertBatch(gs) => backend.insert_batch(&gs).map(|_| ()),
                    WriteOp::Update(g) => backend.update(&g),
                    WriteOp::Delete(key) => backend.delete(&key).map(|_| ()),
                    WriteOp::InsertDiscovery(d) => backend.insert_discovery(&d),
                    WriteOp::DeleteDiscovery(key, actor) => {
                        backend.delete_discovery(&key, actor).map(|_| ())
                    }
                    WriteOp::Barrier(_) | WriteOp::Shutdown => unreachable!(),
                };
                if let Err(e) = result {
                    warn!(op = op_name, error = %e, "store write failed; dropped");
                }
            }
        }
    }
    debug!("store writer stopped");
}

// ---------------------------------------------------------------------------
// Store facade
// ---------------------------------------------------------------------------

/// Public face of graveyard storage.
///
/// Every operation is total: the only failure signal callers see is an
/// empty / absent / false result.
pub struct Store {
    backend: SharedBackend,
    worlds: Arc<dyn WorldCatalog>,
    opener: BackendOpener,
    tx: mpsc::UnboundedSender<WriteOp>,
    writer: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open the store configured in `config`.
    ///
    /// # Errors
    /// Returns a configuration error for an unknown backend name, or the
    /// backend's own error if the initial open fails.
    pub fn open(config: &StorageConfig, worlds: Arc<dyn WorldCatalog>) -> Result<Self> {
        let kind = StorageBackendKind::from_config(config)?;
        Self::with_opener(kind.opener(config), worlds)
    }

    /// Open an in-memory store (tests). Reloading an in-memory store
    /// starts from an empty database.
    ///
    /// # Errors
    /// Returns the backend's error if the open fails.
    pub fn open_in_memory(worlds: Arc<dyn WorldCatalog>) -> Result<Self> {
        Self::with_opener(
            Box::new(|| Ok(Box::new(SqliteBackend::open_in_memory()?) as Box<dyn StoreBackend>)),
            worlds,
        )
    }

    /// Open with an explicit backend constructor. The opener is kept for
    /// [`Store::reload`].
    ///
    /// # Errors
    /// Returns whatever the opener returns on the initial open.
    pub fn with_opener(opener: BackendOpener, worlds: Arc<dyn WorldCatalog>) -> Result<Self> {
        let backend: SharedBackend = Arc::new(Mutex::new(Some(opener()?)));
        let (tx, rx) = mpsc::unbounded_channel();
        let writer_backend = Arc::clone(&backend);
        let writer = std::thread::Builder::new()
            .name("graveyard-store-writer".into())
            .spawn(move || run_writer(writer_backend, rx))?;
        Ok(Self {
            backend,
            worlds,
            opener,
            tx,
            writer: Mutex::new(Some(writer)),
        })
    }

    // ------------------------------------------------------------------
    // Reads (synchronous, error-swallowing)
    // ------------------------------------------------------------------

    fn read<T>(&self, op: &'static str, empty: T, f: impl FnOnce(&dyn StoreBackend) -> Result<T>) -> T {
        let guard = self.backend.lock();
        match guard.as_deref() {
            Some(backend) => f(backend).unwrap_or_else(|e| {
                warn!(op, error = %e, "store read failed; returning empty");
                empty
            }),
            None => {
                warn!(op, "store closed; returning empty");
                empty
            }
        }
    }

    /// All stored graveyards, including those whose world is unloaded.
    #[must_use]
    pub fn select_all(&self) -> Vec<Graveyard> {
        self.read("select_all", Vec::new(), |b| b.select_all())
    }

    /// Look up a graveyard by display name or search key.
    #[must_use]
    pub fn select_by_key(&self, name: &str) -> Option<Graveyard> {
        let key = search_key(name);
        if key.is_empty() {
            return None;
        }
        self.read("select_by_key", None, |b| b.select_by_key(&key))
    }

    /// Search keys starting with `prefix`, case-insensitively.
    #[must_use]
    pub fn select_matching_names(&self, prefix: &str) -> Vec<String> {
        self.read("select_matching_names", Vec::new(), |b| {
            b.select_matching_names(prefix)
        })
    }

    /// Search keys of graveyards the actor has discovered.
    #[must_use]
    pub fn select_discovered_keys(&self, actor: ActorId) -> HashSet<String> {
        self.read("select_discovered_keys", HashSet::new(), |b| {
            b.select_discovered_keys(actor)
        })
    }

    /// Graveyards the actor has not discovered yet.
    #[must_use]
    pub fn select_undiscovered(&self, actor: ActorId) -> Vec<Graveyard> {
        self.read("select_undiscovered", Vec::new(), |b| {
            b.select_undiscovered(actor)
        })
    }

    /// Actors with at least one recorded discovery.
    #[must_use]
    pub fn select_actors_with_discoveries(&self) -> Vec<ActorId> {
        self.read("select_actors_with_discoveries", Vec::new(), |b| {
            b.select_actors_with_discoveries()
        })
    }

    // ------------------------------------------------------------------
    // Writes (asynchronous, best-effort)
    // ------------------------------------------------------------------

    fn dispatch(&self, op: WriteOp) {
        if self.tx.send(op).is_err() {
            warn!("store writer is gone; write dropped");
        }
    }

    /// True when the graveyard's world is loaded; logs and reports false
    /// otherwise.
    fn location_resolves(&self, graveyard: &Graveyard, op: &'static str) -> bool {
        if graveyard.resolved_site(self.worlds.as_ref()).is_some() {
            true
        } else {
            warn!(
                op,
                key = graveyard.search_key(),
                world = %graveyard.site().world,
                "write rejected: world not loaded"
            );
            false
        }
    }

    /// Queue an insert. Rejected (logged no-op) if the graveyard's world
    /// is not loaded.
    pub fn insert(&self, graveyard: Graveyard) {
        if self.location_resolves(&graveyard, "insert") {
            self.dispatch(WriteOp::Insert(graveyard));
        }
    }

    /// Queue a batch insert, skipping graveyards with unloaded worlds.
    /// Returns how many were accepted for writing.
    pub fn insert_batch(&self, graveyards: Vec<Graveyard>) -> usize {
        let accepted: Vec<Graveyard> = graveyards
            .into_iter()
            .filter(|g| self.location_resolves(g, "insert_batch"))
            .collect();
        let count = accepted.len();
        if count > 0 {
            self.dispatch(WriteOp::InsertBatch(accepted));
        }
        count
    }

    /// Queue a full-record replace. Rejected (logged no-op) if the
    /// graveyard's world is not loaded or it has no storage identity.
    pub fn update(&self, graveyard: Graveyard) {
        if graveyard.id().is_none() {
            warn!(
                key = graveyard.search_key(),
                "update rejected: record was never inserted"
            );
            return;
        }
        if self.location_resolves(&graveyard, "update") {
            self.dispatch(WriteOp::Update(graveyard));
        }
    }

    /// Delete by name. Returns the value that was stored, for messaging;
    /// the removal itself is queued.
    #[must_use]
    pub fn delete(&self, name: &str) -> Option<Graveyard> {
        let key = search_key(name);
        if key.is_empty() {
            return None;
        }
        let prior = self.read("delete", None, |b| b.select_by_key(&key))?;
        self.dispatch(WriteOp::Delete(key));
        Some(prior)
    }

    /// Queue a discovery record.
    pub fn insert_discovery(&self, discovery: Discovery) {
        self.dispatch(WriteOp::InsertDiscovery(discovery));
    }

    /// Forget a discovery. Returns whether one was on record; the
    /// removal itself is queued.
    #[must_use]
    pub fn delete_discovery(&self, name: &str, actor: ActorId) -> bool {
        let key = search_key(name);
        if key.is_empty() {
            return false;
        }
        let existed = self.read("delete_discovery", false, |b| {
            Ok(b.select_discovered_keys(actor)?.contains(&key))
        });
        if existed {
            self.dispatch(WriteOp::DeleteDiscovery(key, actor));
        }
        existed
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Block until every previously queued write has been applied.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = std::sync::mpsc::channel();
        if self.tx.send(WriteOp::Barrier(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Re-open the backend in place. Queued writes are drained first, so
    /// nothing in flight is lost; reads issued during the swap see the
    /// old backend until it is replaced.
    pub fn reload(&self) {
        self.flush();
        let mut guard = self.backend.lock();
        match (self.opener)() {
            Ok(fresh) => {
                *guard = Some(fresh);
                info!("graveyard store reloaded");
            }
            Err(e) => {
                // Keep serving from the old backend rather than going dark.
                error!(error = %e, "store reload failed; keeping current backend");
            }
        }
    }

    /// Drain queued writes, stop the writer, and drop the backend.
    /// Subsequent operations log and return empty results.
    pub fn close(&self) {
        self.flush();
        self.dispatch(WriteOp::Shutdown);
        if let Some(writer) = self.writer.lock().take() {
            if writer.join().is_err() {
                error!("store writer panicked during shutdown");
            }
        }
        *self.backend.lock() = None;
        info!("graveyard store closed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
