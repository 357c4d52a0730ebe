//! Error types for the graveyard core.

use thiserror::Error;

/// Top-level error type for graveyard operations.
///
/// Most public operations have a total contract: storage failures are
/// swallowed and logged at the [`crate::store::Store`] facade, so these
/// errors surface mainly from backend construction, configuration
/// loading, and the migration utility.
#[derive(Error, Debug)]
pub enum GraveyardError {
    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record referenced a world that is not currently loaded.
    #[error("World not loaded: {world} (graveyard: {graveyard})")]
    WorldNotLoaded {
        /// The unresolvable world.
        world: String,
        /// Search key of the affected graveyard.
        graveyard: String,
    },

    /// The store has been closed and can no longer serve requests.
    #[error("Store is closed")]
    StoreClosed,

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, GraveyardError>;
