//! Configuration for the graveyard system.
//!
//! Maps directly to `graveyards.toml`. Every field has a serde default so
//! a partial (or missing) file yields a working configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraveyardConfig {
    /// Backing store settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Discovery scan settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Post-respawn safety window settings.
    #[serde(default)]
    pub safety: SafetyConfig,
    /// Respawn routing settings.
    #[serde(default)]
    pub respawn: RespawnConfig,
}

impl GraveyardConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `GraveyardError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::GraveyardError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Backing store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend engine: "sqlite" is the shipped engine.
    #[serde(default = "default_sqlite")]
    pub backend: String,
    /// Path to the database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: "graveyards.db".to_string(),
            wal_mode: true,
        }
    }
}

/// Discovery scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Default discovery range in blocks, used when a graveyard carries
    /// the negative sentinel.
    #[serde(default = "default_40")]
    pub default_range: i32,
    /// Seconds between discovery scan passes.
    #[serde(default = "default_10")]
    pub scan_interval_seconds: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_range: 40,
            scan_interval_seconds: 10,
        }
    }
}

/// Post-respawn safety window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Default protection window in seconds, used when a graveyard
    /// carries the negative sentinel.
    #[serde(default = "default_30")]
    pub default_seconds: i64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            default_seconds: 30,
        }
    }
}

/// Respawn routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespawnConfig {
    /// Ordering token consumed by the host respawn handler when several
    /// respawn providers compete. Passed through, not interpreted here.
    #[serde(default = "default_priority")]
    pub priority: String,
}

impl Default for RespawnConfig {
    fn default() -> Self {
        Self {
            priority: "normal".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_sqlite() -> String {
    "sqlite".to_string()
}
fn default_db_path() -> String {
    "graveyards.db".to_string()
}
fn default_priority() -> String {
    "normal".to_string()
}
fn default_10() -> u64 {
    10
}
fn default_30() -> i64 {
    30
}
fn default_40() -> i32 {
    40
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = GraveyardConfig::from_toml("").expect("parse");
        assert_eq!(config.storage.backend, "sqlite");
        assert_eq!(config.discovery.default_range, 40);
        assert_eq!(config.safety.default_seconds, 30);
        assert!(config.storage.wal_mode);
    }

    #[test]
    fn partial_toml_overrides() {
        let config = GraveyardConfig::from_toml(
            r#"
            [discovery]
            default_range = 12
            scan_interval_seconds = 5

            [storage]
            path = "custom.db"
            "#,
        )
        .expect("parse");
        assert_eq!(config.discovery.default_range, 12);
        assert_eq!(config.discovery.scan_interval_seconds, 5);
        assert_eq!(config.storage.path, "custom.db");
        // Untouched sections keep defaults.
        assert_eq!(config.safety.default_seconds, 30);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = GraveyardConfig::from_toml("[storage").unwrap_err();
        assert!(matches!(err, crate::GraveyardError::Config(_)));
    }
}
