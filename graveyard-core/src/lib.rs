//! # Graveyard Core
//!
//! Host-agnostic registry of named, located "safe points" (graveyards)
//! with per-actor discovery memory and post-respawn protection windows.
//!
//! The pieces, leaves first:
//!
//! - [`store::Store`] — durable CRUD for graveyards and discoveries over a
//!   pluggable [`store::StoreBackend`] (SQLite shipped), with synchronous
//!   error-swallowing reads and a non-blocking async write queue
//! - [`resolver::ProximityResolver`] — nearest *eligible* graveyard for an
//!   actor's position and permissions
//! - [`scanner::DiscoveryScanner`] — recurring pass that records
//!   first-encounter discoveries and raises notification events
//! - [`cooldown::SafetyCooldownManager`] — per-actor timed protection with
//!   replace-on-reentry semantics
//!
//! The host server plugs in through the ports in [`ports`] (worlds,
//! permissions, actor positions), [`events`] (notification sink), and
//! [`schedule`] (timers). Nothing in this crate touches a host API
//! directly, and no public operation propagates a storage fault: absence
//! and emptiness are the only failure signals callers see.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod cooldown;
pub mod error;
pub mod events;
pub mod ports;
pub mod resolver;
pub mod scanner;
pub mod schedule;
pub mod store;
pub mod types;

pub use config::GraveyardConfig;
pub use error::GraveyardError;
pub use types::*;
