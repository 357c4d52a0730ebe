//! # graveyard-host — host-server integration for graveyard-core
//!
//! `graveyard-core` is deliberately game-agnostic: it knows nothing about
//! commands, chat, teleports, or how a particular server enumerates its
//! players. This crate is the thin layer a host server wires in:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Host server                   │
//! │  commands ──► service ──┐                     │
//! │  death     ──► respawn ──┤   graveyard-host   │
//! │  boot      ──► runtime ──┘                    │
//! │                   │                           │
//! │                   ▼                           │
//! │            graveyard-core                     │
//! │   (store · resolver · scanner · cooldowns)    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `service` — admin operations behind parsed arguments (create, delete,
//!   attribute updates, listing, completion, discovery administration)
//! - `respawn` — respawn routing plus safety-window lifecycle
//! - `runtime` — one-call wiring from [`GraveyardConfig`] and host ports
//!
//! [`GraveyardConfig`]: graveyard_core::GraveyardConfig

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod respawn;
pub mod runtime;
pub mod service;

pub use respawn::RespawnHandler;
pub use runtime::{init_tracing, GraveyardRuntime, HostPorts};
pub use service::{GraveyardService, ServiceError};
