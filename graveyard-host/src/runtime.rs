//! Runtime wiring — builds the whole engine from config plus host ports.
//!
//! [`GraveyardRuntime::start`] is the one entry point a host calls on
//! boot: it opens the store, starts the discovery scan on a tokio
//! scheduler, and hands back the service, respawn, and cooldown handles.
//! `shutdown` undoes it in reverse, draining queued writes before the
//! store closes.

use std::sync::Arc;

use graveyard_core::config::GraveyardConfig;
use graveyard_core::cooldown::SafetyCooldownManager;
use graveyard_core::events::EventSink;
use graveyard_core::ports::{ActorProvider, Permissions, WorldCatalog};
use graveyard_core::resolver::ProximityResolver;
use graveyard_core::scanner::DiscoveryScanner;
use graveyard_core::schedule::{ScheduleHandle, Scheduler, TokioScheduler};
use graveyard_core::error::Result;
use graveyard_core::store::Store;
use tracing::info;

use crate::respawn::RespawnHandler;
use crate::service::GraveyardService;

/// Install a global tracing subscriber filtered by `RUST_LOG`
/// (default `info`). Hosts that already install their own subscriber
/// skip this; calling it twice is a no-op.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// The host-supplied collaborators the engine runs against.
pub struct HostPorts {
    /// Loaded-world membership.
    pub worlds: Arc<dyn WorldCatalog>,
    /// Permission checks for discovery and group gates.
    pub permissions: Arc<dyn Permissions>,
    /// Online actor positions for the discovery scan.
    pub actors: Arc<dyn ActorProvider>,
    /// Where notifications go.
    pub sink: Arc<dyn EventSink>,
}

/// A running graveyard engine.
pub struct GraveyardRuntime {
    store: Arc<Store>,
    service: GraveyardService,
    respawn: RespawnHandler,
    cooldowns: Arc<SafetyCooldownManager>,
    scan: ScheduleHandle,
}

impl GraveyardRuntime {
    /// Open the store and start the periodic discovery scan.
    ///
    /// Must be called from within a tokio runtime; the scan timer runs
    /// on it.
    pub fn start(config: &GraveyardConfig, ports: HostPorts) -> Result<Self> {
        let store = Arc::new(Store::open(&config.storage, Arc::clone(&ports.worlds))?);
        let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::current());

        let scanner = Arc::new(DiscoveryScanner::new(
            Arc::clone(&store),
            Arc::clone(&ports.worlds),
            Arc::clone(&ports.actors),
            Arc::clone(&ports.permissions),
            Arc::clone(&ports.sink),
            &config.discovery,
        ));
        let scan = scanner.spawn_on(scheduler.as_ref());

        let cooldowns = Arc::new(SafetyCooldownManager::new(
            Arc::clone(&scheduler),
            Arc::clone(&ports.sink),
        ));
        let respawn = RespawnHandler::new(
            ProximityResolver::new(Arc::clone(&store), Arc::clone(&ports.worlds)),
            Arc::clone(&cooldowns),
            Arc::clone(&ports.sink),
            &config.safety,
        );
        let service = GraveyardService::new(Arc::clone(&store), Arc::clone(&ports.worlds));

        info!(
            graveyards = store.select_all().len(),
            scan_interval = config.discovery.scan_interval_seconds,
            "graveyard runtime started"
        );
        Ok(Self {
            store,
            service,
            respawn,
            cooldowns,
            scan,
        })
    }

    /// The admin service.
    #[must_use]
    pub fn service(&self) -> &GraveyardService {
        &self.service
    }

    /// The respawn handler.
    #[must_use]
    pub fn respawn(&self) -> &RespawnHandler {
        &self.respawn
    }

    /// The cooldown manager, for hosts that gate damage directly.
    #[must_use]
    pub fn cooldowns(&self) -> &Arc<SafetyCooldownManager> {
        &self.cooldowns
    }

    /// The underlying store, for hosts that need raw reads.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Stop the scan and close the store, draining queued writes first.
    pub fn shutdown(self) {
        self.scan.cancel();
        self.store.close();
        info!("graveyard runtime stopped");
    }
}
