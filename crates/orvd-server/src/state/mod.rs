//! Shared relay state.

pub mod keys;
pub mod queue;
pub mod zones;

pub use keys::KeyStore;
pub use queue::{DecisionQueue, Ticket};
pub use zones::ZoneStore;

use anyhow::Result;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::Config;
use crate::persistence::{self, users, Database};
use crate::pubsub::{outbound, LocalBroker, PubSub};
use crate::scheduler::Scheduler;

/// Everything a relay operation touches, built once at startup.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub keys: KeyStore,
    pub zones: ZoneStore,
    pub broker: Arc<dyn PubSub>,
    pub scheduler: Scheduler,
    /// Vehicles blocked in an arm request
    pub arm_queue: DecisionQueue,
    /// Vehicles blocked in a mission revision
    pub revise_queue: DecisionQueue,
    vehicle_locks: DashMap<String, Arc<Mutex<()>>>,
    display_only: AtomicBool,
    flight_info_response: AtomicBool,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        keys: KeyStore,
        zones: ZoneStore,
        broker: Arc<dyn PubSub>,
    ) -> Self {
        let display_only = config.display_only;
        Self {
            config,
            db,
            keys,
            zones,
            broker,
            scheduler: Scheduler::new(),
            arm_queue: DecisionQueue::new(),
            revise_queue: DecisionQueue::new(),
            vehicle_locks: DashMap::new(),
            display_only: AtomicBool::new(display_only),
            flight_info_response: AtomicBool::new(true),
        }
    }

    /// Open the store, bootstrap the operator account, prepare zone files and keys.
    pub async fn build(config: Config) -> Result<Arc<Self>> {
        let db = persistence::init_database(&config.database_path, config.database_max_connections)
            .await?;
        if config.clean_db {
            persistence::db::clear_fleet(db.pool()).await?;
            tracing::info!("Fleet tables cleared");
        }
        users::ensure_user(db.pool(), &config.admin_login, &config.admin_password).await?;

        let zones = ZoneStore::new(&config.zones_path, &config.zones_delta_path);
        zones.init().await?;

        let keys = KeyStore::generate(config.key_bits, db.clone()).await?;
        let broker: Arc<dyn PubSub> = Arc::new(LocalBroker::new());
        Ok(Arc::new(Self::new(config, db, keys, zones, broker)))
    }

    /// Serialize transitions of one vehicle. Never hold the guard across a decision wait.
    pub async fn lock_vehicle(&self, vehicle_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .vehicle_locks
            .entry(vehicle_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drop lock entries nobody holds or waits on. Returns how many were removed.
    pub fn prune_vehicle_locks(&self) -> usize {
        let before = self.vehicle_locks.len();
        self.vehicle_locks
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.vehicle_locks.len())
    }

    /// Run [`Self::prune_vehicle_locks`] every `interval_secs` as the `prune_locks` task.
    pub fn schedule_lock_pruning(self: &Arc<Self>, interval_secs: u64) {
        let weak: Weak<AppState> = Arc::downgrade(self);
        self.scheduler
            .schedule_recurring("prune_locks", interval_secs, move || {
                let weak = weak.clone();
                async move {
                    if let Some(state) = weak.upgrade() {
                        let removed = state.prune_vehicle_locks();
                        if removed > 0 {
                            tracing::debug!("Pruned {} idle vehicle locks", removed);
                        }
                    }
                }
            });
    }

    pub fn display_only(&self) -> bool {
        self.display_only.load(Ordering::SeqCst)
    }

    pub fn toggle_display_only(&self) -> bool {
        !self.display_only.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn flight_info_response(&self) -> bool {
        self.flight_info_response.load(Ordering::SeqCst)
    }

    pub fn toggle_flight_info_response(&self) -> bool {
        !self.flight_info_response.fetch_xor(true, Ordering::SeqCst)
    }

    /// (Re)start the `ping_{id}` task publishing `$Delay {d}` to the vehicle.
    pub fn schedule_ping(self: &Arc<Self>, vehicle_id: &str, delay_secs: i64) {
        let weak: Weak<AppState> = Arc::downgrade(self);
        let id = vehicle_id.to_string();
        let interval = u64::try_from(delay_secs).unwrap_or(1);
        self.scheduler
            .schedule_recurring(&format!("ping_{}", vehicle_id), interval, move || {
                let weak = weak.clone();
                let id = id.clone();
                async move {
                    if let Some(state) = weak.upgrade() {
                        outbound::publish_ping(&state, &id).await;
                    }
                }
            });
    }
}
