//! Watcher Registry (§4.5): spawns/retires one supervisor per non-terminal
//! `AdvancedOrder`, reconstructing the live set from `list_pending()` on
//! startup.

use std::collections::HashMap;
use std::sync::{Arc, RwLock as StdRwLock};

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use crate::bus::PriceBus;
use crate::execution::SliceSubmitter;
use crate::model::{AdvancedOrder, IndexSnapshot};
use crate::store::JournaledOrderStore;

use super::supervisor::Supervisor;
use crate::model::OrderId;

/// Abstraction the supervisor reads for a fresh `IndexSnapshot`, so it
/// doesn't need to know whether that's a Price Bus subscription, a cached
/// last-seen snapshot, or (in tests) a canned fixture.
pub trait PriceSnapshotSource: Send + Sync {
    fn snapshot_for(&self, order: &AdvancedOrder) -> Option<IndexSnapshot>;
}

/// Reads the Index Engine's last-published snapshot per symbol, kept warm
/// by a background subscriber task (see `WatcherRegistry::spawn_price_cache`).
pub struct CachedPriceSource {
    latest: StdRwLock<HashMap<crate::model::IndexSymbol, IndexSnapshot>>,
}

impl CachedPriceSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            latest: StdRwLock::new(HashMap::new()),
        })
    }

    pub fn set(&self, snapshot: IndexSnapshot) {
        self.latest
            .write()
            .expect("price cache lock poisoned")
            .insert(snapshot.symbol.clone(), snapshot);
    }
}

impl PriceSnapshotSource for CachedPriceSource {
    fn snapshot_for(&self, order: &AdvancedOrder) -> Option<IndexSnapshot> {
        self.latest
            .read()
            .expect("price cache lock poisoned")
            .get(&order.index_symbol)
            .cloned()
    }
}

pub struct WatcherRegistry {
    store: Arc<JournaledOrderStore>,
    prices: Arc<dyn PriceSnapshotSource>,
    submitter: Arc<SliceSubmitter>,
    via_proxy: bool,
    handles: RwLock<HashMap<OrderId, (watch::Sender<bool>, JoinHandle<()>)>>,
}

impl WatcherRegistry {
    pub fn new(
        store: Arc<JournaledOrderStore>,
        prices: Arc<dyn PriceSnapshotSource>,
        submitter: Arc<SliceSubmitter>,
        via_proxy: bool,
    ) -> Self {
        Self {
            store,
            prices,
            submitter,
            via_proxy,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Reconstructs a supervisor for every non-terminal order (§4.5
    /// "On startup, reconstruct from list_pending()").
    pub async fn reconstruct(&self) {
        let pending = self.store.list_pending().await;
        info!(count = pending.len(), "reconstructing watcher supervisors");
        for order in pending {
            self.spawn(order.id).await;
        }
    }

    pub async fn spawn(&self, order_id: OrderId) {
        let (tx, rx) = watch::channel(false);
        let supervisor = Supervisor::new(
            order_id,
            self.store.clone(),
            self.prices.clone(),
            self.submitter.clone(),
            self.via_proxy,
        );
        let handle = tokio::spawn(supervisor.run(rx));
        self.handles.write().await.insert(order_id, (tx, handle));
    }

    /// Stops the supervisor cooperatively and transitions the order to
    /// `Cancelled` (§4.5 "Contract").
    pub async fn cancel(&self, order_id: OrderId) {
        if let Some((tx, _handle)) = self.handles.write().await.remove(&order_id) {
            let _ = tx.send(true);
        }
        let _ = self
            .store
            .append_event(crate::model::OrderEvent {
                parent_id: order_id,
                ts_ms: crate::time::now_ms(),
                kind: crate::model::OrderEventKind::Cancelled,
            })
            .await;
    }

    /// Drops supervisors whose order has reached a terminal state, called
    /// periodically by `app.rs`'s reaper tick.
    pub async fn retire_terminal(&self) {
        let mut handles = self.handles.write().await;
        let mut done = Vec::new();
        for (id, (_, handle)) in handles.iter() {
            if handle.is_finished() {
                done.push(*id);
            }
        }
        for id in done {
            handles.remove(&id);
        }
    }

    pub async fn spawn_price_cache(bus: Arc<PriceBus>, cache: Arc<CachedPriceSource>) -> JoinHandle<()> {
        let subscription = bus.subscribe(crate::bus::TopicFilter::All).await;
        tokio::spawn(async move {
            loop {
                let snapshot = subscription.recv().await;
                cache.set(snapshot);
            }
        })
    }
}
