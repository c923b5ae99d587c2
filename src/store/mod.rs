//! Order Store (§4.4): durable record of AdvancedOrders, SliceRecords, and
//! the append-only event log, behind a sharded per-order lock so mutations
//! to distinct orders proceed in parallel while same-order mutations
//! serialise.

pub mod events;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::model::{AdvancedOrder, OrderEvent, OrderId, OrderStatus, SliceHash, SliceRecord};

const EVENTS_FILE: &str = "events.log";
const SNAPSHOT_FILE: &str = "snapshot.json";

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct Snapshot {
    orders: Vec<AdvancedOrder>,
    slices: Vec<SliceRecord>,
}

pub struct JournaledOrderStore {
    dir: PathBuf,
    orders: RwLock<HashMap<OrderId, Arc<Mutex<AdvancedOrder>>>>,
    slices: RwLock<HashMap<SliceHash, SliceRecord>>,
    events_file: Mutex<fs::File>,
    events_since_snapshot: AtomicU64,
    snapshot_every: u64,
}

impl JournaledOrderStore {
    /// Opens (creating if absent) the store directory, replays
    /// `snapshot.json` + `events.log` to rebuild in-memory state, and
    /// leaves the event log open for further appends.
    pub async fn open(dir: impl Into<PathBuf>, snapshot_every: u64) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let mut orders_map: HashMap<OrderId, AdvancedOrder> = HashMap::new();
        let mut slices_map: HashMap<SliceHash, SliceRecord> = HashMap::new();
        if let Ok(bytes) = fs::read(&snapshot_path).await {
            let snap: Snapshot = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupt(format!("snapshot.json: {e}")))?;
            for order in snap.orders {
                orders_map.insert(order.id, order);
            }
            for slice in snap.slices {
                slices_map.insert(slice.hash.clone(), slice);
            }
        }

        let events_path = dir.join(EVENTS_FILE);
        let mut replayed_count = 0u64;
        if let Ok(contents) = fs::read_to_string(&events_path).await {
            let mut events = Vec::new();
            for line in contents.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let event: OrderEvent = serde_json::from_str(line)
                    .map_err(|e| StoreError::Corrupt(format!("events.log: {e}")))?;
                events.push(event);
            }
            replayed_count = events.len() as u64;
            let projected = events::replay(&events);
            for (id, order) in projected {
                orders_map.insert(id, order);
            }
        }

        info!(
            orders = orders_map.len(),
            events = replayed_count,
            "order store replay complete"
        );

        let orders = orders_map
            .into_iter()
            .map(|(id, order)| (id, Arc::new(Mutex::new(order))))
            .collect();

        let events_file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&events_path)
            .await?;

        Ok(Self {
            dir,
            orders: RwLock::new(orders),
            slices: RwLock::new(slices_map),
            events_file: Mutex::new(events_file),
            events_since_snapshot: AtomicU64::new(0),
            snapshot_every,
        })
    }

    pub async fn insert_order(&self, order: AdvancedOrder) -> Result<(), StoreError> {
        let id = order.id;
        let created_event = OrderEvent {
            parent_id: id,
            ts_ms: order.created_ms,
            kind: crate::model::OrderEventKind::Created {
                owner: order.owner,
                maker_asset: order.maker_asset,
                taker_asset: order.taker_asset,
                index_symbol: order.index_symbol.clone(),
                kind: order.kind.clone(),
                amount: order.original_making,
                next_trigger: order.next_trigger.clone(),
            },
        };
        self.orders
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(order)));
        self.append_event(created_event).await
    }

    pub async fn get_order(&self, id: OrderId) -> Result<AdvancedOrder, StoreError> {
        let guard = self.orders.read().await;
        let entry = guard
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .clone();
        drop(guard);
        Ok(entry.lock().await.clone())
    }

    /// Atomic read-modify-write under the order's own lock; mutations made
    /// here are visible to concurrent readers immediately but are only
    /// durable once a corresponding `append_event` call records them.
    pub async fn update_order<F, R>(&self, id: OrderId, mutator: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut AdvancedOrder) -> R,
    {
        let guard = self.orders.read().await;
        let entry = guard
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .clone();
        drop(guard);
        let mut order = entry.lock().await;
        Ok(mutator(&mut order))
    }

    pub async fn list_pending(&self) -> Vec<AdvancedOrder> {
        let guard = self.orders.read().await;
        let mut out = Vec::new();
        for entry in guard.values() {
            let order = entry.lock().await;
            if !order.status.is_terminal() {
                out.push(order.clone());
            }
        }
        out
    }

    pub async fn upsert_slice(&self, slice: SliceRecord) {
        self.slices.write().await.insert(slice.hash.clone(), slice);
    }

    pub async fn get_slice(&self, hash: &SliceHash) -> Option<SliceRecord> {
        self.slices.read().await.get(hash).cloned()
    }

    pub async fn slices_for_parent(&self, parent_id: OrderId) -> Vec<SliceRecord> {
        self.slices
            .read()
            .await
            .values()
            .filter(|s| s.parent_id == parent_id)
            .cloned()
            .collect()
    }

    /// Appends `event` to the durable log, applies its projection to the
    /// in-memory order, and snapshots every `snapshot_every` events so
    /// startup replay only scans the tail of the log.
    pub async fn append_event(&self, event: OrderEvent) -> Result<(), StoreError> {
        if let Some(entry) = self.orders.read().await.get(&event.parent_id).cloned() {
            let mut order = entry.lock().await;
            events::apply(&mut order, &event);
        }

        let line = serde_json::to_string(&event)?;
        {
            let mut file = self.events_file.lock().await;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await?;
        }

        let count = self.events_since_snapshot.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= self.snapshot_every {
            self.events_since_snapshot.store(0, Ordering::Relaxed);
            if let Err(e) = self.write_snapshot().await {
                warn!(error = %e, "snapshot write failed, continuing on event log alone");
            }
        }
        Ok(())
    }

    async fn write_snapshot(&self) -> Result<(), StoreError> {
        let mut orders = Vec::new();
        for entry in self.orders.read().await.values() {
            orders.push(entry.lock().await.clone());
        }
        let slices: Vec<SliceRecord> = self.slices.read().await.values().cloned().collect();
        let snapshot = Snapshot { orders, slices };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        let tmp_path = self.dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        fs::write(&tmp_path, &bytes).await?;
        fs::rename(&tmp_path, self.dir.join(SNAPSHOT_FILE)).await?;

        // The snapshot now subsumes every event written so far; truncate
        // the log so a restart only replays the tail.
        let events_path = self.dir.join(EVENTS_FILE);
        let mut file = self.events_file.lock().await;
        *file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&events_path)
            .await?;
        Ok(())
    }

    pub fn order_status(status: OrderStatus) -> bool {
        status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DcaParams, IndexSymbol, NextTrigger, OrderKind};
    use alloy_primitives::Address;
    use rust_decimal_macros::dec;

    async fn tmp_store() -> (JournaledOrderStore, tempdir_guard::TempDir) {
        let dir = tempdir_guard::TempDir::new();
        let store = JournaledOrderStore::open(dir.path(), 500).await.unwrap();
        (store, dir)
    }

    // Minimal throwaway temp-dir helper: this crate does not otherwise
    // depend on `tempfile`, and a single test module doesn't warrant adding
    // it to the dependency graph.
    mod tempdir_guard {
        use std::path::{Path, PathBuf};

        pub struct TempDir(PathBuf);

        impl TempDir {
            pub fn new() -> Self {
                let path = std::env::temp_dir().join(format!(
                    "edge-keeper-store-test-{}",
                    uuid::Uuid::new_v4()
                ));
                Self(path)
            }

            pub fn path(&self) -> &Path {
                &self.0
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    fn new_order() -> AdvancedOrder {
        AdvancedOrder::new(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            IndexSymbol::new("ETHUSDT"),
            OrderKind::Dca(DcaParams {
                interval_ms: 60_000,
                amount: dec!(10),
                max_price: None,
            }),
            dec!(100),
            0,
            NextTrigger::Time(60_000),
        )
    }

    #[tokio::test]
    async fn insert_then_get_roundtrips() {
        let (store, _guard) = tmp_store().await;
        let order = new_order();
        let id = order.id;
        store.insert_order(order).await.unwrap();
        let fetched = store.get_order(id).await.unwrap();
        assert_eq!(fetched.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn append_event_updates_projection() {
        let (store, _guard) = tmp_store().await;
        let order = new_order();
        let id = order.id;
        store.insert_order(order).await.unwrap();

        store
            .append_event(OrderEvent {
                parent_id: id,
                ts_ms: 1,
                kind: crate::model::OrderEventKind::SliceSubmitted {
                    hash: crate::model::SliceHash("0x1".to_string()),
                    making: dec!(10),
                },
            })
            .await
            .unwrap();

        let fetched = store.get_order(id).await.unwrap();
        assert_eq!(fetched.status, OrderStatus::Active);
        assert_eq!(fetched.trigger_count, 1);
    }

    #[tokio::test]
    async fn replay_after_reopen_matches_live_state() {
        let dir = tempdir_guard::TempDir::new();
        let id;
        {
            let store = JournaledOrderStore::open(dir.path(), 500).await.unwrap();
            let order = new_order();
            id = order.id;
            store.insert_order(order).await.unwrap();
            store
                .append_event(OrderEvent {
                    parent_id: id,
                    ts_ms: 1,
                    kind: crate::model::OrderEventKind::SliceSubmitted {
                        hash: crate::model::SliceHash("0x1".to_string()),
                        making: dec!(10),
                    },
                })
                .await
                .unwrap();
        }
        let reopened = JournaledOrderStore::open(dir.path(), 500).await.unwrap();
        let order = reopened.get_order(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Active);
        assert_eq!(order.trigger_count, 1);
        assert_eq!(order.next_trigger, NextTrigger::Time(60_000));
    }

    #[tokio::test]
    async fn list_pending_excludes_terminal_orders() {
        let (store, _guard) = tmp_store().await;
        let order = new_order();
        let id = order.id;
        store.insert_order(order).await.unwrap();
        store
            .append_event(OrderEvent {
                parent_id: id,
                ts_ms: 1,
                kind: crate::model::OrderEventKind::Cancelled,
            })
            .await
            .unwrap();
        assert!(store.list_pending().await.is_empty());
    }
}
