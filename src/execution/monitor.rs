//! Slice Monitor (§4.7): polls the protocol API for outstanding slice
//! hashes and reconciles fills into the parent `AdvancedOrder`.

use std::collections::HashMap;

use alloy_primitives::Address;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::exchange::backoff::Backoff;
use crate::execution::protocol_client::{parse_amount, ProtocolClient};
use crate::model::{InvalidReason, OrderEvent, OrderEventKind, OrderId, OrderStatus, SliceHash};
use crate::store::JournaledOrderStore;
use crate::time::now_ms;

pub struct SliceMonitor {
    client: ProtocolClient,
    store: std::sync::Arc<JournaledOrderStore>,
    poll_interval_ms: u64,
    /// Maker address(es) to query; empty means "poll every tracked order's
    /// slices individually" rather than filter by maker.
    makers: Vec<Address>,
}

impl SliceMonitor {
    pub fn new(
        client: ProtocolClient,
        store: std::sync::Arc<JournaledOrderStore>,
        poll_interval_ms: u64,
        makers: Vec<Address>,
    ) -> Self {
        Self {
            client,
            store,
            poll_interval_ms,
            makers,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(1_000, 30_000);
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(self.poll_interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.poll_once().await {
                        Ok(()) => backoff.reset(),
                        Err(e) => {
                            warn!(error = %e, "slice monitor poll failed");
                            tokio::time::sleep(backoff.next_delay()).await;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("slice monitor shut down");
    }

    async fn poll_once(&self) -> anyhow::Result<()> {
        let pending = self.store.list_pending().await;
        let mut seen_hashes: HashMap<SliceHash, (Decimal, Option<String>)> = HashMap::new();

        for maker in &self.makers {
            let entries = self.client.list_orders_for_maker(*maker, 200).await?;
            for entry in entries {
                let remaining = parse_amount(&entry.remaining_maker_amount, "remainingMakerAmount");
                seen_hashes.insert(
                    SliceHash(entry.order_hash),
                    (remaining, entry.order_invalid_reason),
                );
            }
        }

        for order in pending {
            self.reconcile_order(order.id, &seen_hashes).await?;
        }
        Ok(())
    }

    async fn reconcile_order(
        &self,
        parent_id: OrderId,
        seen: &HashMap<SliceHash, (Decimal, Option<String>)>,
    ) -> anyhow::Result<()> {
        let slices = self.store.slices_for_parent(parent_id).await;
        let mut any_fill_delta = false;

        for mut slice in slices {
            if slice.is_terminal() {
                continue;
            }
            match seen.get(&slice.hash) {
                Some((remaining, invalid_reason)) => {
                    slice.missed_polls = 0;
                    if let Some(reason) = invalid_reason {
                        slice.invalid_reason = Some(InvalidReason::Rejected(reason.clone()));
                    } else if *remaining != slice.remaining {
                        if *remaining < slice.remaining {
                            any_fill_delta = true;
                        }
                        slice.remaining = *remaining;
                    }
                    self.store.upsert_slice(slice).await;
                }
                None => {
                    slice.missed_polls += 1;
                    if slice.missed_polls >= 2 {
                        slice.invalid_reason = Some(InvalidReason::Removed);
                    }
                    self.store.upsert_slice(slice).await;
                }
            }
        }

        self.reaggregate_parent(parent_id, any_fill_delta).await
    }

    async fn reaggregate_parent(&self, parent_id: OrderId, any_fill_delta: bool) -> anyhow::Result<()> {
        let slices = self.store.slices_for_parent(parent_id).await;
        let order = self.store.get_order(parent_id).await?;

        let total_filled: Decimal = slices.iter().map(|s| s.making - s.remaining).sum();
        let remaining_maker = (order.original_making - total_filled).max(Decimal::ZERO);
        let delta = total_filled - order.total_filled;

        if delta == Decimal::ZERO && !any_fill_delta {
            return Ok(());
        }

        if remaining_maker == Decimal::ZERO && order.status != OrderStatus::Filled {
            self.store
                .append_event(OrderEvent {
                    parent_id,
                    ts_ms: now_ms(),
                    kind: OrderEventKind::Filled,
                })
                .await?;
        } else if delta > Decimal::ZERO {
            self.store
                .append_event(OrderEvent {
                    parent_id,
                    ts_ms: now_ms(),
                    kind: OrderEventKind::PartiallyFilled { delta },
                })
                .await?;
        }
        Ok(())
    }
}
