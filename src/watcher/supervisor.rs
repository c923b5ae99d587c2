//! Per-order supervisor (§4.5): a single cooperative loop driving one
//! `AdvancedOrder` from handler decision through submission.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::SubmitErrorKind;
use crate::exchange::backoff::Backoff;
use crate::execution::SliceSubmitter;
use crate::handlers;
use crate::model::{OrderEvent, OrderEventKind, OrderId, OrderStatus, SliceRecord};
use crate::pricing;
use crate::store::JournaledOrderStore;
use crate::time::now_ms;

use super::registry::PriceSnapshotSource;

const MAX_SUBMIT_RETRIES: u32 = 5;
const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_CAP_MS: u64 = 60_000;
/// Fallback poll cadence when a handler has no more specific wake hint
/// (e.g. a price-driven handler between Price Bus deliveries).
const IDLE_POLL_MS: u64 = 5_000;

pub struct Supervisor {
    order_id: OrderId,
    store: Arc<JournaledOrderStore>,
    prices: Arc<dyn PriceSnapshotSource>,
    submitter: Arc<SliceSubmitter>,
    via_proxy: bool,
}

impl Supervisor {
    pub fn new(
        order_id: OrderId,
        store: Arc<JournaledOrderStore>,
        prices: Arc<dyn PriceSnapshotSource>,
        submitter: Arc<SliceSubmitter>,
        via_proxy: bool,
    ) -> Self {
        Self {
            order_id,
            store,
            prices,
            submitter,
            via_proxy,
        }
    }

    /// Runs until the order reaches a terminal state or `cancel` fires.
    /// `cancel` is observed only between steps (§4.5 "Cancellation"): any
    /// in-flight submission always completes.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        loop {
            if *cancel.borrow() {
                info!(order = %self.order_id, "supervisor cancelled before next cycle");
                return;
            }

            let mut order = match self.store.get_order(self.order_id).await {
                Ok(o) => o,
                Err(e) => {
                    warn!(order = %self.order_id, error = %e, "supervisor could not load order, exiting");
                    return;
                }
            };
            if order.status.is_terminal() {
                return;
            }

            if order.is_expired(now_ms(), order.kind.expiry_days()) {
                let _ = self
                    .store
                    .append_event(OrderEvent {
                        parent_id: self.order_id,
                        ts_ms: now_ms(),
                        kind: OrderEventKind::Expired,
                    })
                    .await;
                info!(order = %self.order_id, "order expired");
                return;
            }

            let snapshot = match self.prices.snapshot_for(&order) {
                Some(s) => s,
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(std::time::Duration::from_millis(IDLE_POLL_MS)) => {}
                        _ = cancel.changed() => {}
                    }
                    continue;
                }
            };

            if handlers::seed_if_unset(&mut order, &snapshot) {
                let seeded = order.next_trigger.clone();
                let _ = self
                    .store
                    .update_order(order.id, |o| o.next_trigger = seeded)
                    .await;
            }

            if handlers::should_trigger(&order, &snapshot, now_ms()) {
                self.try_submit_slice(&order, &snapshot).await;
            }

            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_millis(IDLE_POLL_MS)) => {}
                _ = cancel.changed() => {}
            }
        }
    }

    async fn try_submit_slice(&self, order: &crate::model::AdvancedOrder, snapshot: &crate::model::IndexSnapshot) {
        let amount = handlers::slice_amount(order);
        if amount <= rust_decimal::Decimal::ZERO {
            return;
        }
        let side = handlers::side(order, snapshot);
        let limit_price = pricing::limit_price(snapshot, side);
        let taking = amount * limit_price;

        let mut backoff = Backoff::new(BACKOFF_BASE_MS, BACKOFF_CAP_MS);
        for attempt in 0..=MAX_SUBMIT_RETRIES {
            match self
                .submitter
                .submit(
                    order.id,
                    order.owner,
                    order.maker_asset,
                    order.taker_asset,
                    amount,
                    taking,
                    self.via_proxy,
                )
                .await
            {
                Ok(hash) => {
                    let slice = SliceRecord::new(
                        hash.clone(),
                        order.id,
                        side,
                        amount,
                        taking,
                        limit_price,
                        now_ms(),
                    );
                    self.store.upsert_slice(slice).await;
                    let _ = self
                        .store
                        .append_event(OrderEvent {
                            parent_id: order.id,
                            ts_ms: now_ms(),
                            kind: OrderEventKind::SliceSubmitted { hash, making: amount },
                        })
                        .await;
                    let _ = self
                        .store
                        .update_order(order.id, |o| {
                            handlers::advance_schedule(o, now_ms(), snapshot);
                        })
                        .await;
                    return;
                }
                Err(e) => {
                    let _ = self
                        .store
                        .append_event(OrderEvent {
                            parent_id: order.id,
                            ts_ms: now_ms(),
                            kind: OrderEventKind::SliceFailed { reason: e.detail.clone() },
                        })
                        .await;
                    if matches!(e.kind, SubmitErrorKind::Permanent) || attempt == MAX_SUBMIT_RETRIES {
                        warn!(order = %order.id, error = %e, "slice submission failed permanently");
                        let _ = self
                            .store
                            .append_event(OrderEvent {
                                parent_id: order.id,
                                ts_ms: now_ms(),
                                kind: OrderEventKind::Failed { reason: e.detail },
                            })
                            .await;
                        return;
                    }
                    let delay = backoff.next_delay_or(e.retry_after_ms);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
