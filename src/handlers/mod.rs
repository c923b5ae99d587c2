//! Order-type handlers (§4.8): one pure function triple per `OrderKind`
//! variant. Re-modeled per §9's design note as free functions over the
//! variant payload rather than a `TimeBased`/`PriceBased`/`Stepped`
//! inheritance chain — `OrderKind`'s tag dispatches to the right module,
//! and the trio is exposed by a single `Handler` capability interface.

pub mod chase_limit;
pub mod dca;
pub mod grid;
pub mod iceberg;
pub mod momentum_reversal;
pub mod range;
pub mod range_breakout;
pub mod stop_limit;
pub mod twap;

#[cfg(test)]
pub(crate) mod test_support;

use rust_decimal::Decimal;

use crate::model::{AdvancedOrder, IndexSnapshot, NextTrigger, OrderKind, Side};

/// `should_trigger(order, snapshot)`: does this order's predicate fire
/// right now? Pure, deterministic, total — never panics on well-formed
/// input, and returns `false` (not an error) when a required analytics
/// field is unavailable (§7 "Handler precondition missing").
pub fn should_trigger(order: &AdvancedOrder, snapshot: &IndexSnapshot, now_ms: i64) -> bool {
    match &order.kind {
        OrderKind::Dca(p) => dca::should_trigger(order, p, snapshot, now_ms),
        OrderKind::Twap(p) => twap::should_trigger(order, p, snapshot, now_ms),
        OrderKind::Iceberg(p) => iceberg::should_trigger(order, p, snapshot, now_ms),
        OrderKind::Range(p) => range::should_trigger(order, p, snapshot, now_ms),
        OrderKind::Grid(p) => grid::should_trigger(order, p, snapshot, now_ms),
        OrderKind::StopLimit(p) => stop_limit::should_trigger(order, p, snapshot, now_ms),
        OrderKind::ChaseLimit(p) => chase_limit::should_trigger(order, p, snapshot, now_ms),
        OrderKind::RangeBreakout(p) => range_breakout::should_trigger(order, p, snapshot, now_ms),
        OrderKind::MomentumReversal(p) => momentum_reversal::should_trigger(order, p, snapshot, now_ms),
    }
}

/// `slice_amount(order)`, in maker-asset base units, before the supervisor
/// clamps it to `remaining_maker` (§4.5 step 4).
pub fn slice_amount(order: &AdvancedOrder) -> Decimal {
    let raw = match &order.kind {
        OrderKind::Dca(p) => dca::slice_amount(order, p),
        OrderKind::Twap(p) => twap::slice_amount(order, p),
        OrderKind::Iceberg(p) => iceberg::slice_amount(order, p),
        OrderKind::Range(p) => range::slice_amount(order, p),
        OrderKind::Grid(p) => grid::slice_amount(order, p),
        OrderKind::StopLimit(p) => stop_limit::slice_amount(order, p),
        OrderKind::ChaseLimit(p) => chase_limit::slice_amount(order, p),
        OrderKind::RangeBreakout(p) => range_breakout::slice_amount(order, p),
        OrderKind::MomentumReversal(p) => momentum_reversal::slice_amount(order, p),
    };
    raw.min(order.remaining_maker).max(Decimal::ZERO)
}

/// `advance_schedule(order, now, snapshot)`: updates `next_trigger` (and,
/// for Grid/MomentumReversal, the baseline it carries) after a successful
/// submission (§4.5 step 5). `trigger_count` itself is bumped by the
/// supervisor, not here.
pub fn advance_schedule(order: &mut AdvancedOrder, now_ms: i64, snapshot: &IndexSnapshot) {
    match order.kind.clone() {
        OrderKind::Dca(p) => dca::advance_schedule(order, &p, now_ms),
        OrderKind::Twap(p) => twap::advance_schedule(order, &p, now_ms),
        OrderKind::Iceberg(p) => iceberg::advance_schedule(order, &p),
        OrderKind::Range(p) => range::advance_schedule(order, &p),
        OrderKind::Grid(p) => grid::advance_schedule(order, &p, snapshot),
        OrderKind::StopLimit(p) => stop_limit::advance_schedule(order, &p),
        OrderKind::ChaseLimit(p) => chase_limit::advance_schedule(order, &p, snapshot),
        OrderKind::RangeBreakout(p) => range_breakout::advance_schedule(order, &p),
        OrderKind::MomentumReversal(p) => momentum_reversal::advance_schedule(order, &p, snapshot),
    }
}

/// Arms a handler's self-referential baseline before `should_trigger` is
/// ever evaluated. MomentumReversal's baseline is only ever written by
/// `advance_schedule`, whose one call site runs after a successful
/// submission — without this, an order starting from an unset baseline
/// could never fire. Runs every supervisor tick; a no-op once armed or
/// for kinds that don't need it. Returns whether it mutated `order`.
pub fn seed_if_unset(order: &mut AdvancedOrder, snapshot: &IndexSnapshot) -> bool {
    let OrderKind::MomentumReversal(params) = order.kind.clone() else {
        return false;
    };
    if !matches!(order.next_trigger, NextTrigger::Price(p) if p == Decimal::ZERO) {
        return false;
    }
    momentum_reversal::advance_schedule(order, &params, snapshot);
    true
}

/// `side(order, snapshot)`: which direction this slice trades in. Most
/// kinds trade a fixed direction; Grid and Range (and the reversal/breakout
/// kinds) derive it from the crossing that just fired `should_trigger`.
pub fn side(order: &AdvancedOrder, snapshot: &IndexSnapshot) -> Side {
    match &order.kind {
        OrderKind::Dca(p) => dca::side(order, p, snapshot),
        OrderKind::Twap(p) => twap::side(order, p, snapshot),
        OrderKind::Iceberg(p) => iceberg::side(order, p, snapshot),
        OrderKind::Range(p) => range::side(order, p, snapshot),
        OrderKind::Grid(p) => grid::side(order, p, snapshot),
        OrderKind::StopLimit(p) => stop_limit::side(order, p, snapshot),
        OrderKind::ChaseLimit(p) => chase_limit::side(order, p, snapshot),
        OrderKind::RangeBreakout(p) => range_breakout::side(order, p, snapshot),
        OrderKind::MomentumReversal(p) => momentum_reversal::side(order, p, snapshot),
    }
}

pub(crate) fn price_ok(mid: Decimal, max_price: Option<Decimal>) -> bool {
    match max_price {
        Some(max) => mid <= max,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalyticsBlock, IndexSymbol, MomentumReversalParams};
    use crate::handlers::test_support::snapshot_with_analytics;
    use alloy_primitives::Address;
    use rust_decimal_macros::dec;

    fn momentum_order() -> AdvancedOrder {
        AdvancedOrder::new(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            IndexSymbol::new("ETHUSDT"),
            OrderKind::MomentumReversal(MomentumReversalParams {
                rsi_period: 14,
                rsima_period: 14,
                amount: dec!(20),
            }),
            dec!(100),
            0,
            NextTrigger::Price(Decimal::ZERO),
        )
    }

    fn analytics(rsi: f64, rsi_ma: f64) -> AnalyticsBlock {
        AnalyticsBlock {
            ema: None,
            rsi: Some(rsi),
            rsi_ma: Some(rsi_ma),
            adx: None,
            adx_ma: None,
            samples: 30,
        }
    }

    #[test]
    fn unseeded_momentum_order_arms_then_can_trigger_on_next_crossing() {
        let mut order = momentum_order();
        let armed = snapshot_with_analytics(dec!(2000), analytics(60.0, 55.0));

        // A freshly created order can never fire without seeding first.
        assert!(!should_trigger(&order, &armed, 0));

        assert!(seed_if_unset(&mut order, &armed));
        assert_eq!(order.next_trigger, NextTrigger::Price(dec!(5)));
        // Already-armed orders are left alone on subsequent ticks.
        assert!(!seed_if_unset(&mut order, &armed));

        let reversed = snapshot_with_analytics(dec!(2000), analytics(40.0, 45.0));
        assert!(should_trigger(&order, &reversed, 0));
    }
}
