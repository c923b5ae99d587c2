//! MomentumReversal (§4.8): recurring — fires each time Wilder's RSI crosses
//! its own moving average. `NextTrigger::Price` repurposed to carry the
//! previous `rsi - rsi_ma` sign as a baseline, since `AnalyticsBlock` only
//! exposes the latest scalar values, not history.

use rust_decimal::Decimal;

use crate::model::{AdvancedOrder, IndexSnapshot, MomentumReversalParams, NextTrigger, Side};

fn diff(snapshot: &IndexSnapshot) -> Option<f64> {
    let rsi = snapshot.analytics.rsi?;
    let rsi_ma = snapshot.analytics.rsi_ma?;
    Some(rsi - rsi_ma)
}

pub fn should_trigger(order: &AdvancedOrder, _params: &MomentumReversalParams, snapshot: &IndexSnapshot, _now_ms: i64) -> bool {
    if order.remaining_maker <= Decimal::ZERO {
        return false;
    }
    let Some(current) = diff(snapshot) else {
        return false;
    };
    let baseline = match order.next_trigger {
        NextTrigger::Price(p) => p.to_string().parse::<f64>().unwrap_or(0.0),
        _ => return false,
    };
    // A baseline of exactly 0 means not yet armed (`seed_if_unset` hasn't
    // run for this order yet); never fires until a real reading lands.
    if baseline == 0.0 {
        return false;
    }
    baseline.signum() != current.signum() && current != 0.0
}

pub fn slice_amount(_order: &AdvancedOrder, params: &MomentumReversalParams) -> Decimal {
    params.amount
}

pub fn advance_schedule(order: &mut AdvancedOrder, _params: &MomentumReversalParams, snapshot: &IndexSnapshot) {
    if let Some(current) = diff(snapshot) {
        let stored = Decimal::from_f64_retain(current).unwrap_or(Decimal::ZERO);
        order.next_trigger = NextTrigger::Price(stored);
    }
}

/// RSI crossing below its moving average reads as a bearish reversal
/// (sell); crossing above reads as bullish (buy).
pub fn side(_order: &AdvancedOrder, _params: &MomentumReversalParams, snapshot: &IndexSnapshot) -> Side {
    match diff(snapshot) {
        Some(current) if current < 0.0 => Side::Sell,
        _ => Side::Buy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::snapshot_with_analytics;
    use crate::model::{AnalyticsBlock, IndexSymbol, OrderKind};
    use alloy_primitives::Address;
    use rust_decimal_macros::dec;

    fn params() -> MomentumReversalParams {
        MomentumReversalParams {
            rsi_period: 14,
            rsima_period: 14,
            amount: dec!(20),
        }
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

    fn order(baseline: Decimal) -> AdvancedOrder {
        AdvancedOrder::new(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            IndexSymbol::new("ETHUSDT"),
            OrderKind::MomentumReversal(params()),
            dec!(100),
            0,
            NextTrigger::Price(baseline),
        )
    }

    #[test]
    fn first_evaluation_only_arms() {
        let o = order(Decimal::ZERO);
        let p = params();
        let snap = snapshot_with_analytics(dec!(2000), analytics(60.0, 55.0));
        assert!(!should_trigger(&o, &p, &snap, 0));
    }

    #[test]
    fn sign_crossing_triggers() {
        let o = order(dec!(5)); // was above MA
        let p = params();
        let snap = snapshot_with_analytics(dec!(2000), analytics(40.0, 45.0)); // now below
        assert!(should_trigger(&o, &p, &snap, 0));
    }

    #[test]
    fn no_crossing_does_not_trigger() {
        let o = order(dec!(5));
        let p = params();
        let snap = snapshot_with_analytics(dec!(2000), analytics(60.0, 50.0));
        assert!(!should_trigger(&o, &p, &snap, 0));
    }
}
