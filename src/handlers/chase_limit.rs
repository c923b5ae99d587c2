//! ChaseLimit (§4.8, §9 Open Question): recurring — re-quotes whenever mid
//! has drifted `distance_pct` away from the last reference price, using
//! `NextTrigger::Price` to carry that reference between evaluations.

use rust_decimal::Decimal;

use crate::model::{AdvancedOrder, ChaseLimitParams, IndexSnapshot, NextTrigger, Side};

use super::price_ok;

pub fn should_trigger(order: &AdvancedOrder, params: &ChaseLimitParams, snapshot: &IndexSnapshot, _now_ms: i64) -> bool {
    if order.remaining_maker <= Decimal::ZERO {
        return false;
    }
    let reference = match order.next_trigger {
        NextTrigger::Price(r) => r,
        _ => return false,
    };
    if reference == Decimal::ZERO {
        return false;
    }
    let drift = (snapshot.mid - reference).abs() / reference * Decimal::from(100);
    drift >= params.distance_pct && price_ok(snapshot.mid, params.max_price)
}

pub fn slice_amount(order: &AdvancedOrder, _params: &ChaseLimitParams) -> Decimal {
    order.remaining_maker
}

pub fn advance_schedule(order: &mut AdvancedOrder, _params: &ChaseLimitParams, snapshot: &IndexSnapshot) {
    order.next_trigger = NextTrigger::Price(snapshot.mid);
}

/// Chases the book down, re-quoting a sell closer to the drifting mid.
pub fn side(_order: &AdvancedOrder, _params: &ChaseLimitParams, _snapshot: &IndexSnapshot) -> Side {
    Side::Sell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::snapshot;
    use crate::model::{IndexSymbol, OrderKind};
    use alloy_primitives::Address;
    use rust_decimal_macros::dec;

    fn params() -> ChaseLimitParams {
        ChaseLimitParams {
            distance_pct: dec!(2),
            expiry_days: None,
            max_price: None,
        }
    }

    fn order(reference: Decimal) -> AdvancedOrder {
        AdvancedOrder::new(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            IndexSymbol::new("ETHUSDT"),
            OrderKind::ChaseLimit(params()),
            dec!(50),
            0,
            NextTrigger::Price(reference),
        )
    }

    #[test]
    fn triggers_once_drift_exceeds_distance() {
        let o = order(dec!(2000));
        let p = params();
        assert!(!should_trigger(&o, &p, &snapshot(dec!(2030)), 0)); // 1.5%
        assert!(should_trigger(&o, &p, &snapshot(dec!(2040)), 0)); // 2%
    }

    #[test]
    fn advance_schedule_rearms_reference_recurring() {
        let mut o = order(dec!(2000));
        advance_schedule(&mut o, &params(), &snapshot(dec!(2040)));
        assert_eq!(o.next_trigger, NextTrigger::Price(dec!(2040)));
    }
}
