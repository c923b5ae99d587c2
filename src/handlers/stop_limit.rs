//! StopLimit (§4.8): one-shot — arms on construction, fires the instant mid
//! crosses `stop_price`, submits the full remainder at `limit_price`, done.

use rust_decimal::Decimal;

use crate::model::{AdvancedOrder, IndexSnapshot, NextTrigger, Side, StopLimitParams};

pub fn should_trigger(order: &AdvancedOrder, params: &StopLimitParams, snapshot: &IndexSnapshot, _now_ms: i64) -> bool {
    order.trigger_count == 0 && order.remaining_maker > Decimal::ZERO && snapshot.mid >= params.stop_price
}

pub fn slice_amount(order: &AdvancedOrder, _params: &StopLimitParams) -> Decimal {
    order.remaining_maker
}

pub fn advance_schedule(order: &mut AdvancedOrder, _params: &StopLimitParams) {
    order.next_trigger = NextTrigger::Done;
}

/// Fires on an upward breach of `stop_price`: a protective sell stop.
pub fn side(_order: &AdvancedOrder, _params: &StopLimitParams, _snapshot: &IndexSnapshot) -> Side {
    Side::Sell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::snapshot;
    use crate::model::{IndexSymbol, OrderKind};
    use alloy_primitives::Address;
    use rust_decimal_macros::dec;

    fn params() -> StopLimitParams {
        StopLimitParams {
            stop_price: dec!(2000),
            limit_price: dec!(1990),
            expiry_days: Some(3.0),
        }
    }

    fn order() -> AdvancedOrder {
        AdvancedOrder::new(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            IndexSymbol::new("ETHUSDT"),
            OrderKind::StopLimit(params()),
            dec!(50),
            0,
            NextTrigger::Price(dec!(2000)),
        )
    }

    #[test]
    fn fires_once_stop_crossed() {
        let o = order();
        let p = params();
        assert!(!should_trigger(&o, &p, &snapshot(dec!(1999)), 0));
        assert!(should_trigger(&o, &p, &snapshot(dec!(2000)), 0));
    }

    #[test]
    fn one_shot_never_fires_twice() {
        let mut o = order();
        o.trigger_count = 1;
        let p = params();
        assert!(!should_trigger(&o, &p, &snapshot(dec!(2500)), 0));
    }

    #[test]
    fn slice_amount_is_full_remainder() {
        let o = order();
        let p = params();
        assert_eq!(slice_amount(&o, &p), dec!(50));
    }
}
