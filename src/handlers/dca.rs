//! DCA (§4.8): fire every `interval_ms`, unconditionally recurring, capped
//! only by `max_price` and by the owning order's `remaining_maker`.

use rust_decimal::Decimal;

use crate::model::{AdvancedOrder, DcaParams, IndexSnapshot, NextTrigger, Side};

use super::price_ok;

pub fn should_trigger(order: &AdvancedOrder, params: &DcaParams, snapshot: &IndexSnapshot, now_ms: i64) -> bool {
    if order.remaining_maker <= Decimal::ZERO {
        return false;
    }
    let due = match order.next_trigger {
        NextTrigger::Time(t) => now_ms >= t,
        _ => false,
    };
    due && price_ok(snapshot.mid, params.max_price)
}

pub fn slice_amount(order: &AdvancedOrder, params: &DcaParams) -> Decimal {
    params.amount.min(order.remaining_maker)
}

pub fn advance_schedule(order: &mut AdvancedOrder, params: &DcaParams, now_ms: i64) {
    order.next_trigger = NextTrigger::Time(now_ms + params.interval_ms);
}

/// Dollar-cost-averaging sells the maker asset down on a fixed cadence.
pub fn side(_order: &AdvancedOrder, _params: &DcaParams, _snapshot: &IndexSnapshot) -> Side {
    Side::Sell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IndexSymbol, OrderKind};
    use crate::handlers::test_support::snapshot;
    use alloy_primitives::Address;
    use rust_decimal_macros::dec;

    fn order(max_price: Option<Decimal>, next_trigger: NextTrigger) -> AdvancedOrder {
        AdvancedOrder::new(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            IndexSymbol::new("ETHUSDT"),
            OrderKind::Dca(DcaParams {
                interval_ms: 60_000,
                amount: dec!(10),
                max_price,
            }),
            dec!(100),
            0,
            next_trigger,
        )
    }

    #[test]
    fn fires_once_due_time_elapses() {
        let o = order(None, NextTrigger::Time(1_000));
        let DcaHarness { params } = harness(&o);
        assert!(!should_trigger(&o, &params, &snapshot(dec!(100)), 999));
        assert!(should_trigger(&o, &params, &snapshot(dec!(100)), 1_000));
    }

    #[test]
    fn respects_max_price_cap() {
        let o = order(Some(dec!(100)), NextTrigger::Time(0));
        let DcaHarness { params } = harness(&o);
        assert!(!should_trigger(&o, &params, &snapshot(dec!(101)), 1_000));
        assert!(should_trigger(&o, &params, &snapshot(dec!(100)), 1_000));
    }

    #[test]
    fn advance_schedule_reschedules_from_now() {
        let mut o = order(None, NextTrigger::Time(0));
        let DcaHarness { params } = harness(&o);
        advance_schedule(&mut o, &params, 5_000);
        assert_eq!(o.next_trigger, NextTrigger::Time(65_000));
    }

    struct DcaHarness {
        params: DcaParams,
    }

    fn harness(order: &AdvancedOrder) -> DcaHarness {
        match &order.kind {
            OrderKind::Dca(p) => DcaHarness { params: p.clone() },
            _ => unreachable!(),
        }
    }
}
