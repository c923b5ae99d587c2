//! Iceberg (§4.8): sell in `steps` fixed-size clips as the mid price climbs
//! through interpolated targets between `start_price` and `end_price`.

use rust_decimal::Decimal;

use crate::model::{AdvancedOrder, IcebergParams, IndexSnapshot, NextTrigger, Side};

pub fn should_trigger(order: &AdvancedOrder, params: &IcebergParams, snapshot: &IndexSnapshot, _now_ms: i64) -> bool {
    if order.remaining_maker <= Decimal::ZERO || order.trigger_count >= params.steps {
        return false;
    }
    snapshot.mid >= params.target_price(order.trigger_count)
}

pub fn slice_amount(order: &AdvancedOrder, params: &IcebergParams) -> Decimal {
    let per_step = params.amount / Decimal::from(params.steps.max(1));
    if order.trigger_count + 1 >= params.steps {
        // Last clip absorbs any rounding remainder.
        order.remaining_maker
    } else {
        per_step
    }
}

pub fn advance_schedule(order: &mut AdvancedOrder, params: &IcebergParams) {
    let next_step = order.trigger_count + 1;
    if next_step >= params.steps {
        order.next_trigger = NextTrigger::Done;
    } else {
        order.next_trigger = NextTrigger::Price(params.target_price(next_step));
    }
}

/// Iceberg sells fixed-size clips as the mid price climbs through its
/// interpolated targets.
pub fn side(_order: &AdvancedOrder, _params: &IcebergParams, _snapshot: &IndexSnapshot) -> Side {
    Side::Sell
}
