//! Range (§4.8): like Iceberg but the target sequence can run either
//! direction — ascending (sell as price climbs) or descending (buy as price
//! falls), picked by `start_price`/`end_price` ordering.

use rust_decimal::Decimal;

use crate::model::{AdvancedOrder, IndexSnapshot, NextTrigger, RangeParams, Side};

pub fn should_trigger(order: &AdvancedOrder, params: &RangeParams, snapshot: &IndexSnapshot, _now_ms: i64) -> bool {
    if order.remaining_maker <= Decimal::ZERO || order.trigger_count >= params.steps {
        return false;
    }
    let level = params.level_price(order.trigger_count);
    if params.is_ascending() {
        snapshot.mid >= level
    } else {
        snapshot.mid <= level
    }
}

pub fn slice_amount(order: &AdvancedOrder, params: &RangeParams) -> Decimal {
    let per_step = params.amount / Decimal::from(params.steps.max(1));
    if order.trigger_count + 1 >= params.steps {
        order.remaining_maker
    } else {
        per_step
    }
}

pub fn advance_schedule(order: &mut AdvancedOrder, params: &RangeParams) {
    let next_step = order.trigger_count + 1;
    if next_step >= params.steps {
        order.next_trigger = NextTrigger::Done;
    } else {
        order.next_trigger = NextTrigger::Price(params.level_price(next_step));
    }
}

/// Ascending ranges sell as price climbs; descending ranges buy as price
/// falls.
pub fn side(_order: &AdvancedOrder, params: &RangeParams, _snapshot: &IndexSnapshot) -> Side {
    if params.is_ascending() {
        Side::Sell
    } else {
        Side::Buy
    }
}
