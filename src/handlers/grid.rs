//! Grid (§4.8, §9 Open Question): stacked limit levels across
//! `[start_price, end_price]`. Crossing a level buys going down, sells going
//! up; `NextTrigger::Grid` tracks the last level visited plus how many
//! buy/sell slots remain so the order winds down once both sides exhaust.

use rust_decimal::Decimal;

use crate::model::{AdvancedOrder, GridParams, IndexSnapshot, NextTrigger, Side};

fn current_level(params: &GridParams, snapshot: &IndexSnapshot) -> i64 {
    params.level_of(snapshot.mid)
}

pub fn should_trigger(order: &AdvancedOrder, params: &GridParams, snapshot: &IndexSnapshot, _now_ms: i64) -> bool {
    if order.remaining_maker <= Decimal::ZERO {
        return false;
    }
    let (last_level, buy_levels, sell_levels) = match order.next_trigger {
        NextTrigger::Grid { last_level, buy_levels, sell_levels } => (last_level, buy_levels, sell_levels),
        _ => return false,
    };
    if snapshot.mid < params.start_price || snapshot.mid > params.end_price {
        return false;
    }
    let level = current_level(params, snapshot);
    if level == last_level {
        return false;
    }
    if level < last_level {
        buy_levels > 0
    } else {
        sell_levels > 0
    }
}

pub fn slice_amount(order: &AdvancedOrder, params: &GridParams) -> Decimal {
    let total = params.total_levels().max(1);
    (params.amount / Decimal::from(total)).min(order.remaining_maker)
}

pub fn advance_schedule(order: &mut AdvancedOrder, params: &GridParams, snapshot: &IndexSnapshot) {
    let level = current_level(params, snapshot);
    if let NextTrigger::Grid { last_level, mut buy_levels, mut sell_levels } = order.next_trigger.clone() {
        if level < last_level {
            buy_levels = buy_levels.saturating_sub(1);
        } else if level > last_level {
            sell_levels = sell_levels.saturating_sub(1);
        }
        order.next_trigger = if buy_levels == 0 && sell_levels == 0 {
            NextTrigger::Done
        } else {
            NextTrigger::Grid { last_level: level, buy_levels, sell_levels }
        };
    }
}

/// Crossing a level downward buys; crossing upward sells (§9 Open
/// Question). Must be read before `advance_schedule` overwrites
/// `last_level`, since that's the crossing this slice is for.
pub fn side(order: &AdvancedOrder, params: &GridParams, snapshot: &IndexSnapshot) -> Side {
    let last_level = match order.next_trigger {
        NextTrigger::Grid { last_level, .. } => last_level,
        _ => return Side::Sell,
    };
    if current_level(params, snapshot) < last_level {
        Side::Buy
    } else {
        Side::Sell
    }
}
