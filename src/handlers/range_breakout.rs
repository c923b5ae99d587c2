//! RangeBreakout (§4.8): one-shot — fires when ADX confirms a trending
//! regime (`adx > threshold && adx > adx_ma`) and price has broken away from
//! its EMA by more than `breakout_pct`.

use rust_decimal::Decimal;

use crate::model::{AdvancedOrder, IndexSnapshot, NextTrigger, RangeBreakoutParams, Side};

pub fn should_trigger(order: &AdvancedOrder, params: &RangeBreakoutParams, snapshot: &IndexSnapshot, _now_ms: i64) -> bool {
    if order.trigger_count > 0 || order.remaining_maker <= Decimal::ZERO {
        return false;
    }
    let analytics = &snapshot.analytics;
    let (Some(adx), Some(adx_ma), Some(ema)) = (analytics.adx, analytics.adx_ma, analytics.ema) else {
        return false;
    };
    if ema == 0.0 {
        return false;
    }
    let mid = snapshot.mid.to_string().parse::<f64>().unwrap_or(0.0);
    let deviation_pct = ((mid - ema) / ema * 100.0).abs();
    adx > params.adx_threshold && adx > adx_ma && deviation_pct > params.breakout_pct
}

pub fn slice_amount(order: &AdvancedOrder, _params: &RangeBreakoutParams) -> Decimal {
    order.remaining_maker
}

pub fn advance_schedule(order: &mut AdvancedOrder, _params: &RangeBreakoutParams) {
    order.next_trigger = NextTrigger::Done;
}

/// Trades in the direction of the breakout: buy when mid has broken above
/// its EMA, sell when it has broken below.
pub fn side(_order: &AdvancedOrder, _params: &RangeBreakoutParams, snapshot: &IndexSnapshot) -> Side {
    let ema = snapshot.analytics.ema.unwrap_or(0.0);
    let mid = snapshot.mid.to_string().parse::<f64>().unwrap_or(0.0);
    if mid >= ema {
        Side::Buy
    } else {
        Side::Sell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::snapshot_with_analytics;
    use crate::model::{AnalyticsBlock, IndexSymbol, OrderKind};
    use alloy_primitives::Address;
    use rust_decimal_macros::dec;

    fn params() -> RangeBreakoutParams {
        RangeBreakoutParams {
            adx_threshold: 25.0,
            adxma_period: 14,
            breakout_pct: 1.0,
        }
    }

    fn order() -> AdvancedOrder {
        AdvancedOrder::new(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            IndexSymbol::new("ETHUSDT"),
            OrderKind::RangeBreakout(params()),
            dec!(50),
            0,
            NextTrigger::Done,
        )
    }

    #[test]
    fn missing_analytics_never_triggers() {
        let o = order();
        let p = params();
        let snap = snapshot_with_analytics(dec!(2100), AnalyticsBlock::default());
        assert!(!should_trigger(&o, &p, &snap, 0));
    }

    #[test]
    fn trending_breakout_triggers() {
        let o = order();
        let p = params();
        let analytics = AnalyticsBlock {
            ema: Some(2000.0),
            adx: Some(30.0),
            adx_ma: Some(20.0),
            rsi: None,
            rsi_ma: None,
            samples: 30,
        };
        let snap = snapshot_with_analytics(dec!(2100), analytics);
        assert!(should_trigger(&o, &p, &snap, 0));
    }

    #[test]
    fn one_shot_never_fires_twice() {
        let mut o = order();
        o.trigger_count = 1;
        let p = params();
        let analytics = AnalyticsBlock {
            ema: Some(2000.0),
            adx: Some(30.0),
            adx_ma: Some(20.0),
            rsi: None,
            rsi_ma: None,
            samples: 30,
        };
        let snap = snapshot_with_analytics(dec!(2100), analytics);
        assert!(!should_trigger(&o, &p, &snap, 0));
    }
}
