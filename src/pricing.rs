//! Limit-price derivation (§4.6 "Limit-price derivation"): bias a slice's
//! limit price to fill fast without crossing the book.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::model::{IndexSnapshot, Side};

/// `mid ± 0.025%·mid`, clamped toward the opposite side of the spread by at
/// most `spread/4`. Buy biases down (pay less), sell biases up (get more).
pub fn limit_price(snapshot: &IndexSnapshot, side: Side) -> Decimal {
    let bias = snapshot.mid * dec!(0.00025);
    let raw = match side {
        Side::Buy => snapshot.mid - bias,
        Side::Sell => snapshot.mid + bias,
    };
    let max_clamp = snapshot.spread() / Decimal::from(4);
    match side {
        Side::Buy => raw.max(snapshot.mid - max_clamp),
        Side::Sell => raw.min(snapshot.mid + max_clamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalyticsBlock, IndexSymbol};
    use rust_decimal_macros::dec;

    fn snapshot(bid: Decimal, ask: Decimal) -> IndexSnapshot {
        let mid = (bid + ask) / Decimal::from(2);
        IndexSnapshot {
            symbol: IndexSymbol::new("ETHUSDT"),
            bid,
            ask,
            mid,
            vbid: Decimal::ZERO,
            vask: Decimal::ZERO,
            velocity: 0.0,
            dispersion: 0.0,
            ts_ms: 0,
            history: Vec::new(),
            analytics: AnalyticsBlock::default(),
        }
    }

    #[test]
    fn sell_biases_above_mid() {
        let snap = snapshot(dec!(1999), dec!(2001));
        let price = limit_price(&snap, Side::Sell);
        assert!(price > snap.mid);
    }

    #[test]
    fn buy_biases_below_mid() {
        let snap = snapshot(dec!(1999), dec!(2001));
        let price = limit_price(&snap, Side::Buy);
        assert!(price < snap.mid);
    }

    #[test]
    fn wide_spread_clamps_bias() {
        // spread/4 here is much smaller than 0.025%·mid would otherwise be
        // for a tight spread, but with a *tight* spread the clamp binds.
        let snap = snapshot(dec!(1999.999), dec!(2000.001));
        let price = limit_price(&snap, Side::Sell);
        let max = snap.mid + snap.spread() / Decimal::from(4);
        assert!(price <= max);
    }
}
