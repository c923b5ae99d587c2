//! Shared fixtures for handler unit tests (§8 scenarios).
#![cfg(test)]

use rust_decimal::Decimal;

use crate::model::{AnalyticsBlock, IndexSnapshot, IndexSymbol};

pub fn snapshot(mid: Decimal) -> IndexSnapshot {
    snapshot_with_analytics(mid, AnalyticsBlock::default())
}

pub fn snapshot_with_analytics(mid: Decimal, analytics: AnalyticsBlock) -> IndexSnapshot {
    IndexSnapshot {
        symbol: IndexSymbol::new("ETHUSDT"),
        bid: mid,
        ask: mid,
        mid,
        vbid: Decimal::ZERO,
        vask: Decimal::ZERO,
        velocity: 0.0,
        dispersion: 0.0,
        ts_ms: 0,
        history: Vec::new(),
        analytics,
    }
}
