//! The published view of an `IndexSymbol`: weighted top-of-book, dispersion,
//! velocity, OHLC history, and the derived analytics block.

use rust_decimal::Decimal;

use super::symbol::IndexSymbol;
use super::tick::Ohlc;

/// EMA/RSI/ADX and their moving averages, recomputed from `history` on every
/// publish. Each field is `None` until enough closed buckets exist to seed
/// the indicator — handlers that need one treat `None` as a precondition
/// miss (`should_trigger = false`), never as an error.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalyticsBlock {
    pub ema: Option<f64>,
    pub rsi: Option<f64>,
    pub rsi_ma: Option<f64>,
    pub adx: Option<f64>,
    pub adx_ma: Option<f64>,
    pub samples: usize,
}

#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    pub symbol: IndexSymbol,
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
    /// Total active weight backing the bid/ask average (for callers that
    /// want to know how "thick" this window's quote was).
    pub vbid: Decimal,
    pub vask: Decimal,
    pub velocity: f64,
    pub dispersion: f64,
    pub ts_ms: i64,
    pub history: Vec<Ohlc>,
    pub analytics: AnalyticsBlock,
}

impl IndexSnapshot {
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}
