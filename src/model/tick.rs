//! Per-source ticks, feed health tracking, and the OHLC bucket sequence
//! maintained per `IndexSymbol`.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::symbol::Symbol;

/// A single observation from one venue. Invariants enforced at
/// construction: `bid <= mid <= ask`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
    pub last: Decimal,
    pub volume: Decimal,
    pub ts_ms: i64,
}

impl Tick {
    /// Builds a tick, clamping `mid` into `[bid, ask]` if a caller passed an
    /// out-of-band value (defends the invariant instead of trusting venues).
    pub fn new(bid: Decimal, ask: Decimal, last: Decimal, volume: Decimal, ts_ms: i64) -> Self {
        let mid = ((bid + ask) / Decimal::from(2)).clamp(bid, ask);
        Self {
            bid,
            ask,
            mid,
            last,
            volume,
            ts_ms,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.bid <= self.mid && self.mid <= self.ask
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedStatus {
    Inactive,
    Active,
    Error,
}

/// A venue's latest observation for one `Symbol`, plus its weight in the
/// index it feeds and its freshness bookkeeping.
#[derive(Debug, Clone)]
pub struct SourceFeed {
    pub symbol: Symbol,
    pub weight: Decimal,
    pub status: FeedStatus,
    pub last: Tick,
    pub updated_ms: i64,
    /// Consecutive publish windows in which this source was excluded for
    /// staleness. Two consecutive exclusions demote `status` to `Inactive`.
    pub stale_strikes: u32,
}

impl SourceFeed {
    pub fn new(symbol: Symbol, weight: Decimal, tick: Tick) -> Self {
        Self {
            symbol,
            weight,
            status: FeedStatus::Active,
            updated_ms: tick.ts_ms,
            last: tick,
            stale_strikes: 0,
        }
    }

    /// Applies a freshly-observed tick if it is newer than the last one
    /// (out-of-order ticks are dropped per source, not reordered).
    pub fn apply(&mut self, tick: Tick) -> bool {
        if tick.ts_ms <= self.last.ts_ms {
            return false;
        }
        if self.status != FeedStatus::Active {
            self.status = FeedStatus::Active;
        }
        self.stale_strikes = 0;
        self.updated_ms = tick.ts_ms;
        self.last = tick;
        true
    }

    pub fn is_fresh(&self, now_ms: i64, freshness_window_ms: i64) -> bool {
        now_ms.saturating_sub(self.updated_ms) <= freshness_window_ms
    }
}

/// One OHLC candle bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub bucket_start_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Ohlc {
    fn new(bucket_start_ms: i64, price: Decimal, volume: Decimal) -> Self {
        Self {
            bucket_start_ms,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    fn merge(&mut self, price: Decimal, volume: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.volume += volume;
    }
}

/// Reverse-chronological OHLC history for one `IndexSymbol`, bounded by a
/// configured lookback. `timeframe_ms` sizes each bucket.
#[derive(Debug, Clone)]
pub struct OhlcHistory {
    pub timeframe_ms: i64,
    pub lookback: usize,
    /// Front = most recent bucket.
    buckets: VecDeque<Ohlc>,
}

impl OhlcHistory {
    pub fn new(timeframe_ms: i64, lookback: usize) -> Self {
        Self {
            timeframe_ms,
            lookback: lookback.max(1),
            buckets: VecDeque::with_capacity(lookback.min(4096)),
        }
    }

    fn bucket_start(&self, ts_ms: i64) -> i64 {
        (ts_ms / self.timeframe_ms) * self.timeframe_ms
    }

    /// Appends or merges `price`/`volume` at `ts_ms` into the head bucket,
    /// per §3's bucket semantics.
    pub fn record(&mut self, ts_ms: i64, price: Decimal, volume: Decimal) {
        let start = self.bucket_start(ts_ms);
        match self.buckets.front_mut() {
            Some(head) if head.bucket_start_ms == start => {
                head.merge(price, volume);
            }
            Some(head) if start > head.bucket_start_ms => {
                self.buckets.push_front(Ohlc::new(start, price, volume));
                while self.buckets.len() > self.lookback {
                    self.buckets.pop_back();
                }
            }
            Some(_) => {
                // ts_ms belongs to an already-closed, older bucket: ignore.
            }
            None => {
                self.buckets.push_front(Ohlc::new(start, price, volume));
            }
        }
    }

    /// Most recent-first slice of closed + in-progress candles.
    pub fn as_slice(&self) -> Vec<Ohlc> {
        self.buckets.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<Ohlc> {
        self.buckets.front().copied()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
