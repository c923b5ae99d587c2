//! Per-venue market-data ingestion (§4.1). One task per venue, each driving
//! a `VenueConnector` that prefers streaming and falls back to batch REST
//! polling.

pub mod adapter;
pub mod backoff;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{Symbol, Tick};

/// A single weighted subscription request handed to a venue task.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub symbol: Symbol,
    pub weight: Decimal,
}

/// Emitted by a connector for every accepted tick (§4.1 contract).
#[derive(Debug, Clone)]
pub struct SourceFeedUpdate {
    pub symbol: Symbol,
    pub tick: Tick,
}

/// Data describing one venue, so new venues are onboarded by adding a row
/// rather than a new hand-written struct (§4.1 ambient addition).
#[derive(Debug, Clone)]
pub struct VenueProfile {
    pub venue: String,
    pub ws_url: Option<String>,
    pub rest_base_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl VenueProfile {
    pub fn rest_only(venue: impl Into<String>, rest_base_url: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            ws_url: None,
            rest_base_url: rest_base_url.into(),
            poll_interval_ms: 1000,
            request_timeout_ms: 10_000,
        }
    }
}

/// Trade side, used to derive synthetic ticks from a trade-only stream
/// (§4.1: "Tick derivation when only trade stream is available").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy)]
pub struct Trade {
    pub price: Decimal,
    pub amount: Decimal,
    pub side: TradeSide,
    pub ts_ms: i64,
}

/// Folds a trade into the previous tick per §4.1's derivation rule: the side
/// that traded updates that side of book, the other side is carried over.
pub fn tick_from_trade(prev: Option<Tick>, trade: Trade) -> Tick {
    let (bid, ask) = match (prev, trade.side) {
        (Some(p), TradeSide::Buy) => (p.bid, trade.price),
        (Some(p), TradeSide::Sell) => (trade.price, p.ask),
        (None, _) => (trade.price, trade.price),
    };
    Tick::new(bid, ask, trade.price, trade.amount, trade.ts_ms)
}

/// Object-safe connector contract (§4.1 ambient addition). One concrete
/// implementation (`adapter::GenericRestWsConnector`) is driven by
/// `VenueProfile` data instead of one struct per venue.
#[async_trait::async_trait]
pub trait VenueConnector: Send + Sync {
    /// Runs until `shutdown` fires, pushing every accepted update onto
    /// `out`. Connection and decode failures are handled internally with
    /// backoff; only a venue-fatal condition (markets never load) returns
    /// `Err`.
    async fn run(
        &self,
        subscriptions: Vec<Subscription>,
        out: tokio::sync::mpsc::Sender<SourceFeedUpdate>,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trade_derivation_carries_opposite_side() {
        let prev = Tick::new(dec!(100), dec!(102), dec!(101), dec!(1), 0);
        let buy = Trade {
            price: dec!(103),
            amount: dec!(2),
            side: TradeSide::Buy,
            ts_ms: 1,
        };
        let t = tick_from_trade(Some(prev), buy);
        assert_eq!(t.ask, dec!(103));
        assert_eq!(t.bid, dec!(100));

        let sell = Trade {
            price: dec!(99),
            amount: dec!(1),
            side: TradeSide::Sell,
            ts_ms: 2,
        };
        let t2 = tick_from_trade(Some(t), sell);
        assert_eq!(t2.bid, dec!(99));
        assert_eq!(t2.ask, dec!(103));
    }

    #[test]
    fn trade_derivation_seeds_from_none() {
        let trade = Trade {
            price: dec!(50),
            amount: dec!(1),
            side: TradeSide::Buy,
            ts_ms: 0,
        };
        let t = tick_from_trade(None, trade);
        assert_eq!(t.bid, dec!(50));
        assert_eq!(t.ask, dec!(50));
    }
}
