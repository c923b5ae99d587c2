//! Index Engine (§4.2): merges per-venue ticks into a weighted index per
//! `IndexSymbol`, maintains rolling OHLC, and publishes `IndexSnapshot`s to
//! the Price Bus at a fixed cadence.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::bus::PriceBus;
use crate::config::Config;
use crate::exchange::SourceFeedUpdate;
use crate::model::{FeedStatus, IndexSnapshot, IndexSymbol, OhlcHistory, SourceFeed, Symbol};

use super::analytics::Analytics;

struct SymbolState {
    sources: HashMap<Symbol, SourceFeed>,
    history: OhlcHistory,
    tick_count: u64,
    pending: usize,
}

pub struct IndexEngine {
    source_index: HashMap<Symbol, Vec<IndexSymbol>>,
    state: HashMap<IndexSymbol, SymbolState>,
    analytics: Arc<dyn Analytics>,
    bus: Arc<PriceBus>,
    max_pending_per_symbol: usize,
    batch_size: usize,
    freshness_window_ms: i64,
    publish_interval_ms: u64,
    dropped_updates: u64,
}

impl IndexEngine {
    pub fn new(config: &Config, analytics: Arc<dyn Analytics>, bus: Arc<PriceBus>) -> Self {
        let mut source_index: HashMap<Symbol, Vec<IndexSymbol>> = HashMap::new();
        let mut state = HashMap::new();
        for (index_symbol, ticker) in &config.tickers {
            for symbol in ticker.sources.keys() {
                source_index
                    .entry(symbol.clone())
                    .or_default()
                    .push(index_symbol.clone());
            }
            state.insert(
                index_symbol.clone(),
                SymbolState {
                    sources: HashMap::new(),
                    history: OhlcHistory::new(ticker.tf_ms, ticker.lookback),
                    tick_count: 0,
                    pending: 0,
                },
            );
        }
        Self {
            source_index,
            state,
            analytics,
            bus,
            max_pending_per_symbol: config.max_pending_per_symbol,
            batch_size: config.batch_size,
            freshness_window_ms: config.freshness_window_ms,
            publish_interval_ms: config.publish_interval_ms,
            dropped_updates: 0,
        }
    }

    fn weight_of(config: &Config, index_symbol: &IndexSymbol, symbol: &Symbol) -> Decimal {
        config
            .tickers
            .get(index_symbol)
            .and_then(|t| t.sources.get(symbol))
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    /// Per-tick work, O(1) per source update (§4.2).
    fn apply_update(&mut self, config: &Config, update: SourceFeedUpdate) {
        let Some(index_symbols) = self.source_index.get(&update.symbol).cloned() else {
            return;
        };
        for index_symbol in index_symbols {
            let Some(st) = self.state.get_mut(&index_symbol) else {
                continue;
            };
            if st.pending >= self.max_pending_per_symbol {
                self.dropped_updates += 1;
                debug!(%index_symbol, "dropping update: backpressure boundary hit");
                continue;
            }

            let applied = match st.sources.get_mut(&update.symbol) {
                Some(feed) => feed.apply(update.tick),
                None => {
                    let weight = Self::weight_of(config, &index_symbol, &update.symbol);
                    st.sources
                        .insert(update.symbol.clone(), SourceFeed::new(update.symbol.clone(), weight, update.tick));
                    true
                }
            };
            if !applied {
                continue;
            }

            st.history.record(update.tick.ts_ms, update.tick.last, update.tick.volume);
            st.tick_count += 1;
            st.pending += 1;
        }
    }

    fn compute_snapshot(&mut self, index_symbol: &IndexSymbol, now_ms: i64) -> Option<IndexSnapshot> {
        let st = self.state.get_mut(index_symbol)?;

        let mut active: Vec<(Decimal, Decimal, Decimal)> = Vec::new(); // (bid, ask, weight)
        for feed in st.sources.values_mut() {
            if feed.is_fresh(now_ms, self.freshness_window_ms) {
                if feed.status != FeedStatus::Active {
                    feed.status = FeedStatus::Active;
                }
                feed.stale_strikes = 0;
                if feed.status == FeedStatus::Active {
                    active.push((feed.last.bid, feed.last.ask, feed.weight));
                }
            } else {
                feed.stale_strikes = feed.stale_strikes.saturating_add(1);
                if feed.stale_strikes >= 2 {
                    feed.status = FeedStatus::Inactive;
                }
            }
        }

        if active.is_empty() {
            return None;
        }

        let total_weight: Decimal = active.iter().map(|(_, _, w)| *w).sum();
        let (bid, ask) = if total_weight.is_zero() {
            let n = Decimal::from(active.len() as u64);
            (
                active.iter().map(|(b, _, _)| *b).sum::<Decimal>() / n,
                active.iter().map(|(_, a, _)| *a).sum::<Decimal>() / n,
            )
        } else {
            (
                active.iter().map(|(b, _, w)| b * w).sum::<Decimal>() / total_weight,
                active.iter().map(|(_, a, w)| a * w).sum::<Decimal>() / total_weight,
            )
        };
        let mid = (bid + ask) / Decimal::from(2);

        let dispersion = if active.len() < 2 {
            0.0
        } else {
            let mids: Vec<f64> = active
                .iter()
                .map(|(b, a, _)| {
                    let m = (*b + *a) / Decimal::from(2);
                    m.to_string().parse::<f64>().unwrap_or(0.0)
                })
                .collect();
            let mean = mids.iter().sum::<f64>() / mids.len() as f64;
            let variance = mids.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / mids.len() as f64;
            let mid_f64 = mid.to_string().parse::<f64>().unwrap_or(1.0);
            if mid_f64 == 0.0 {
                0.0
            } else {
                variance.sqrt() / mid_f64 * 100.0
            }
        };

        let velocity = (st.tick_count as f64).sqrt();
        st.tick_count = 0;
        st.pending = 0;

        let history = st.history.as_slice();
        let analytics = self.analytics.recompute(&history);

        Some(IndexSnapshot {
            symbol: index_symbol.clone(),
            bid,
            ask,
            mid,
            vbid: total_weight,
            vask: total_weight,
            velocity,
            dispersion,
            ts_ms: now_ms,
            history,
            analytics,
        })
    }

    /// Walks all IndexSymbols in batches of `batch_size`, yielding between
    /// batches so the engine never monopolises the scheduler (§4.2).
    async fn publish_all(&mut self, now_ms: i64) {
        let symbols: Vec<IndexSymbol> = self.state.keys().cloned().collect();
        for batch in symbols.chunks(self.batch_size) {
            for index_symbol in batch {
                if let Some(snapshot) = self.compute_snapshot(index_symbol, now_ms) {
                    self.bus.publish(index_symbol, snapshot).await;
                } else {
                    warn!(%index_symbol, "no fresh source this window, skipping publish");
                }
            }
            tokio::task::yield_now().await;
        }
    }

    pub fn dropped_updates(&self) -> u64 {
        self.dropped_updates
    }

    pub async fn run(
        mut self,
        config: Arc<Config>,
        mut rx: mpsc::Receiver<SourceFeedUpdate>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut publish_timer = tokio::time::interval(std::time::Duration::from_millis(self.publish_interval_ms));
        loop {
            tokio::select! {
                maybe_update = rx.recv() => {
                    match maybe_update {
                        Some(update) => self.apply_update(&config, update),
                        None => return,
                    }
                }
                _ = publish_timer.tick() => {
                    self.publish_all(crate::time::now_ms()).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TickerConfig;
    use crate::index::analytics::WilderAnalytics;
    use crate::model::Tick;
    use rust_decimal_macros::dec;
    use std::collections::HashMap as Map;

    fn config_with_one_ticker() -> Config {
        let mut sources = Map::new();
        sources.insert(Symbol::new("binance", "spot", "ETHUSDT"), dec!(1));
        sources.insert(Symbol::new("okx", "spot", "ETHUSDT"), dec!(1));
        let mut tickers = Map::new();
        tickers.insert(
            IndexSymbol::new("ETHUSDT"),
            TickerConfig {
                tf_ms: 60_000,
                lookback: 50,
                sources,
            },
        );
        Config {
            tickers,
            ..Config::default()
        }
    }

    #[test]
    fn weighted_mid_between_two_active_sources() {
        let config = config_with_one_ticker();
        let bus = PriceBus::new();
        let mut engine = IndexEngine::new(&config, Arc::new(WilderAnalytics::default()), bus);

        let idx = IndexSymbol::new("ETHUSDT");
        engine.apply_update(
            &config,
            SourceFeedUpdate {
                symbol: Symbol::new("binance", "spot", "ETHUSDT"),
                tick: Tick::new(dec!(1999), dec!(2001), dec!(2000), dec!(1), 1000),
            },
        );
        engine.apply_update(
            &config,
            SourceFeedUpdate {
                symbol: Symbol::new("okx", "spot", "ETHUSDT"),
                tick: Tick::new(dec!(2001), dec!(2003), dec!(2002), dec!(1), 1000),
            },
        );

        let snap = engine.compute_snapshot(&idx, 1500).expect("snapshot available");
        assert!(snap.mid >= dec!(1999) && snap.mid <= dec!(2003));
        assert_eq!(snap.velocity, (2.0f64).sqrt());
    }

    #[test]
    fn stale_source_excluded_after_window() {
        let config = config_with_one_ticker();
        let bus = PriceBus::new();
        let mut engine = IndexEngine::new(&config, Arc::new(WilderAnalytics::default()), bus);
        let idx = IndexSymbol::new("ETHUSDT");

        engine.apply_update(
            &config,
            SourceFeedUpdate {
                symbol: Symbol::new("binance", "spot", "ETHUSDT"),
                tick: Tick::new(dec!(1999), dec!(2001), dec!(2000), dec!(1), 0),
            },
        );
        // Far beyond the freshness window: no fresh sources -> no snapshot.
        let snap = engine.compute_snapshot(&idx, 100_000);
        assert!(snap.is_none());
    }

    #[test]
    fn backpressure_drops_updates_past_cap() {
        let mut config = config_with_one_ticker();
        config.max_pending_per_symbol = 1;
        let bus = PriceBus::new();
        let mut engine = IndexEngine::new(&config, Arc::new(WilderAnalytics::default()), bus);

        for i in 0..5 {
            engine.apply_update(
                &config,
                SourceFeedUpdate {
                    symbol: Symbol::new("binance", "spot", "ETHUSDT"),
                    tick: Tick::new(dec!(2000), dec!(2001), dec!(2000), dec!(1), 1000 + i),
                },
            );
        }
        assert!(engine.dropped_updates() > 0);
    }
}
