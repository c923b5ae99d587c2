//! Process wiring: constructs every long-running component from `Config`
//! and runs them to completion under one shutdown signal, matching the
//! teacher's per-task `tokio::spawn` + `watch::channel` shutdown shape in
//! `polymarket/coordinator.rs` and `bin/polymarket_mm.rs`.

use std::sync::Arc;

use alloy_primitives::Address;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::bus::PriceBus;
use crate::config::Config;
use crate::error::StoreError;
use crate::exchange::adapter::GenericRestWsConnector;
use crate::exchange::{Subscription, VenueConnector, VenueProfile};
use crate::execution::{ProtocolClient, ProtocolClientConfig, SliceMonitor, SliceSubmitter};
use crate::index::analytics::WilderAnalytics;
use crate::index::IndexEngine;
use crate::store::JournaledOrderStore;
use crate::watcher::{CachedPriceSource, WatcherRegistry};

/// One venue task per distinct `venue` prefix found across configured
/// ticker sources, each driving a `GenericRestWsConnector` (§4.1).
fn venue_subscriptions(config: &Config) -> std::collections::HashMap<String, Vec<Subscription>> {
    let mut by_venue: std::collections::HashMap<String, Vec<Subscription>> = std::collections::HashMap::new();
    for ticker in config.tickers.values() {
        for (symbol, weight) in &ticker.sources {
            by_venue
                .entry(symbol.venue().to_string())
                .or_default()
                .push(Subscription {
                    symbol: symbol.clone(),
                    weight: *weight,
                });
        }
    }
    by_venue
}

/// Resolves the first configured chain's proxy address, per §6 ("the
/// keeper signs against a single delegate-proxy per process"). Returns the
/// zero address (meaning "no proxy, submit as plain EOA orders") when no
/// chain is configured.
fn resolve_proxy_address(config: &Config) -> Address {
    let Some(chain) = config.chains.values().next() else {
        warn!("no chain configured, submitting without a delegate proxy");
        return Address::ZERO;
    };
    if chain.proxy_address.is_empty() {
        return Address::ZERO;
    }
    chain
        .proxy_address
        .parse()
        .unwrap_or_else(|e| {
            warn!(error = %e, raw = %chain.proxy_address, "invalid proxy_address, falling back to zero address");
            Address::ZERO
        })
}

fn resolve_chain_id(config: &Config) -> u64 {
    config.chains.keys().next().copied().unwrap_or(1)
}

/// Top-level handle: owns every shared singleton (§6's "Order Store and
/// Price Bus are the only global singletons") and the spawned task set.
pub struct App {
    config: Arc<Config>,
    store: Arc<JournaledOrderStore>,
    bus: Arc<PriceBus>,
    prices: Arc<CachedPriceSource>,
    registry: Arc<WatcherRegistry>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl App {
    pub async fn build(config: Config) -> Result<Self, StoreError> {
        let config = Arc::new(config);
        let store = Arc::new(JournaledOrderStore::open(config.storage_path.clone(), config.snapshot_every).await?);
        let bus = PriceBus::new();

        let via_proxy = config.chains.values().any(|c| !c.proxy_address.is_empty());
        let protocol_client = ProtocolClient::new(ProtocolClientConfig {
            base_url: config.protocol_base_url.clone(),
            api_key: config.protocol_api_key.clone(),
            chain_id: resolve_chain_id(&config),
        });
        let proxy_address = resolve_proxy_address(&config);
        let submitter = Arc::new(SliceSubmitter::new(protocol_client, proxy_address, config.max_retries));

        let prices = CachedPriceSource::new();
        let registry = Arc::new(WatcherRegistry::new(
            store.clone(),
            prices.clone() as Arc<dyn crate::watcher::PriceSnapshotSource>,
            submitter,
            via_proxy,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            store,
            bus,
            prices,
            registry,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Runs every component task to completion, cooperatively stopping them
    /// all on either a ctrl-c signal or an unrecoverable store error from
    /// the reaper loop (§6's exit code 2 path).
    pub async fn run(self) -> Result<(), StoreError> {
        info!(storage = %self.config.storage_path, "keeper starting");

        self.registry.reconstruct().await;

        let cache_handle = WatcherRegistry::spawn_price_cache(self.bus.clone(), self.prices.clone()).await;

        let (feed_tx, feed_rx) = mpsc::channel(1024);
        let mut venue_handles = Vec::new();
        for (venue, subs) in venue_subscriptions(&self.config) {
            let profile = VenueProfile::rest_only(venue.clone(), format!("https://{venue}.example/api/v3/ticker/24hr"));
            let connector = GenericRestWsConnector::new(profile);
            let out = feed_tx.clone();
            let shutdown = self.shutdown_rx.clone();
            let venue_label = venue.clone();
            venue_handles.push(tokio::spawn(async move {
                if let Err(e) = connector.run(subs, out, shutdown).await {
                    error!(venue = %venue_label, error = %e, "venue task stopped");
                }
            }));
        }
        drop(feed_tx);

        let analytics = Arc::new(WilderAnalytics::default());
        let engine = IndexEngine::new(&self.config, analytics, self.bus.clone());
        let engine_config = self.config.clone();
        let engine_shutdown = self.shutdown_rx.clone();
        let engine_handle = tokio::spawn(engine.run(engine_config, feed_rx, engine_shutdown));

        let monitor_client = ProtocolClient::new(ProtocolClientConfig {
            base_url: self.config.protocol_base_url.clone(),
            api_key: self.config.protocol_api_key.clone(),
            chain_id: resolve_chain_id(&self.config),
        });
        let monitor_makers = resolve_monitor_makers(&self.config);
        let monitor = SliceMonitor::new(monitor_client, self.store.clone(), self.config.poll_interval_ms, monitor_makers);
        let monitor_shutdown = self.shutdown_rx.clone();
        let monitor_handle = tokio::spawn(monitor.run(monitor_shutdown));

        let reaper_registry = self.registry.clone();
        let mut reaper_shutdown = self.shutdown_rx.clone();
        let reaper_handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = tick.tick() => reaper_registry.retire_terminal().await,
                    _ = reaper_shutdown.changed() => {
                        if *reaper_shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        let _ = tokio::signal::ctrl_c().await;
        info!("ctrl-c received, shutting down");
        let _ = self.shutdown_tx.send(true);

        for handle in venue_handles {
            let _ = handle.await;
        }
        let _ = engine_handle.await;
        let _ = monitor_handle.await;
        let _ = reaper_handle.await;
        cache_handle.abort();

        info!("keeper stopped");
        Ok(())
    }

    pub fn store(&self) -> Arc<JournaledOrderStore> {
        self.store.clone()
    }

    pub fn registry(&self) -> Arc<WatcherRegistry> {
        self.registry.clone()
    }
}

/// Which maker address(es) the Slice Monitor polls for (§4.7): every
/// configured chain's delegate proxy.
fn resolve_monitor_makers(config: &Config) -> Vec<Address> {
    config
        .chains
        .values()
        .filter(|c| !c.proxy_address.is_empty())
        .filter_map(|c| c.proxy_address.parse::<Address>().ok())
        .collect()
}
