//! Process configuration. Loaded once at startup and never mutated
//! afterward (§6: "immutable after load" is the only global singleton
//! discipline this crate allows besides the Order Store and Price Bus).
//!
//! File loading is an external collaborator (§1 Non-goals); this module only
//! defines the shape and the environment-override layer, matching the
//! teacher's `Config::from_env()` convention in `coordinator.rs`.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::model::{IndexSymbol, Symbol};

#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// OHLC bucket width in milliseconds.
    pub tf_ms: i64,
    pub lookback: usize,
    pub sources: HashMap<Symbol, Decimal>,
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub aggregator_address: String,
    pub proxy_address: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tickers: HashMap<IndexSymbol, TickerConfig>,
    pub publish_interval_ms: u64,
    pub pubsub_port: u16,
    pub api_port: u16,
    pub chains: HashMap<u64, ChainConfig>,
    pub protocol_api_key: String,
    pub protocol_base_url: String,
    pub poll_interval_ms: u64,
    pub storage_path: String,
    pub max_pending_per_symbol: usize,
    pub batch_size: usize,
    pub max_retries: u32,
    pub snapshot_every: u64,
    pub freshness_window_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tickers: HashMap::new(),
            publish_interval_ms: 1000,
            pubsub_port: 8900,
            api_port: 8080,
            chains: HashMap::new(),
            protocol_api_key: String::new(),
            protocol_base_url: String::new(),
            poll_interval_ms: 10_000,
            storage_path: "./data".to_string(),
            max_pending_per_symbol: 3,
            batch_size: 10,
            max_retries: 5,
            snapshot_every: 500,
            freshness_window_ms: 5_000,
        }
    }
}

impl Config {
    /// Applies environment overrides on top of a base config, e.g. one
    /// already loaded from a file by the external collaborator named in §1.
    /// Env always wins over file values (§6), matching the teacher's
    /// `from_env` layering pattern.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("KEEPER_PUBLISH_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                self.publish_interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("KEEPER_PUBSUB_PORT") {
            if let Ok(n) = v.parse() {
                self.pubsub_port = n;
            }
        }
        if let Ok(v) = std::env::var("KEEPER_API_PORT") {
            if let Ok(n) = v.parse() {
                self.api_port = n;
            }
        }
        if let Ok(v) = std::env::var("PROTOCOL_API_KEY") {
            self.protocol_api_key = v;
        }
        if let Ok(v) = std::env::var("PROTOCOL_BASE_URL") {
            self.protocol_base_url = v;
        }
        if let Ok(v) = std::env::var("KEEPER_POLL_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                self.poll_interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("KEEPER_STORAGE_PATH") {
            self.storage_path = v;
        }
        if let Ok(v) = std::env::var("KEEPER_MAX_PENDING_PER_SYMBOL") {
            if let Ok(n) = v.parse() {
                self.max_pending_per_symbol = n;
            }
        }
        if let Ok(v) = std::env::var("KEEPER_BATCH_SIZE") {
            if let Ok(n) = v.parse() {
                self.batch_size = n;
            }
        }
        if let Ok(v) = std::env::var("KEEPER_MAX_RETRIES") {
            if let Ok(n) = v.parse() {
                self.max_retries = n;
            }
        }
        for (key, value) in std::env::vars() {
            // KEEPER_CHAIN_<id>_RPC_URL style overrides, per §6's "RPC URLs"
            // environment-override clause.
            if let Some(rest) = key.strip_prefix("KEEPER_CHAIN_") {
                let mut parts = rest.splitn(2, '_');
                let (Some(id_str), Some(field)) = (parts.next(), parts.next()) else {
                    continue;
                };
                let Ok(id) = id_str.parse::<u64>() else {
                    continue;
                };
                let chain = self.chains.entry(id).or_insert_with(|| ChainConfig {
                    rpc_url: String::new(),
                    aggregator_address: String::new(),
                    proxy_address: String::new(),
                });
                match field {
                    "RPC_URL" => chain.rpc_url = value,
                    "AGGREGATOR_ADDRESS" => chain.aggregator_address = value,
                    "PROXY_ADDRESS" => chain.proxy_address = value,
                    _ => {}
                }
            }
        }
        self
    }

    /// Fails startup (exit code 1, §6) when the config is structurally
    /// unusable rather than merely empty.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_pending_per_symbol == 0 {
            return Err("max_pending_per_symbol must be > 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be > 0".to_string());
        }
        if self.storage_path.is_empty() {
            return Err("storage.path must not be empty".to_string());
        }
        Ok(())
    }
}
