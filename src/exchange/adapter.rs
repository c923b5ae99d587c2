//! `GenericRestWsConnector`: the one concrete `VenueConnector`, driven by a
//! `VenueProfile` rather than one hand-written struct per venue (§4.1
//! ambient addition). Streaming is attempted first when the profile carries
//! a `ws_url`; on any WS failure it falls back to batch REST polling for the
//! remainder of the run, matching §4.1 point 2.

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::model::{Symbol, Tick};

use super::backoff::Backoff;
use super::{SourceFeedUpdate, Subscription, VenueConnector, VenueProfile};

#[derive(Debug, Deserialize)]
struct TickerRow {
    symbol: String,
    bid: Decimal,
    ask: Decimal,
    last: Decimal,
    #[serde(default)]
    volume: Decimal,
}

pub struct GenericRestWsConnector {
    profile: VenueProfile,
    client: reqwest::Client,
}

impl GenericRestWsConnector {
    pub fn new(profile: VenueProfile) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(profile.request_timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { profile, client }
    }

    /// §4.1 point 4: enumerate supported markets before the run loop
    /// starts, retrying up to 3 times with backoff before surfacing a
    /// venue-fatal error.
    async fn load_markets(&self, symbols: &[Symbol]) -> anyhow::Result<()> {
        let mut backoff = Backoff::new(1000, 30_000);
        let mut last_err = None;
        for attempt in 0..3 {
            match self.client.get(&self.profile.rest_base_url).send().await {
                Ok(resp) if resp.status().is_success() || resp.status().is_client_error() => {
                    debug!(venue = %self.profile.venue, attempt, "market catalog reachable");
                    return Ok(());
                }
                Ok(resp) => {
                    last_err = Some(TransportError::Server {
                        status: resp.status().as_u16(),
                        body: String::new(),
                    });
                }
                Err(e) => {
                    last_err = Some(TransportError::Connection(e.to_string()));
                }
            }
            tokio::time::sleep(backoff.next_delay()).await;
        }
        anyhow::bail!(
            "venue {} failed to load markets for {} symbols: {:?}",
            self.profile.venue,
            symbols.len(),
            last_err
        )
    }

    async fn poll_once(
        &self,
        symbols: &[Symbol],
        out: &mpsc::Sender<SourceFeedUpdate>,
    ) -> Result<(), TransportError> {
        let resp = self
            .client
            .get(&self.profile.rest_base_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(Duration::from_millis(self.profile.request_timeout_ms))
                } else {
                    TransportError::Connection(e.to_string())
                }
            })?;

        if resp.status().as_u16() == 429 {
            let retry_after_ms = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            return Err(TransportError::Throttled { retry_after_ms });
        }
        if resp.status().is_server_error() {
            return Err(TransportError::Server {
                status: resp.status().as_u16(),
                body: String::new(),
            });
        }

        let rows: Vec<TickerRow> = resp
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        let wanted: HashMap<&str, &Symbol> =
            symbols.iter().map(|s| (s.as_str(), s)).collect();
        let now = crate::time::now_ms();
        for row in rows {
            if let Some(symbol) = wanted.get(row.symbol.as_str()) {
                let tick = Tick::new(row.bid, row.ask, row.last, row.volume, now);
                if !tick.is_valid() {
                    continue;
                }
                let _ = out
                    .send(SourceFeedUpdate {
                        symbol: (*symbol).clone(),
                        tick,
                    })
                    .await;
            }
        }
        Ok(())
    }

    async fn run_rest_poll(
        &self,
        symbols: Vec<Symbol>,
        out: mpsc::Sender<SourceFeedUpdate>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut backoff = Backoff::new(1000, 30_000);
        let mut interval = tokio::time::interval(Duration::from_millis(self.profile.poll_interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.poll_once(&symbols, &out).await {
                        Ok(()) => backoff.reset(),
                        Err(e) => {
                            warn!(venue = %self.profile.venue, error = %e, "poll failed, backing off");
                            let delay = backoff.next_delay_or(e.retry_after_ms());
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(venue = %self.profile.venue, "shutting down REST poll loop");
                        return;
                    }
                }
            }
        }
    }

    async fn run_ws(
        &self,
        ws_url: &str,
        symbols: &[Symbol],
        out: &mpsc::Sender<SourceFeedUpdate>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let connect = tokio::time::timeout(Duration::from_secs(10), connect_async(ws_url)).await;
        let (ws, _resp) = match connect {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => anyhow::bail!("ws connect error: {e}"),
            Err(_) => anyhow::bail!("ws connect timeout"),
        };
        let (mut write, mut read) = ws.split();
        let subscribe = serde_json::json!({
            "type": "subscribe",
            "symbols": symbols.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        });
        write.send(Message::Text(subscribe.to_string())).await?;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(row) = serde_json::from_str::<TickerRow>(&text) {
                                if let Some(symbol) = symbols.iter().find(|s| s.as_str() == row.symbol) {
                                    let tick = Tick::new(row.bid, row.ask, row.last, row.volume, crate::time::now_ms());
                                    if tick.is_valid() {
                                        let _ = out.send(SourceFeedUpdate { symbol: symbol.clone(), tick }).await;
                                    }
                                }
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => anyhow::bail!("ws read error: {e}"),
                        None => anyhow::bail!("ws stream closed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl VenueConnector for GenericRestWsConnector {
    async fn run(
        &self,
        subscriptions: Vec<Subscription>,
        out: mpsc::Sender<SourceFeedUpdate>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let symbols: Vec<Symbol> = subscriptions.into_iter().map(|s| s.symbol).collect();
        self.load_markets(&symbols).await?;

        if let Some(ws_url) = self.profile.ws_url.clone() {
            let mut backoff = Backoff::new(1000, 30_000);
            loop {
                if *shutdown.borrow() {
                    return Ok(());
                }
                match self.run_ws(&ws_url, &symbols, &out, &mut shutdown).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        warn!(venue = %self.profile.venue, error = %e, "ws failed, falling back to REST poll");
                        tokio::time::sleep(backoff.next_delay()).await;
                        break;
                    }
                }
            }
        }

        self.run_rest_poll(symbols, out, shutdown).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_defaults_are_sane() {
        let p = VenueProfile::rest_only("binance", "https://example.invalid/tickers");
        assert_eq!(p.poll_interval_ms, 1000);
        assert!(p.ws_url.is_none());
    }
}
