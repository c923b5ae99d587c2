//! Price Bus: topic pub/sub over `IndexSnapshot`, keyed by `IndexSymbol`
//! (§4.3). In-process subscribers (Watcher supervisors) attach directly via
//! a `Subscription` handle backed by a bounded drop-oldest queue; the wire
//! protocol's `WireSubscriber` is the external fan-out path, implemented
//! only up to producing the outbound JSON frame (the WebSocket accept loop
//! itself is the out-of-scope HTTP surface named in §1).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{watch, Mutex as AsyncMutex, Notify};
use tracing::debug;

use crate::model::{IndexSnapshot, IndexSymbol};

const DEFAULT_QUEUE_CAP: usize = 32;
const CLIENT_PING_INTERVAL: Duration = Duration::from_secs(25);
const SERVER_LIVENESS_TIMEOUT: Duration = Duration::from_secs(30);
const HIGH_WATER_MARK: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicFilter {
    Exact(IndexSymbol),
    All,
}

impl TopicFilter {
    /// Parses the wire subscribe payload's `topic` field: `prices.*` is the
    /// all-symbols wildcard, `prices.<IndexSymbol>` is exact (§4.3, §6).
    pub fn parse(topic: &str) -> Option<Self> {
        let rest = topic.strip_prefix("prices.")?;
        if rest == "*" {
            Some(TopicFilter::All)
        } else {
            IndexSymbol::parse(rest).map(TopicFilter::Exact)
        }
    }

    fn matches(&self, symbol: &IndexSymbol) -> bool {
        match self {
            TopicFilter::All => true,
            TopicFilter::Exact(s) => s == symbol,
        }
    }
}

struct Inbox {
    queue: AsyncMutex<VecDeque<IndexSnapshot>>,
    notify: Notify,
    cap: usize,
}

impl Inbox {
    fn new(cap: usize) -> Self {
        Self {
            queue: AsyncMutex::new(VecDeque::with_capacity(cap)),
            notify: Notify::new(),
            cap,
        }
    }

    async fn push(&self, snapshot: IndexSnapshot) {
        let mut q = self.queue.lock().await;
        if q.len() >= self.cap {
            q.pop_front();
        }
        q.push_back(snapshot);
        drop(q);
        self.notify.notify_one();
    }

    async fn pop(&self) -> Option<IndexSnapshot> {
        self.queue.lock().await.pop_front()
    }
}

struct SubscriberEntry {
    filter: TopicFilter,
    inbox: Arc<Inbox>,
    connected_since: Instant,
    last_ping: Instant,
}

type SubscriberId = u64;

pub struct PriceBus {
    subscribers: AsyncMutex<HashMap<SubscriberId, SubscriberEntry>>,
    next_id: AtomicU64,
}

impl PriceBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: AsyncMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn subscribe(self: &Arc<Self>, filter: TopicFilter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let inbox = Arc::new(Inbox::new(DEFAULT_QUEUE_CAP));
        let now = Instant::now();
        self.subscribers.lock().await.insert(
            id,
            SubscriberEntry {
                filter,
                inbox: inbox.clone(),
                connected_since: now,
                last_ping: now,
            },
        );
        Subscription {
            id,
            bus: self.clone(),
            inbox,
        }
    }

    async fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.lock().await.remove(&id);
    }

    async fn touch_ping(&self, id: SubscriberId) {
        if let Some(entry) = self.subscribers.lock().await.get_mut(&id) {
            entry.last_ping = Instant::now();
        }
    }

    /// Publishes a snapshot to every subscriber whose filter matches,
    /// dropping the oldest pending entry per subscriber on overflow.
    pub async fn publish(&self, symbol: &IndexSymbol, snapshot: IndexSnapshot) {
        let subs = self.subscribers.lock().await;
        for entry in subs.values() {
            if entry.filter.matches(symbol) {
                entry.inbox.push(snapshot.clone()).await;
            }
        }
    }

    /// Drops subscribers that missed the server-side liveness timeout or
    /// exceeded the connection high-water-mark (§4.3 safety valve).
    pub async fn reap(&self) {
        let now = Instant::now();
        let mut subs = self.subscribers.lock().await;
        let stale: Vec<SubscriberId> = subs
            .iter()
            .filter(|(_, e)| {
                now.duration_since(e.last_ping) > SERVER_LIVENESS_TIMEOUT
                    || now.duration_since(e.connected_since) > HIGH_WATER_MARK
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            debug!(subscriber_id = id, "reaping stale price bus subscriber");
            subs.remove(id);
        }
    }

    pub fn spawn_reaper(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let bus = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            loop {
                tokio::select! {
                    _ = interval.tick() => bus.reap().await,
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            }
        });
    }
}

/// In-process subscriber handle (ambient addition, §4.3). Watcher
/// supervisors hold one of these directly — no serialization overhead.
pub struct Subscription {
    id: SubscriberId,
    bus: Arc<PriceBus>,
    inbox: Arc<Inbox>,
}

impl Subscription {
    pub async fn recv(&self) -> IndexSnapshot {
        loop {
            if let Some(s) = self.inbox.pop().await {
                return s;
            }
            self.inbox.notify.notified().await;
        }
    }

    /// Resets this subscriber's liveness clock (client ping cadence is
    /// `CLIENT_PING_INTERVAL`; callers drive their own ping loop).
    pub async fn ping(&self) {
        self.bus.touch_ping(self.id).await;
    }

    pub fn client_ping_interval() -> Duration {
        CLIENT_PING_INTERVAL
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let bus = self.bus.clone();
        let id = self.id;
        tokio::spawn(async move {
            bus.unsubscribe(id).await;
        });
    }
}

/// External fan-out wire frame (§6): `{topic, data}`. `WireSubscriber`
/// serializes an `IndexSnapshot` up to these bytes; the transport that
/// would carry them to a browser is the out-of-scope HTTP surface named in
/// §1.
#[derive(Debug, Serialize)]
pub struct WireFrame<'a> {
    pub topic: String,
    pub data: &'a IndexSnapshotWire,
}

/// Wire-shaped projection of `IndexSnapshot` (Decimal/float fields only;
/// `history`/`analytics` are summarized, not dumped raw).
#[derive(Debug, Serialize)]
pub struct IndexSnapshotWire {
    pub bid: String,
    pub ask: String,
    pub mid: String,
    pub velocity: f64,
    pub dispersion: f64,
    pub ts_ms: i64,
}

impl From<&IndexSnapshot> for IndexSnapshotWire {
    fn from(s: &IndexSnapshot) -> Self {
        Self {
            bid: s.bid.to_string(),
            ask: s.ask.to_string(),
            mid: s.mid.to_string(),
            velocity: s.velocity,
            dispersion: s.dispersion,
            ts_ms: s.ts_ms,
        }
    }
}

pub struct WireSubscriber;

impl WireSubscriber {
    /// Produces the outbound frame bytes for one publish (§4.3 ambient
    /// addition). Stops at serialization; no socket write happens here.
    pub fn frame_bytes(symbol: &IndexSymbol, snapshot: &IndexSnapshot) -> serde_json::Result<Vec<u8>> {
        let wire = IndexSnapshotWire::from(snapshot);
        let frame = WireFrame {
            topic: symbol.topic(),
            data: &wire,
        };
        serde_json::to_vec(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(symbol: IndexSymbol, ts_ms: i64) -> IndexSnapshot {
        IndexSnapshot {
            symbol,
            bid: dec!(100),
            ask: dec!(101),
            mid: dec!(100.5),
            vbid: dec!(1),
            vask: dec!(1),
            velocity: 1.0,
            dispersion: 0.0,
            ts_ms,
            history: Vec::new(),
            analytics: Default::default(),
        }
    }

    #[test]
    fn topic_filter_parses_exact_and_wildcard() {
        assert_eq!(TopicFilter::parse("prices.*"), Some(TopicFilter::All));
        let sym = IndexSymbol::new("ETHUSDT");
        assert_eq!(
            TopicFilter::parse(&sym.topic()),
            Some(TopicFilter::Exact(sym))
        );
        assert_eq!(TopicFilter::parse("garbage"), None);
    }

    #[tokio::test]
    async fn exact_subscriber_only_receives_matching_topic() {
        let bus = PriceBus::new();
        let eth = IndexSymbol::new("ETHUSDT");
        let btc = IndexSymbol::new("BTCUSDT");
        let sub = bus.subscribe(TopicFilter::Exact(eth.clone())).await;

        bus.publish(&btc, snapshot(btc.clone(), 1)).await;
        bus.publish(&eth, snapshot(eth.clone(), 2)).await;

        let got = sub.recv().await;
        assert_eq!(got.ts_ms, 2);
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        let bus = PriceBus::new();
        let eth = IndexSymbol::new("ETHUSDT");
        let sub = bus.subscribe(TopicFilter::All).await;

        for i in 0..(DEFAULT_QUEUE_CAP as i64 + 5) {
            bus.publish(&eth, snapshot(eth.clone(), i)).await;
        }
        let first = sub.recv().await;
        assert_eq!(first.ts_ms, 5);
    }

    #[test]
    fn wire_frame_serializes_decimal_as_string() {
        let eth = IndexSymbol::new("ETHUSDT");
        let snap = snapshot(eth.clone(), 42);
        let bytes = WireSubscriber::frame_bytes(&eth, &snap).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"topic\":\"prices.agg:spot:ETHUSDT\""));
        assert!(text.contains("\"bid\":\"100\""));
    }
}
