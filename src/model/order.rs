//! Advanced orders, their nine trigger-kind payloads, slice records, and the
//! append-only event stream that backs the Order Store.

use alloy_primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::symbol::IndexSymbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical hex-encoded protocol order hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SliceHash(pub String);

impl std::fmt::Display for SliceHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Active,
    PartiallyFilled,
    Filled,
    Cancelled,
    Expired,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Expired | OrderStatus::Failed
        )
    }
}

/// Slice direction, also used to pick the limit-price clamp side (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

// ─────────────────────────────────────────────────────────
// Order-kind params (§4.8)
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcaParams {
    pub interval_ms: i64,
    pub amount: Decimal,
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwapParams {
    pub start_ms: i64,
    pub end_ms: i64,
    pub interval_ms: i64,
    pub amount: Decimal,
    pub max_price: Option<Decimal>,
}

impl TwapParams {
    pub fn total_intervals(&self) -> u32 {
        let span = (self.end_ms - self.start_ms).max(0) as f64;
        (span / self.interval_ms as f64).ceil() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcebergParams {
    pub steps: u32,
    pub start_price: Decimal,
    pub end_price: Decimal,
    pub amount: Decimal,
    pub expiry_days: Option<f64>,
}

impl IcebergParams {
    /// `target(i) = start + (end-start)*(i+1)/steps`, `i` zero-indexed.
    pub fn target_price(&self, step_index: u32) -> Decimal {
        let frac = Decimal::from(step_index + 1) / Decimal::from(self.steps.max(1));
        self.start_price + (self.end_price - self.start_price) * frac
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeParams {
    pub steps: u32,
    pub start_price: Decimal,
    pub end_price: Decimal,
    pub amount: Decimal,
    pub expiry_days: Option<f64>,
}

impl RangeParams {
    pub fn level_price(&self, step_index: u32) -> Decimal {
        let frac = Decimal::from(step_index + 1) / Decimal::from(self.steps.max(1));
        self.start_price + (self.end_price - self.start_price) * frac
    }

    pub fn is_ascending(&self) -> bool {
        self.end_price >= self.start_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    pub start_price: Decimal,
    pub end_price: Decimal,
    /// Step size as a percentage of the full range, e.g. `5` for 5%.
    pub step_pct: Decimal,
    pub amount: Decimal,
}

impl GridParams {
    pub fn step_size(&self) -> Decimal {
        (self.end_price - self.start_price) * self.step_pct / Decimal::from(100)
    }

    pub fn total_levels(&self) -> u32 {
        let step = self.step_size();
        if step <= Decimal::ZERO {
            return 1;
        }
        let levels = (self.end_price - self.start_price) / step;
        levels
            .to_string()
            .parse::<f64>()
            .map(|f| f.floor() as u32 + 1)
            .unwrap_or(1)
            .max(1)
    }

    pub fn level_of(&self, mid: Decimal) -> i64 {
        let step = self.step_size();
        if step <= Decimal::ZERO {
            return 0;
        }
        let raw = (mid - self.start_price) / step;
        raw.to_string()
            .parse::<f64>()
            .map(|f| f.floor() as i64)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLimitParams {
    pub stop_price: Decimal,
    pub limit_price: Decimal,
    pub expiry_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaseLimitParams {
    pub distance_pct: Decimal,
    pub expiry_days: Option<f64>,
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBreakoutParams {
    pub adx_threshold: f64,
    pub adxma_period: usize,
    pub breakout_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumReversalParams {
    pub rsi_period: usize,
    pub rsima_period: usize,
    pub amount: Decimal,
}

/// Tagged variant over the nine advanced-order types. The string `kind` tag
/// used on the wire maps 1:1 to these variant names (lowercase, see
/// `OrderKind::tag`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum OrderKind {
    Dca(DcaParams),
    Twap(TwapParams),
    Iceberg(IcebergParams),
    Range(RangeParams),
    Grid(GridParams),
    StopLimit(StopLimitParams),
    ChaseLimit(ChaseLimitParams),
    RangeBreakout(RangeBreakoutParams),
    MomentumReversal(MomentumReversalParams),
}

impl OrderKind {
    pub fn tag(&self) -> &'static str {
        match self {
            OrderKind::Dca(_) => "dca",
            OrderKind::Twap(_) => "twap",
            OrderKind::Iceberg(_) => "iceberg",
            OrderKind::Range(_) => "range",
            OrderKind::Grid(_) => "grid",
            OrderKind::StopLimit(_) => "stop_limit",
            OrderKind::ChaseLimit(_) => "chase_limit",
            OrderKind::RangeBreakout(_) => "range_breakout",
            OrderKind::MomentumReversal(_) => "momentum_reversal",
        }
    }

    /// `planned_slices(kind, params)`, where defined (§3 invariant). `None`
    /// for kinds that trigger indefinitely until expiry/cancellation.
    pub fn planned_slices(&self) -> Option<u32> {
        match self {
            OrderKind::Dca(_) => None,
            OrderKind::Twap(p) => Some(p.total_intervals()),
            OrderKind::Iceberg(p) => Some(p.steps),
            OrderKind::Range(p) => Some(p.steps),
            OrderKind::Grid(p) => Some(p.total_levels()),
            OrderKind::StopLimit(_) => Some(1),
            OrderKind::ChaseLimit(_) => None,
            OrderKind::RangeBreakout(_) => Some(1),
            OrderKind::MomentumReversal(_) => None,
        }
    }

    /// Days-since-`created_ms` expiry, where the kind carries one. Kinds
    /// without an `expiry?` field in §4.8's table never expire on time.
    pub fn expiry_days(&self) -> Option<f64> {
        match self {
            OrderKind::Iceberg(p) => p.expiry_days,
            OrderKind::Range(p) => p.expiry_days,
            OrderKind::StopLimit(p) => p.expiry_days,
            OrderKind::ChaseLimit(p) => p.expiry_days,
            OrderKind::Dca(_)
            | OrderKind::Twap(_)
            | OrderKind::Grid(_)
            | OrderKind::RangeBreakout(_)
            | OrderKind::MomentumReversal(_) => None,
        }
    }
}

/// Polymorphic scheduling cursor. Time-driven kinds store a deadline;
/// price-driven kinds store the next level to cross; Grid carries its own
/// small state machine; `Done` marks an exhausted schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NextTrigger {
    Time(i64),
    Price(Decimal),
    Grid {
        last_level: i64,
        buy_levels: u32,
        sell_levels: u32,
    },
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedOrder {
    pub id: OrderId,
    pub owner: Address,
    pub maker_asset: Address,
    pub taker_asset: Address,
    /// Which published IndexSnapshot this order's handler reads (§4.5 step
    /// 3). Resolved once at construction from the maker/taker asset pair.
    pub index_symbol: IndexSymbol,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub created_ms: i64,
    pub trigger_count: u32,
    pub original_making: Decimal,
    pub total_filled: Decimal,
    pub remaining_maker: Decimal,
    pub next_trigger: NextTrigger,
    pub slice_hashes: Vec<SliceHash>,
    pub last_error: Option<String>,
}

impl AdvancedOrder {
    pub fn new(
        owner: Address,
        maker_asset: Address,
        taker_asset: Address,
        index_symbol: IndexSymbol,
        kind: OrderKind,
        amount_hint: Decimal,
        created_ms: i64,
        next_trigger: NextTrigger,
    ) -> Self {
        Self {
            id: OrderId::new(),
            owner,
            maker_asset,
            taker_asset,
            index_symbol,
            kind,
            status: OrderStatus::Pending,
            created_ms,
            trigger_count: 0,
            original_making: amount_hint,
            total_filled: Decimal::ZERO,
            remaining_maker: amount_hint,
            next_trigger,
            slice_hashes: Vec::new(),
            last_error: None,
        }
    }

    /// `params.expiry` days past `created_ms`; `expiry_days=0`/`None` means
    /// the order never expires on time.
    pub fn is_expired(&self, now_ms: i64, expiry_days: Option<f64>) -> bool {
        match expiry_days {
            None => false,
            Some(days) if days <= 0.0 => false,
            Some(days) => {
                let expiry_ms = self.created_ms + (days * 86_400_000.0) as i64;
                now_ms >= expiry_ms
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvalidReason {
    Removed,
    Rejected(String),
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceRecord {
    pub hash: SliceHash,
    pub parent_id: OrderId,
    pub side: Side,
    pub making: Decimal,
    pub taking: Decimal,
    pub limit_price: Decimal,
    pub submitted_ms: i64,
    pub remaining: Decimal,
    pub invalid_reason: Option<InvalidReason>,
    /// Consecutive polls in which this hash was absent from the protocol
    /// API response (§4.7 point 3: two consecutive absences => removed).
    pub missed_polls: u32,
}

impl SliceRecord {
    pub fn new(
        hash: SliceHash,
        parent_id: OrderId,
        side: Side,
        making: Decimal,
        taking: Decimal,
        limit_price: Decimal,
        submitted_ms: i64,
    ) -> Self {
        Self {
            hash,
            parent_id,
            side,
            making,
            taking,
            limit_price,
            submitted_ms,
            remaining: making,
            invalid_reason: None,
            missed_polls: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.invalid_reason.is_some() || self.remaining <= Decimal::ZERO
    }
}

/// Append-only audit entry. Replaying every event for a parent, in order,
/// reconstructs its `AdvancedOrder` projection (event-sourcing property,
/// §8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub parent_id: OrderId,
    pub ts_ms: i64,
    pub kind: OrderEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEventKind {
    Created {
        owner: Address,
        maker_asset: Address,
        taker_asset: Address,
        index_symbol: IndexSymbol,
        kind: OrderKind,
        amount: Decimal,
        next_trigger: NextTrigger,
    },
    SliceSubmitted {
        hash: SliceHash,
        making: Decimal,
    },
    SliceFailed {
        reason: String,
    },
    Filled,
    PartiallyFilled {
        delta: Decimal,
    },
    Expired,
    Cancelled,
    Failed {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn twap_total_intervals_ceils() {
        let p = TwapParams {
            start_ms: 0,
            end_ms: 600_000,
            interval_ms: 60_000,
            amount: dec!(60),
            max_price: None,
        };
        assert_eq!(p.total_intervals(), 10);
    }

    #[test]
    fn iceberg_target_price_interpolates() {
        let p = IcebergParams {
            steps: 4,
            start_price: dec!(1900),
            end_price: dec!(2100),
            amount: dec!(100),
            expiry_days: None,
        };
        assert_eq!(p.target_price(0), dec!(1950));
        assert_eq!(p.target_price(3), dec!(2100));
    }

    #[test]
    fn grid_step_size_and_levels() {
        let p = GridParams {
            start_price: dec!(1900),
            end_price: dec!(2100),
            step_pct: dec!(5),
            amount: dec!(100),
        };
        assert_eq!(p.step_size(), dec!(10));
        assert_eq!(p.total_levels(), 21);
        assert_eq!(p.level_of(dec!(1905)), 0);
        assert_eq!(p.level_of(dec!(1915)), 1);
        assert_eq!(p.level_of(dec!(1925)), 2);
    }

    #[test]
    fn expiry_disabled_never_expires() {
        let order = AdvancedOrder::new(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            IndexSymbol::new("ETHUSDT"),
            OrderKind::StopLimit(StopLimitParams {
                stop_price: dec!(1),
                limit_price: dec!(1),
                expiry_days: None,
            }),
            dec!(1),
            0,
            NextTrigger::Price(dec!(1)),
        );
        assert!(!order.is_expired(i64::MAX, None));
        assert!(!order.is_expired(i64::MAX, Some(0.0)));
    }

    #[test]
    fn expiry_fires_at_exact_boundary() {
        let order = AdvancedOrder::new(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            IndexSymbol::new("ETHUSDT"),
            OrderKind::StopLimit(StopLimitParams {
                stop_price: dec!(1),
                limit_price: dec!(1),
                expiry_days: Some(1.0),
            }),
            dec!(1),
            0,
            NextTrigger::Price(dec!(1)),
        );
        let boundary = 86_400_000;
        assert!(!order.is_expired(boundary - 1, Some(1.0)));
        assert!(order.is_expired(boundary, Some(1.0)));
    }
}
