//! Core domain types: symbols, ticks/OHLC, published snapshots, and advanced
//! orders with their event stream.

pub mod order;
pub mod snapshot;
pub mod symbol;
pub mod tick;

pub use order::{
    AdvancedOrder, ChaseLimitParams, DcaParams, GridParams, IcebergParams, InvalidReason,
    MomentumReversalParams, NextTrigger, OrderEvent, OrderEventKind, OrderId, OrderKind,
    OrderStatus, RangeBreakoutParams, RangeParams, Side, SliceHash, SliceRecord, StopLimitParams,
    TwapParams,
};
pub use snapshot::{AnalyticsBlock, IndexSnapshot};
pub use symbol::{IndexSymbol, Symbol, INDEX_SYMBOL_PREFIX};
pub use tick::{FeedStatus, Ohlc, OhlcHistory, SourceFeed, Tick};
