//! Symbol identifiers: `venue:market:pair` source symbols and
//! `agg:spot:<pair>`-prefixed index symbols that aggregate one or more of
//! them.

use std::fmt;
use serde::{Deserialize, Serialize};

/// Opaque composite identifier for a single venue's market, e.g.
/// `binance:spot:ETHUSDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(venue: &str, market: &str, pair: &str) -> Self {
        Self(format!("{venue}:{market}:{pair}"))
    }

    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let parts: Vec<&str> = raw.splitn(3, ':').collect();
        if parts.len() == 3 && parts.iter().all(|p| !p.is_empty()) {
            Some(Self(raw))
        } else {
            None
        }
    }

    pub fn venue(&self) -> &str {
        self.0.splitn(3, ':').next().unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An aggregated logical market, e.g. `agg:spot:ETHUSDT`. Carries the set of
/// source `Symbol`s it is computed from; the Index Engine resolves those via
/// configuration (`tickers` map), not by parsing this string further.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexSymbol(String);

pub const INDEX_SYMBOL_PREFIX: &str = "agg:spot:";

impl IndexSymbol {
    pub fn new(pair: &str) -> Self {
        Self(format!("{INDEX_SYMBOL_PREFIX}{pair}"))
    }

    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.starts_with(INDEX_SYMBOL_PREFIX) {
            Some(Self(raw))
        } else {
            None
        }
    }

    pub fn pair(&self) -> &str {
        self.0.strip_prefix(INDEX_SYMBOL_PREFIX).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wire topic for this symbol on the Price Bus (`prices.<IndexSymbol>`).
    pub fn topic(&self) -> String {
        format!("prices.{}", self.0)
    }
}

impl fmt::Display for IndexSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_parse_roundtrip() {
        let s = Symbol::new("binance", "spot", "ETHUSDT");
        assert_eq!(s.as_str(), "binance:spot:ETHUSDT");
        assert_eq!(s.venue(), "binance");
        assert_eq!(Symbol::parse("binance:spot:ETHUSDT"), Some(s));
    }

    #[test]
    fn symbol_parse_rejects_malformed() {
        assert_eq!(Symbol::parse("binance:ETHUSDT"), None);
        assert_eq!(Symbol::parse("binance::ETHUSDT"), None);
    }

    #[test]
    fn index_symbol_prefix_and_topic() {
        let i = IndexSymbol::new("ETHUSDT");
        assert_eq!(i.as_str(), "agg:spot:ETHUSDT");
        assert_eq!(i.pair(), "ETHUSDT");
        assert_eq!(i.topic(), "prices.agg:spot:ETHUSDT");
    }
}
