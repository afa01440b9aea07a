//! Tracked symbol definitions.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A trading pair being watched: a short display name mapped to the
/// exchange instrument id (unified `BASE/QUOTE[:SETTLE]` form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedSymbol {
    /// Display name (e.g., "ADA")
    pub name: CompactString,
    /// Instrument id (e.g., "ADA/USDT:USDT")
    pub instrument: CompactString,
}

impl TrackedSymbol {
    pub fn new(name: &str, instrument: &str) -> Self {
        Self {
            name: CompactString::new(name),
            instrument: CompactString::new(instrument),
        }
    }

    /// Pair label without the settlement suffix ("ADA/USDT:USDT" -> "ADA/USDT").
    pub fn pair_label(&self) -> &str {
        pair_label(&self.instrument)
    }
}

/// Strip the settlement currency from a unified instrument id.
pub fn pair_label(instrument: &str) -> &str {
    instrument.split(':').next().unwrap_or(instrument)
}

/// Ordered set of tracked symbols. Order drives keyboard layout and pass order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolSet(Vec<TrackedSymbol>);

impl Default for SymbolSet {
    fn default() -> Self {
        Self(vec![
            TrackedSymbol::new("ADA", "ADA/USDT:USDT"),
            TrackedSymbol::new("ETH", "ETH/USDT:USDT"),
            TrackedSymbol::new("SUI", "SUI/USDT:USDT"),
            TrackedSymbol::new("INJ", "INJ/USDT:USDT"),
        ])
    }
}

impl SymbolSet {
    pub fn new(symbols: Vec<TrackedSymbol>) -> Self {
        Self(symbols)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedSymbol> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Find a symbol by display name (case-insensitive).
    pub fn by_name(&self, name: &str) -> Option<&TrackedSymbol> {
        self.0.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Find a symbol by instrument id.
    pub fn by_instrument(&self, instrument: &str) -> Option<&TrackedSymbol> {
        self.0.iter().find(|s| s.instrument == instrument)
    }

    /// Returns the first display name that appears more than once, if any.
    pub fn first_duplicate(&self) -> Option<&str> {
        self.0.iter().enumerate().find_map(|(i, s)| {
            self.0[..i]
                .iter()
                .any(|prev| prev.name.eq_ignore_ascii_case(&s.name) || prev.instrument == s.instrument)
                .then_some(s.name.as_str())
        })
    }
}

impl<'a> IntoIterator for &'a SymbolSet {
    type Item = &'a TrackedSymbol;
    type IntoIter = std::slice::Iter<'a, TrackedSymbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
