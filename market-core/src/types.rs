pub mod market_snapshot;
pub mod raw_row;

// Re-export common types
pub use market_snapshot::{MarketQuote, MarketSnapshotRow};
pub use raw_row::{ChangeDirection, RawRow};

/// Spot market symbol (e.g., "BTCUSDT", "ETHUSDT")
pub type Symbol = String;

/// Canonical form of a symbol: separators (`_`, `-`, `/`) and whitespace
/// removed, upper-cased. Returns an empty string when nothing is left.
pub fn canonical_symbol(raw: &str) -> Symbol {
    raw.chars()
        .filter(|c| !matches!(c, '_' | '-' | '/') && !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}
