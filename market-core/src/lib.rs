pub mod types;

// Re-export common types
pub use types::{canonical_symbol, ChangeDirection, MarketQuote, MarketSnapshotRow, RawRow, Symbol};
