use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Symbol;

/// One normalized listing row, as produced by a scrape cycle and before the
/// store has stamped it.
///
/// Numeric fields are independently nullable: a price that fails to parse
/// never blocks storing the change percentage, and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketQuote {
    pub symbol: Symbol,
    pub last_price: Option<f64>,
    /// Percentage points (2.35 means +2.35%), not a fraction.
    pub change_pct: Option<f64>,
    /// Raw volume token, thousand separators stripped, magnitude suffix kept
    /// verbatim ("1.2B"). Empty when the row carried no volume token.
    pub volume_text: String,
}

impl MarketQuote {
    pub fn new(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            last_price: None,
            change_pct: None,
            volume_text: String::new(),
        }
    }

    /// Stamp the quote with the store's write time.
    pub fn into_snapshot(self, updated_at: DateTime<Utc>) -> MarketSnapshotRow {
        MarketSnapshotRow {
            symbol: self.symbol,
            last_price: self.last_price,
            change_pct: self.change_pct,
            volume_text: self.volume_text,
            updated_at,
        }
    }
}

/// Latest observed state for one symbol, as held by the snapshot store.
///
/// `symbol` is the unique key: the store keeps at most one row per symbol and
/// every write replaces the whole row ("latest wins").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshotRow {
    pub symbol: Symbol,
    pub last_price: Option<f64>,
    pub change_pct: Option<f64>,
    pub volume_text: String,
    pub updated_at: DateTime<Utc>,
}

impl MarketSnapshotRow {
    /// Volume text with any embedded thousand separators removed.
    pub fn volume_display(&self) -> String {
        self.volume_text.replace(',', "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_creation() {
        let quote = MarketQuote::new("BTCUSDT");
        assert_eq!(quote.symbol, "BTCUSDT");
        assert!(quote.last_price.is_none());
        assert!(quote.change_pct.is_none());
        assert!(quote.volume_text.is_empty());
    }

    #[test]
    fn test_into_snapshot_keeps_fields() {
        let mut quote = MarketQuote::new("ETHUSDT");
        quote.last_price = Some(3120.5);
        quote.change_pct = Some(-1.25);
        quote.volume_text = "845.3M".to_string();

        let now = Utc::now();
        let row = quote.into_snapshot(now);

        assert_eq!(row.symbol, "ETHUSDT");
        assert_eq!(row.last_price, Some(3120.5));
        assert_eq!(row.change_pct, Some(-1.25));
        assert_eq!(row.volume_text, "845.3M");
        assert_eq!(row.updated_at, now);
    }

    #[test]
    fn test_serializes_camel_case() {
        let row = MarketQuote {
            symbol: "BTCUSDT".to_string(),
            last_price: None,
            change_pct: Some(2.35),
            volume_text: "1.2B".to_string(),
        }
        .into_snapshot(Utc::now());

        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("lastPrice").unwrap().is_null());
        assert_eq!(json["changePct"], 2.35);
        assert_eq!(json["volumeText"], "1.2B");
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn test_volume_display_strips_separators() {
        let mut quote = MarketQuote::new("BNBUSDT");
        quote.volume_text = "1,234.5K".to_string();
        let row = quote.into_snapshot(Utc::now());
        assert_eq!(row.volume_display(), "1234.5K");
    }
}
