use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::{MarketQuote, MarketSnapshotRow};
use parking_lot::RwLock;

use super::{SnapshotStore, StoreMode};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct CachedSnapshot {
    rows: Vec<MarketSnapshotRow>,
    updated_at: Option<DateTime<Utc>>,
}

/// Transient store: holds exactly the last cycle's rows.
///
/// Every upsert replaces the whole collection and its timestamp in one
/// write, so symbols missing from the latest cycle are evicted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cache: RwLock<CachedSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the last replacement, if any.
    #[cfg(test)]
    fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.cache.read().updated_at
    }
}

/// One quote per symbol: later duplicates overwrite earlier ones in place.
fn dedup_latest(quotes: &[MarketQuote]) -> Vec<MarketQuote> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(quotes.len());
    let mut unique: Vec<MarketQuote> = Vec::with_capacity(quotes.len());

    for quote in quotes {
        match positions.get(quote.symbol.as_str()) {
            Some(&idx) => unique[idx] = quote.clone(),
            None => {
                positions.insert(quote.symbol.as_str(), unique.len());
                unique.push(quote.clone());
            }
        }
    }

    unique
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Transient
    }

    async fn upsert(&self, quotes: &[MarketQuote]) -> Result<usize, StoreError> {
        if quotes.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let rows = dedup_latest(quotes)
            .into_iter()
            .map(|quote| quote.into_snapshot(now))
            .collect();

        *self.cache.write() = CachedSnapshot {
            rows,
            updated_at: Some(now),
        };

        tracing::debug!("Replaced in-memory snapshot with {} rows", quotes.len());
        Ok(quotes.len())
    }

    async fn read(&self, limit: usize) -> Result<Vec<MarketSnapshotRow>, StoreError> {
        let cache = self.cache.read();
        Ok(cache.rows.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, price: f64) -> MarketQuote {
        MarketQuote {
            symbol: symbol.to_string(),
            last_price: Some(price),
            change_pct: Some(1.0),
            volume_text: "10M".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_then_read() {
        let store = MemoryStore::new();
        let saved = store
            .upsert(&[quote("BTCUSDT", 67000.0), quote("ETHUSDT", 3100.0)])
            .await
            .unwrap();
        assert_eq!(saved, 2);

        let rows = store.read(50).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "BTCUSDT");
        assert_eq!(rows[1].symbol, "ETHUSDT");
        assert_eq!(Some(rows[0].updated_at), store.last_updated());
    }

    #[tokio::test]
    async fn test_second_write_wins() {
        let store = MemoryStore::new();
        store.upsert(&[quote("BTCUSDT", 67000.0)]).await.unwrap();
        store.upsert(&[quote("BTCUSDT", 68000.0)]).await.unwrap();

        let rows = store.read(50).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].last_price, Some(68000.0));
    }

    #[tokio::test]
    async fn test_smaller_cycle_evicts_missing_symbols() {
        let store = MemoryStore::new();
        store
            .upsert(&[quote("BTCUSDT", 1.0), quote("ETHUSDT", 2.0), quote("SOLUSDT", 3.0)])
            .await
            .unwrap();
        store.upsert(&[quote("ETHUSDT", 2.5)]).await.unwrap();

        let rows = store.read(50).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "ETHUSDT");
    }

    #[tokio::test]
    async fn test_duplicate_symbols_in_batch_collapse() {
        let store = MemoryStore::new();
        store
            .upsert(&[quote("BTCUSDT", 1.0), quote("ETHUSDT", 2.0), quote("BTCUSDT", 3.0)])
            .await
            .unwrap();

        let rows = store.read(50).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "BTCUSDT");
        assert_eq!(rows[0].last_price, Some(3.0));
    }

    #[tokio::test]
    async fn test_read_respects_limit() {
        let store = MemoryStore::new();
        let quotes: Vec<_> = (0..10).map(|i| quote(&format!("C{}USDT", i), i as f64)).collect();
        store.upsert(&quotes).await.unwrap();

        for limit in [0, 1, 5, 10, 11, 100] {
            let rows = store.read(limit).await.unwrap();
            assert_eq!(rows.len(), limit.min(10), "limit {}", limit);
        }
    }

    #[tokio::test]
    async fn test_empty_batch_leaves_cache_untouched() {
        let store = MemoryStore::new();
        store.upsert(&[quote("BTCUSDT", 1.0)]).await.unwrap();
        let before = store.last_updated();

        assert_eq!(store.upsert(&[]).await.unwrap(), 0);
        assert_eq!(store.last_updated(), before);
        assert_eq!(store.read(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_before_any_write_is_empty() {
        let store = MemoryStore::new();
        assert!(store.read(10).await.unwrap().is_empty());
        assert!(store.last_updated().is_none());
    }
}
