use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::{MarketQuote, MarketSnapshotRow};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};

use super::{SnapshotStore, StoreMode};
use crate::error::StoreError;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS markets (
    symbol       TEXT PRIMARY KEY,
    last_price   DOUBLE PRECISION,
    change_pct   DOUBLE PRECISION,
    volume_text  TEXT,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const UPSERT_SQL: &str = r#"
INSERT INTO markets (symbol, last_price, change_pct, volume_text, updated_at)
VALUES ($1, $2, $3, $4, NOW())
ON CONFLICT (symbol) DO UPDATE SET
    last_price  = EXCLUDED.last_price,
    change_pct  = EXCLUDED.change_pct,
    volume_text = EXCLUDED.volume_text,
    updated_at  = NOW()
"#;

const SELECT_LATEST_SQL: &str = r#"
SELECT symbol, last_price, change_pct, volume_text, updated_at
FROM markets
ORDER BY updated_at DESC, symbol ASC
LIMIT $1
"#;

const MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRecord {
    symbol: String,
    last_price: Option<f64>,
    change_pct: Option<f64>,
    volume_text: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<SnapshotRecord> for MarketSnapshotRow {
    fn from(record: SnapshotRecord) -> Self {
        MarketSnapshotRow {
            symbol: record.symbol,
            last_price: record.last_price,
            change_pct: record.change_pct,
            volume_text: record.volume_text.unwrap_or_default(),
            updated_at: record.updated_at,
        }
    }
}

/// Durable store backed by the `markets` table.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Open a pool and establish the first connection.
    ///
    /// `require_tls` turns on TLS without certificate verification, which is
    /// what most hosted Postgres providers expect.
    pub async fn connect(
        database_url: &str,
        require_tls: bool,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let ssl_mode = if require_tls {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        };

        let options = PgConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Connect(format!("Invalid connection string: {}", e)))?
            .ssl_mode(ssl_mode);

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SnapshotStore for PostgresStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Durable
    }

    async fn upsert(&self, quotes: &[MarketQuote]) -> Result<usize, StoreError> {
        if quotes.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Transaction(format!("Failed to begin: {}", e)))?;

        for quote in quotes {
            let result = sqlx::query(UPSERT_SQL)
                .bind(&quote.symbol)
                .bind(quote.last_price)
                .bind(quote.change_pct)
                .bind(&quote.volume_text)
                .execute(&mut *tx)
                .await;

            if let Err(e) = result {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("Rollback failed: {}", rollback_err);
                }
                return Err(StoreError::Query(format!(
                    "Upsert of {} failed: {}",
                    quote.symbol, e
                )));
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Transaction(format!("Failed to commit: {}", e)))?;

        tracing::debug!("Upserted {} rows into markets", quotes.len());
        Ok(quotes.len())
    }

    async fn read(&self, limit: usize) -> Result<Vec<MarketSnapshotRow>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = sqlx::query_as::<_, SnapshotRecord>(SELECT_LATEST_SQL)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(records.into_iter().map(MarketSnapshotRow::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_with_null_volume_maps_to_empty() {
        let record = SnapshotRecord {
            symbol: "BTCUSDT".to_string(),
            last_price: Some(1.0),
            change_pct: None,
            volume_text: None,
            updated_at: Utc::now(),
        };
        let row = MarketSnapshotRow::from(record);
        assert_eq!(row.volume_text, "");
        assert!(row.change_pct.is_none());
    }

    #[tokio::test]
    async fn test_invalid_connection_string() {
        let result = PostgresStore::connect("not a url", false, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(StoreError::Connect(_))));
    }

    #[tokio::test]
    #[ignore] // Requires a running Postgres at DATABASE_URL
    async fn test_upsert_overwrites_by_symbol() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PostgresStore::connect(&url, false, Duration::from_secs(5))
            .await
            .unwrap();
        store.ensure_schema().await.unwrap();

        let mut quote = MarketQuote::new("ZZTESTUSDT");
        quote.last_price = Some(1.0);
        store.upsert(&[quote.clone()]).await.unwrap();
        quote.last_price = Some(2.0);
        store.upsert(&[quote]).await.unwrap();

        let rows = store.read(1000).await.unwrap();
        let matching: Vec<_> = rows.iter().filter(|r| r.symbol == "ZZTESTUSDT").collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].last_price, Some(2.0));

        sqlx::query("DELETE FROM markets WHERE symbol = 'ZZTESTUSDT'")
            .execute(store.pool())
            .await
            .unwrap();
    }
}
