pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use market_core::{MarketQuote, MarketSnapshotRow};
use serde::Serialize;

use crate::error::StoreError;

// Re-export commonly used items
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Backing chosen for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// Relational database.
    Durable,
    /// In-process cache holding the last cycle only.
    Transient,
}

/// Latest-snapshot persistence, keyed by symbol.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    fn mode(&self) -> StoreMode;

    /// Write one cycle's rows and stamp them. Returns the number of rows
    /// written. Either the whole batch lands or none of it does.
    async fn upsert(&self, quotes: &[MarketQuote]) -> Result<usize, StoreError>;

    /// At most `limit` rows.
    async fn read(&self, limit: usize) -> Result<Vec<MarketSnapshotRow>, StoreError>;
}

/// Store selection inputs, read once at startup.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub database_url: Option<String>,
    pub require_tls: bool,
    pub connect_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            require_tls: false,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreSettings {
    /// `PGSSL=require` turns TLS on; any other value leaves it off.
    pub fn tls_required(pg_ssl: Option<&str>) -> bool {
        pg_ssl.is_some_and(|value| value.trim().eq_ignore_ascii_case("require"))
    }
}

/// Probe the database once and pick the store for the rest of the process.
///
/// No connection string, or any failure while connecting or creating the
/// schema, selects the transient store. There is no later reconnection.
pub async fn select_store(settings: &StoreSettings) -> Arc<dyn SnapshotStore> {
    let Some(url) = settings.database_url.as_deref().filter(|u| !u.trim().is_empty()) else {
        tracing::info!("No database configured, using transient in-memory store");
        return Arc::new(MemoryStore::new());
    };

    let probe = async {
        let store = PostgresStore::connect(url, settings.require_tls, settings.connect_timeout).await?;
        store.ensure_schema().await?;
        Ok::<_, StoreError>(store)
    };

    match probe.await {
        Ok(store) => {
            tracing::info!("Using durable store at {}", redact_url(url));
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                "Database unavailable at startup ({}), falling back to transient store: {}",
                redact_url(url),
                e
            );
            Arc::new(MemoryStore::new())
        }
    }
}

/// Connection string with any password replaced, safe to log.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
        None => url.to_string(),
    }
}
