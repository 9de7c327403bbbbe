use std::sync::Arc;

use market_data_services::export::CSV_CONTENT_TYPE;
use market_data_services::{HealthStatus, MarketPipeline};

use crate::error::RpcError;
use crate::protocol::*;

/// Handler for market snapshot methods
pub struct MarketHandler {
    pipeline: Arc<MarketPipeline>,
}

impl MarketHandler {
    pub fn new(pipeline: Arc<MarketPipeline>) -> Self {
        Self { pipeline }
    }

    /// Handle a markets.run request: one full cycle, on demand.
    pub async fn handle_run(&self, params: LimitParams) -> Result<RunResponse, RpcError> {
        let limit = params
            .limit
            .unwrap_or(self.pipeline.limits().run_limit);
        tracing::debug!("Manual cycle requested: limit={}", limit);

        let outcome = self.pipeline.run(limit).await?;

        Ok(RunResponse {
            saved: outcome.saved,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
            source_url: outcome.source_url,
        })
    }

    /// Handle a markets.snapshots request
    pub async fn handle_snapshots(&self, params: LimitParams) -> Result<SnapshotsResponse, RpcError> {
        let page = self.pipeline.read_snapshots(params.limit).await?;
        Ok(SnapshotsResponse {
            items: page.items,
            as_of: page.as_of,
        })
    }

    /// Handle a markets.export request
    pub async fn handle_export(&self, params: LimitParams) -> Result<ExportResponse, RpcError> {
        let table = self.pipeline.export_table(params.limit).await?;
        Ok(ExportResponse {
            content_type: CSV_CONTENT_TYPE.to_string(),
            table,
        })
    }

    pub fn handle_health(&self) -> HealthStatus {
        self.pipeline.health()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use market_core::MarketQuote;
    use market_data_services::{
        MemoryStore, PipelineLimits, ScrapeConfig, SessionManager, SessionOptions, SnapshotStore,
    };

    pub(crate) async fn seeded_handler(rows: usize, read_limit_max: usize) -> MarketHandler {
        let store = Arc::new(MemoryStore::new());
        let quotes: Vec<_> = (0..rows)
            .map(|i| {
                let mut quote = MarketQuote::new(format!("C{}USDT", i));
                quote.last_price = Some(i as f64 + 0.5);
                quote.volume_text = "1,000K".to_string();
                quote
            })
            .collect();
        store.upsert(&quotes).await.unwrap();

        let sessions = Arc::new(SessionManager::new(SessionOptions::default()));
        let limits = PipelineLimits {
            run_limit: 12,
            read_limit_max,
        };
        let pipeline = MarketPipeline::new(sessions, ScrapeConfig::default(), store, limits).unwrap();
        MarketHandler::new(Arc::new(pipeline))
    }

    #[tokio::test]
    async fn test_snapshots_clamped_to_upper_bound() {
        let handler = seeded_handler(8, 5).await;

        let all = handler.handle_snapshots(LimitParams::default()).await.unwrap();
        assert_eq!(all.items.len(), 5);

        let big = handler
            .handle_snapshots(LimitParams { limit: Some(1000) })
            .await
            .unwrap();
        assert_eq!(big.items.len(), 5);

        let small = handler
            .handle_snapshots(LimitParams { limit: Some(3) })
            .await
            .unwrap();
        assert_eq!(small.items.len(), 3);
    }

    #[tokio::test]
    async fn test_export_returns_csv() {
        let handler = seeded_handler(2, 50).await;
        let export = handler.handle_export(LimitParams::default()).await.unwrap();

        assert_eq!(export.content_type, "text/csv");
        let lines: Vec<_> = export.table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("C0USDT,0.5,,1000K,"));
    }

    #[tokio::test]
    async fn test_health_reports_transient_store() {
        let handler = seeded_handler(0, 50).await;
        let health = handler.handle_health();
        assert!(!health.durable_store_available);
    }

    #[tokio::test]
    async fn test_run_after_shutdown_maps_to_session_error() {
        let handler = seeded_handler(0, 50).await;
        handler.pipeline.sessions().shutdown().await;

        let err = handler.handle_run(LimitParams::default()).await.unwrap_err();
        assert_eq!(err.code(), SESSION_LAUNCH_FAILED);
    }
}
