use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use market_core::MarketSnapshotRow;
use serde::Serialize;

use crate::error::{ExtractError, PipelineError, StoreError};
use crate::export;
use crate::scrape::normalizer::normalize;
use crate::scrape::session::close_page;
use crate::scrape::{PageLoader, RenderContext, RowExtractor, ScrapeConfig, SessionManager};
use crate::store::{SnapshotStore, StoreMode};

pub const DEFAULT_RUN_LIMIT: usize = 12;
pub const DEFAULT_READ_LIMIT_MAX: usize = 50;

/// Row caps for the write and read paths.
#[derive(Debug, Clone, Copy)]
pub struct PipelineLimits {
    /// Rows collected per cycle when the caller gives no limit.
    pub run_limit: usize,
    /// Hard ceiling for any read, whatever the caller asks for.
    pub read_limit_max: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            run_limit: DEFAULT_RUN_LIMIT,
            read_limit_max: DEFAULT_READ_LIMIT_MAX,
        }
    }
}

/// Result of one successful cycle.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub saved: usize,
    pub elapsed: Duration,
    pub source_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotPage {
    pub items: Vec<MarketSnapshotRow>,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub durable_store_available: bool,
    pub store_mode: StoreMode,
    pub time: DateTime<Utc>,
}

/// One scrape cycle end to end: session, load, extract, normalize, persist.
///
/// Cycles are serialized by the session guard, so a manual trigger that lands
/// during a scheduled cycle waits for it instead of sharing the browser.
pub struct MarketPipeline {
    sessions: Arc<SessionManager>,
    loader: PageLoader,
    extractor: RowExtractor,
    store: Arc<dyn SnapshotStore>,
    limits: PipelineLimits,
}

impl MarketPipeline {
    pub fn new(
        sessions: Arc<SessionManager>,
        config: ScrapeConfig,
        store: Arc<dyn SnapshotStore>,
        limits: PipelineLimits,
    ) -> Result<Self, ExtractError> {
        let extractor = RowExtractor::new(&config)?;
        Ok(Self {
            sessions,
            loader: PageLoader::new(config),
            extractor,
            store,
            limits,
        })
    }

    pub fn limits(&self) -> PipelineLimits {
        self.limits
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Run one cycle in a fresh tab of the shared browser session. The tab
    /// is closed on every exit path; the session stays up for the next cycle.
    pub async fn run(&self, limit: usize) -> Result<RunOutcome, PipelineError> {
        let started = Instant::now();
        let session = self.sessions.ensure_session().await?;
        let page = session
            .open_page(&self.loader.config().user_agent)
            .await?;

        let result = self.run_on(&page, limit).await;
        close_page(page).await;
        drop(session);

        let mut outcome = result?;
        outcome.elapsed = started.elapsed();
        tracing::info!(
            "Cycle saved {} rows from {} in {}ms",
            outcome.saved,
            outcome.source_url,
            outcome.elapsed.as_millis()
        );
        Ok(outcome)
    }

    /// The cycle body against an already open render context.
    pub async fn run_on(
        &self,
        ctx: &dyn RenderContext,
        limit: usize,
    ) -> Result<RunOutcome, PipelineError> {
        let started = Instant::now();
        let source_url = self.loader.load(ctx).await?;

        let html = ctx
            .html()
            .await
            .map_err(|e| PipelineError::Render(format!("{:#}", e)))?;

        let raw_rows = self.extractor.extract(&html, limit);
        if raw_rows.is_empty() {
            return Err(PipelineError::NoRowsParsed);
        }

        let quotes: Vec<_> = raw_rows.iter().map(normalize).collect();
        let incomplete = quotes
            .iter()
            .filter(|q| q.last_price.is_none() || q.change_pct.is_none())
            .count();
        if incomplete > 0 {
            tracing::debug!("{} of {} rows have unparsed fields", incomplete, quotes.len());
        }

        let saved = self.store.upsert(&quotes).await?;

        Ok(RunOutcome {
            saved,
            elapsed: started.elapsed(),
            source_url,
        })
    }

    /// Requested limit, defaulted and clamped to the read ceiling.
    pub fn effective_read_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.limits.read_limit_max)
            .min(self.limits.read_limit_max)
    }

    pub async fn read_snapshots(&self, limit: Option<usize>) -> Result<SnapshotPage, StoreError> {
        let items = self.store.read(self.effective_read_limit(limit)).await?;
        Ok(SnapshotPage {
            items,
            as_of: Utc::now(),
        })
    }

    pub async fn export_table(&self, limit: Option<usize>) -> Result<String, StoreError> {
        let rows = self.store.read(self.effective_read_limit(limit)).await?;
        Ok(export::to_table_string(&rows))
    }

    pub fn health(&self) -> HealthStatus {
        let store_mode = self.store.mode();
        HealthStatus {
            durable_store_available: store_mode == StoreMode::Durable,
            store_mode,
            time: Utc::now(),
        }
    }
}
