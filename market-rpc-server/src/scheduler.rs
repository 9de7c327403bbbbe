use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cron::Schedule;
use market_data_services::MarketPipeline;
use tokio_util::sync::CancellationToken;

/// Parse a five-field (minute first) or six-field (second first) cron
/// expression.
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let expr = expr.trim();
    let normalized = match expr.split_whitespace().count() {
        5 => format!("0 {}", expr),
        6 => expr.to_string(),
        n => bail!("Schedule '{}' has {} fields, expected 5 or 6", expr, n),
    };
    Schedule::from_str(&normalized).with_context(|| format!("Invalid schedule '{}'", expr))
}

/// Fires a pipeline cycle on every tick of a cron schedule.
///
/// Ticks that pass while a cycle is still running are skipped, not queued.
/// A failed cycle is logged and the next tick runs as usual.
pub struct Scheduler {
    pipeline: Arc<MarketPipeline>,
    schedule: Schedule,
}

impl Scheduler {
    pub fn new(pipeline: Arc<MarketPipeline>, schedule: Schedule) -> Self {
        Self { pipeline, schedule }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            let Some(next) = self.schedule.upcoming(Utc).next() else {
                tracing::warn!("Schedule has no upcoming ticks, scheduler stopping");
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!("Next scheduled cycle at {}", next.to_rfc3339());

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown during scheduled cycle, abandoning it");
                    break;
                }
                _ = self.tick() => {}
            }
        }

        tracing::info!("Scheduler stopped");
    }

    async fn tick(&self) {
        let limit = self.pipeline.limits().run_limit;
        match self.pipeline.run(limit).await {
            Ok(outcome) => tracing::info!(
                "Scheduled cycle saved {} rows from {} ({}ms)",
                outcome.saved,
                outcome.source_url,
                outcome.elapsed.as_millis()
            ),
            Err(e) => tracing::error!("Scheduled cycle failed: {}", e),
        }
    }
}
