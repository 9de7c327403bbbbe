use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use tokio::time::{sleep, timeout};

use super::config::ScrapeConfig;
use super::render::RenderContext;
use crate::error::PipelineError;

/// Drives a render context to a ready, fully materialized listing page.
///
/// Candidate URLs are tried top to bottom. For each one: navigate (bounded),
/// poll until enough trade links exist (bounded), then run the scroll plan so
/// the virtualized list renders its lazy rows. The first candidate to get
/// through all three stages wins; any failure moves on to the next URL.
pub struct PageLoader {
    config: ScrapeConfig,
}

impl PageLoader {
    pub fn new(config: ScrapeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Load the configured candidates. Returns the URL that rendered.
    pub async fn load(&self, ctx: &dyn RenderContext) -> Result<String, PipelineError> {
        self.load_candidates(ctx, &self.config.candidate_urls, self.config.ready_threshold)
            .await
    }

    pub async fn load_candidates(
        &self,
        ctx: &dyn RenderContext,
        candidate_urls: &[String],
        ready_threshold: usize,
    ) -> Result<String, PipelineError> {
        let mut last_error = String::from("no candidate URLs configured");

        for (attempt, url) in candidate_urls.iter().enumerate() {
            let started = Instant::now();
            match self.load_candidate(ctx, url, ready_threshold).await {
                Ok(links) => {
                    tracing::info!(
                        "Loaded {} ({} trade links) in {}ms",
                        url,
                        links,
                        started.elapsed().as_millis()
                    );
                    return Ok(url.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        "Candidate {}/{} failed ({}): {:#}",
                        attempt + 1,
                        candidate_urls.len(),
                        url,
                        e
                    );
                    last_error = format!("{}: {:#}", url, e);
                }
            }
        }

        Err(PipelineError::Load {
            attempts: candidate_urls.len(),
            last_error,
        })
    }

    async fn load_candidate(
        &self,
        ctx: &dyn RenderContext,
        url: &str,
        ready_threshold: usize,
    ) -> Result<usize> {
        let nav_timeout = self.config.navigation_timeout;
        timeout(nav_timeout, ctx.navigate(url))
            .await
            .map_err(|_| anyhow!("navigation timed out after {}s", nav_timeout.as_secs_f64()))??;

        let links = self.wait_until_ready(ctx, ready_threshold).await?;
        self.prime_virtualized_list(ctx).await?;
        Ok(links)
    }

    /// Poll the trade-link count until it reaches the threshold.
    async fn wait_until_ready(&self, ctx: &dyn RenderContext, ready_threshold: usize) -> Result<usize> {
        let selector = self.config.link_selector();
        let interval = self.config.ready_poll_interval.max(Duration::from_millis(10));
        let ready_timeout = self.config.ready_timeout;

        let poll = async {
            loop {
                match ctx.count_matching(&selector).await {
                    Ok(count) if count >= ready_threshold => return count,
                    Ok(count) => tracing::debug!("{} of {} trade links rendered", count, ready_threshold),
                    // The document may be swapped out mid-poll while the page
                    // finishes booting; keep polling until the deadline.
                    Err(e) => tracing::debug!("Readiness probe failed: {:#}", e),
                }
                sleep(interval).await;
            }
        };

        timeout(ready_timeout, poll).await.map_err(|_| {
            anyhow!(
                "fewer than {} trade links after {}s",
                ready_threshold,
                ready_timeout.as_secs_f64()
            )
        })
    }

    /// Scroll down in fixed steps, then back to the top.
    async fn prime_virtualized_list(&self, ctx: &dyn RenderContext) -> Result<()> {
        let plan = &self.config.scroll;
        for _ in 0..plan.steps {
            ctx.scroll_by(plan.step_px).await?;
            sleep(plan.step_delay).await;
        }
        ctx.scroll_to_top().await?;
        sleep(plan.settle_delay).await;
        Ok(())
    }
}
