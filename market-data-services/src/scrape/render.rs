use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::Page;

/// The slice of a live rendering context that loading and extraction need.
///
/// Implemented for a real browser tab; tests drive the pipeline with an
/// in-memory document instead.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate and wait for the document to load.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Number of elements currently matching a CSS selector.
    async fn count_matching(&self, selector: &str) -> Result<usize>;

    async fn scroll_by(&self, dy: i64) -> Result<()>;

    async fn scroll_to_top(&self) -> Result<()>;

    /// Serialized HTML of the document as currently rendered.
    async fn html(&self) -> Result<String>;
}

#[async_trait]
impl RenderContext for Page {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.goto(url)
            .await
            .with_context(|| format!("Navigation to {} failed", url))?;
        Ok(())
    }

    async fn count_matching(&self, selector: &str) -> Result<usize> {
        let script = format!(
            "document.querySelectorAll({}).length",
            serde_json::to_string(selector)?
        );
        let count = self
            .evaluate(script.as_str())
            .await
            .context("Failed to count matching elements")?
            .into_value::<usize>()
            .context("Element count was not a number")?;
        Ok(count)
    }

    async fn scroll_by(&self, dy: i64) -> Result<()> {
        let script = format!("window.scrollBy(0, {})", dy);
        self.evaluate(script.as_str())
            .await
            .context("Scroll step failed")?;
        Ok(())
    }

    async fn scroll_to_top(&self) -> Result<()> {
        self.evaluate("window.scrollTo(0, 0)")
            .await
            .context("Scroll to top failed")?;
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        self.content()
            .await
            .context("Failed to read rendered document")
    }
}
