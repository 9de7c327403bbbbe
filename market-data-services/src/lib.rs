pub mod error;
pub mod export;
pub mod pipeline;
pub mod scrape;
pub mod store;

// Re-export commonly used items
pub use error::{ExtractError, PipelineError, StoreError};
pub use pipeline::{
    HealthStatus, MarketPipeline, PipelineLimits, RunOutcome, SnapshotPage, DEFAULT_READ_LIMIT_MAX,
    DEFAULT_RUN_LIMIT,
};
pub use scrape::{PageLoader, RenderContext, RowExtractor, ScrapeConfig, SessionManager, SessionOptions};
pub use store::{select_store, MemoryStore, PostgresStore, SnapshotStore, StoreMode, StoreSettings};
