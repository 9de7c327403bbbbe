pub mod config;
pub mod normalizer;
pub mod page_loader;
pub mod render;
pub mod row_extractor;
pub mod session;

// Re-export commonly used items
pub use config::{ScrapeConfig, ScrollPlan, SessionOptions};
pub use page_loader::PageLoader;
pub use render::RenderContext;
pub use row_extractor::RowExtractor;
pub use session::{BrowserSession, SessionManager};
