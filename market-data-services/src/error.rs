use thiserror::Error;

/// Structural failures that abort a whole scrape cycle.
///
/// Field-level parse failures never show up here: the normalizer degrades
/// them to `None` and the row is still stored.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Browser session launch failed: {0}")]
    SessionLaunch(String),

    #[error("Page not loaded: all {attempts} candidate URLs failed (last error: {last_error})")]
    Load { attempts: usize, last_error: String },

    #[error("No rows parsed")]
    NoRowsParsed,

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database connection failed: {0}")]
    Connect(String),

    #[error("Schema setup failed: {0}")]
    Schema(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Transaction rolled back: {0}")]
    Transaction(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid link selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}
