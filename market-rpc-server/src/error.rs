use market_data_services::{PipelineError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Browser session launch failed: {0}")]
    SessionLaunch(String),

    #[error("Page not loaded after {attempts} attempts: {last_error}")]
    LoadFailed { attempts: usize, last_error: String },

    #[error("No rows parsed")]
    NoRowsParsed,

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl RpcError {
    /// Get the JSON-RPC error code for this error
    pub fn code(&self) -> i32 {
        use crate::protocol::*;
        match self {
            RpcError::ParseError(_) => PARSE_ERROR,
            RpcError::InvalidRequest(_) => INVALID_REQUEST,
            RpcError::MethodNotFound(_) => METHOD_NOT_FOUND,
            RpcError::InvalidParams(_) => INVALID_PARAMS,
            RpcError::InternalError(_) => INTERNAL_ERROR,
            RpcError::SessionLaunch(_) => SESSION_LAUNCH_FAILED,
            RpcError::LoadFailed { .. } => LOAD_FAILED,
            RpcError::NoRowsParsed => NO_ROWS_PARSED,
            RpcError::Persistence(_) => PERSISTENCE_FAILED,
            RpcError::Render(_) => RENDER_FAILED,
        }
    }

    /// Get additional error data (optional)
    pub fn data(&self) -> Option<serde_json::Value> {
        match self {
            RpcError::LoadFailed {
                attempts,
                last_error,
            } => Some(serde_json::json!({
                "attempts": attempts,
                "last_error": last_error,
            })),
            RpcError::NoRowsParsed => Some(serde_json::json!({
                "suggestion": "The listing layout may have changed; check the trade link pattern"
            })),
            _ => None,
        }
    }
}

impl From<PipelineError> for RpcError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::SessionLaunch(msg) => RpcError::SessionLaunch(msg),
            PipelineError::Load {
                attempts,
                last_error,
            } => RpcError::LoadFailed {
                attempts,
                last_error,
            },
            PipelineError::NoRowsParsed => RpcError::NoRowsParsed,
            PipelineError::Persistence(e) => RpcError::Persistence(e.to_string()),
            PipelineError::Render(msg) => RpcError::Render(msg),
            PipelineError::Extract(e) => RpcError::InternalError(e.to_string()),
        }
    }
}

impl From<StoreError> for RpcError {
    fn from(err: StoreError) -> Self {
        RpcError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_errors_keep_their_codes() {
        let load: RpcError = PipelineError::Load {
            attempts: 2,
            last_error: "timeout".to_string(),
        }
        .into();
        assert_eq!(load.code(), -32011);
        assert_eq!(load.data().unwrap()["attempts"], 2);

        let no_rows: RpcError = PipelineError::NoRowsParsed.into();
        assert_eq!(no_rows.code(), -32012);

        let store: RpcError = StoreError::Query("boom".to_string()).into();
        assert_eq!(store.code(), -32013);
        assert!(store.to_string().contains("boom"));
    }
}
