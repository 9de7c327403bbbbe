use chrono::{DateTime, Utc};
use market_core::MarketSnapshotRow;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 Success Response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub result: Value,
}

/// JSON-RPC 2.0 Error Response
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub error: ErrorObject,
}

/// JSON-RPC Error Object
#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Custom error codes for scrape cycles
pub const SESSION_LAUNCH_FAILED: i32 = -32010;
pub const LOAD_FAILED: i32 = -32011;
pub const NO_ROWS_PARSED: i32 = -32012;
pub const PERSISTENCE_FAILED: i32 = -32013;
pub const RENDER_FAILED: i32 = -32014;

// Method names
pub const METHOD_RUN: &str = "markets.run";
pub const METHOD_SNAPSHOTS: &str = "markets.snapshots";
pub const METHOD_EXPORT: &str = "markets.export";
pub const METHOD_HEALTH: &str = "health.status";

/// Params shared by every `markets.*` method.
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// markets.run result
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub saved: usize,
    pub elapsed_ms: u64,
    pub source_url: String,
}

/// markets.snapshots result
#[derive(Debug, Serialize)]
pub struct SnapshotsResponse {
    pub items: Vec<MarketSnapshotRow>,
    pub as_of: DateTime<Utc>,
}

/// markets.export result
#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub content_type: String,
    pub table: String,
}
