use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;

use crate::error::RpcError;
use crate::handler::MarketHandler;
use crate::protocol::*;

/// Longest request line accepted before the connection is dropped.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// JSON-RPC server for market snapshots
pub struct RpcServer {
    handler: Arc<MarketHandler>,
}

impl RpcServer {
    pub fn new(handler: Arc<MarketHandler>) -> Self {
        Self { handler }
    }

    /// Bind to `addr` and serve until the token is cancelled.
    pub async fn run(&self, addr: &str, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        tracing::info!("Market JSON-RPC server listening on {}", addr);
        self.serve(listener, shutdown).await
    }

    /// Accept connections on an already bound listener.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Server stopping, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, addr)) => {
                        tracing::debug!("New connection from {}", addr);
                        let handler = Arc::clone(&self.handler);
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(socket, handler, shutdown).await {
                                tracing::error!("Connection error from {}: {:#}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Handle a single TCP connection: one request per line, one response per line.
async fn handle_connection(
    socket: TcpStream,
    handler: Arc<MarketHandler>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = framed.next() => match next {
                Some(line) => line.context("Failed to read request line")?,
                None => break,
            },
        };

        if line.trim().is_empty() {
            continue;
        }

        tracing::debug!("Received request: {}", line.trim());
        let response = process_request(&line, &handler).await;
        framed
            .send(response.to_string())
            .await
            .context("Failed to send response")?;
    }

    Ok(())
}

/// Process a JSON-RPC request
async fn process_request(line: &str, handler: &MarketHandler) -> Value {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => return create_error_response(None, RpcError::ParseError(e.to_string())),
    };

    if request.jsonrpc != "2.0" {
        return create_error_response(
            request.id,
            RpcError::InvalidRequest("JSON-RPC version must be 2.0".to_string()),
        );
    }

    let id = request.id;
    match request.method.as_str() {
        METHOD_HEALTH => return respond(id, Ok(handler.handle_health())),
        METHOD_RUN | METHOD_SNAPSHOTS | METHOD_EXPORT => {}
        _ => return create_error_response(id, RpcError::MethodNotFound(request.method.clone())),
    }

    let params = match parse_limit_params(request.params) {
        Ok(params) => params,
        Err(e) => return create_error_response(id, e),
    };

    match request.method.as_str() {
        METHOD_RUN => respond(id, handler.handle_run(params).await),
        METHOD_SNAPSHOTS => respond(id, handler.handle_snapshots(params).await),
        _ => respond(id, handler.handle_export(params).await),
    }
}

fn parse_limit_params(params: Option<Value>) -> Result<LimitParams, RpcError> {
    match params {
        None | Some(Value::Null) => Ok(LimitParams::default()),
        Some(params) => serde_json::from_value(params)
            .map_err(|e| RpcError::InvalidParams(format!("Invalid params: {}", e))),
    }
}

fn respond<T: Serialize>(id: Option<Value>, result: Result<T, RpcError>) -> Value {
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Request failed: {}", e);
            return create_error_response(id, e);
        }
    };

    match serde_json::to_value(result) {
        Ok(result) => to_json(&JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result,
        }),
        Err(e) => create_error_response(id, RpcError::InternalError(e.to_string())),
    }
}

/// Create an error response
fn create_error_response(id: Option<Value>, error: RpcError) -> Value {
    to_json(&JsonRpcError {
        jsonrpc: "2.0".to_string(),
        id,
        error: ErrorObject {
            code: error.code(),
            message: error.to_string(),
            data: error.data(),
        },
    })
}

fn to_json<T: Serialize>(envelope: &T) -> Value {
    serde_json::to_value(envelope).unwrap_or_else(|e| {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": { "code": INTERNAL_ERROR, "message": format!("Internal error: {}", e) }
        })
    })
}
