/// Integration tests for the JSON-RPC server
///
/// These tests require a server running on 127.0.0.1:3000. `markets.run`
/// additionally needs a local Chromium and network access to the listing.
///
/// To run: cargo test --package market-rpc-server --test integration_test -- --ignored --nocapture
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

fn call(request: Value, timeout: Duration) -> Value {
    let mut stream = TcpStream::connect("127.0.0.1:3000")
        .expect("Failed to connect to server. Is it running?");
    stream.set_read_timeout(Some(timeout)).unwrap();

    let request_json = serde_json::to_string(&request).unwrap();
    stream.write_all(request_json.as_bytes()).unwrap();
    stream.write_all(b"\n").unwrap();
    stream.flush().unwrap();

    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line).unwrap();

    println!("Response: {}", response_line);
    serde_json::from_str(&response_line).unwrap()
}

#[test]
#[ignore] // Requires a running server, Chromium and network access
fn test_jsonrpc_run_then_read() {
    let response = call(
        json!({"jsonrpc": "2.0", "id": 1, "method": "markets.run", "params": {"limit": 12}}),
        Duration::from_secs(180),
    );
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);

    if response.get("error").is_some() {
        println!("Cycle failed: {}", response["error"]);
        return;
    }

    let saved = response["result"]["saved"].as_u64().unwrap();
    assert!(saved > 0 && saved <= 12);
    println!("Saved {} rows from {}", saved, response["result"]["source_url"]);

    let response = call(
        json!({"jsonrpc": "2.0", "id": 2, "method": "markets.snapshots", "params": {"limit": 5}}),
        Duration::from_secs(10),
    );
    let items = response["result"]["items"].as_array().unwrap();
    assert!(items.len() <= 5);
    for item in items {
        assert!(item["symbol"].as_str().is_some_and(|s| !s.is_empty()));
        assert!(item.get("updatedAt").is_some());
    }
}

#[test]
#[ignore] // Requires a running server
fn test_jsonrpc_health() {
    let response = call(
        json!({"jsonrpc": "2.0", "id": 3, "method": "health.status"}),
        Duration::from_secs(10),
    );
    assert!(response["result"]["durable_store_available"].is_boolean());
    assert!(response["result"]["time"].is_string());
}

#[test]
#[ignore] // Requires a running server
fn test_jsonrpc_export() {
    let response = call(
        json!({"jsonrpc": "2.0", "id": 4, "method": "markets.export", "params": {}}),
        Duration::from_secs(10),
    );
    assert_eq!(response["result"]["content_type"], "text/csv");
    let table = response["result"]["table"].as_str().unwrap();
    assert!(table.starts_with("symbol,lastPrice,changePct,volumeText,updatedAt\n"));
}

#[test]
#[ignore] // Requires a running server
fn test_jsonrpc_invalid_method() {
    let response = call(
        json!({"jsonrpc": "2.0", "id": 5, "method": "invalid.method", "params": {}}),
        Duration::from_secs(10),
    );
    assert!(response.get("error").is_some());
    assert_eq!(response["error"]["code"], -32601); // METHOD_NOT_FOUND
}

#[test]
#[ignore] // Requires a running server
fn test_jsonrpc_invalid_params() {
    let response = call(
        json!({"jsonrpc": "2.0", "id": 6, "method": "markets.snapshots", "params": {"limit": "lots"}}),
        Duration::from_secs(10),
    );
    assert!(response.get("error").is_some());
    assert_eq!(response["error"]["code"], -32602); // INVALID_PARAMS
}
