//! Shared helpers for tests that run against a mock RPC endpoint.

#![allow(dead_code)]

use std::time::Duration;

use boa_api::{BoaClient, ClientConfig};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockBuilder, MockServer, Request, ResponseTemplate};

pub const RPC_PATH: &str = "/api";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn endpoint(server: &MockServer) -> String {
    format!("{}{}", server.uri(), RPC_PATH)
}

pub fn client_for(server: &MockServer) -> BoaClient {
    let config = ClientConfig::new(endpoint(server))
        .with_poll_interval(Duration::from_millis(10))
        .with_request_timeout(Duration::from_secs(5));
    BoaClient::with_config(config).unwrap()
}

/// Matcher for a POST to the RPC endpoint calling `rpc_method`.
pub fn rpc(rpc_method: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .and(body_partial_json(json!({ "method": rpc_method })))
}

pub fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result
    }))
}

pub fn rpc_fault(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message }
    }))
}

pub fn job_json(id: i64, compiler: &str, execution: &str) -> Value {
    json!({
        "id": id,
        "submitted": "2024-03-01 10:22:31",
        "input": { "id": 1, "name": "ds1" },
        "compiler_status": compiler,
        "execution_status": execution
    })
}

/// Mount a login that hands out token `T1` and cookie `sid=abc`.
pub async fn mount_login(server: &MockServer) {
    rpc("user.login")
        .respond_with(
            rpc_result(json!({ "sessid": "abc", "session_name": "sid", "token": "T1" }))
                .append_header("Set-Cookie", "sid=abc; path=/; HttpOnly"),
        )
        .mount(server)
        .await;
}

pub async fn logged_in_client(server: &MockServer) -> BoaClient {
    mount_login(server).await;
    let client = client_for(server);
    client.login("alice", "pw").await.unwrap();
    client
}

/// RPC method names of every request the server saw, in order.
pub async fn rpc_methods(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(rpc_method_of)
        .collect()
}

pub fn rpc_method_of(request: &Request) -> Option<String> {
    let body: Value = request.body_json().ok()?;
    body.get("method")?.as_str().map(str::to_string)
}

/// The request the server saw for `rpc_method`, if exactly one.
pub async fn single_request(server: &MockServer, rpc_method: &str) -> Request {
    let mut matching: Vec<Request> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| rpc_method_of(r).as_deref() == Some(rpc_method))
        .collect();
    assert_eq!(matching.len(), 1, "expected one {rpc_method} request");
    matching.remove(0)
}

pub fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
