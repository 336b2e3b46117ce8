//! # Session Transport
//!
//! JSON-RPC over HTTP POST that carries the session along: every request
//! gets the accumulated cookies and CSRF tokens, every response has its
//! `Set-Cookie` headers appended to the jar.
//!
//! The jar is append-only. A cookie re-sent by the server under the same
//! name is appended again, never replaced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;
use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap, SET_COOKIE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::fault::{ApiError, RpcFault, to_http_error, to_remote_fault, to_transport_error};

/// Header carrying the CSRF tokens handed out at login.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Separator used when joining cookies or tokens into one header value.
const HEADER_JOIN: &str = "; ";

/// Authentication state accumulated over the lifetime of one client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    cookies: Vec<String>,
    csrf_tokens: Vec<String>,
    authenticated: bool,
}

impl Session {
    /// Cookies in the order they were received.
    pub fn cookies(&self) -> &[String] {
        &self.cookies
    }

    /// CSRF tokens in the order they were added.
    pub fn csrf_tokens(&self) -> &[String] {
        &self.csrf_tokens
    }

    /// Whether a login has succeeded and no logout has happened since.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Value for the `Cookie` request header, if any cookies are held.
    pub fn cookie_header(&self) -> Option<String> {
        join_nonempty(&self.cookies)
    }

    /// Value for the CSRF request header, if any tokens are held.
    pub fn csrf_header(&self) -> Option<String> {
        join_nonempty(&self.csrf_tokens)
    }

    fn add_cookie(&mut self, cookie: String) {
        self.cookies.push(cookie);
    }

    fn add_csrf(&mut self, token: String) {
        self.csrf_tokens.push(token);
    }

    /// Pull the `name=value` pair out of every `Set-Cookie` header.
    ///
    /// Returns how many cookies were appended.
    fn harvest(&mut self, headers: &HeaderMap) -> usize {
        let mut added = 0;
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            if let Some(cookie) = cookie_pair(raw) {
                self.add_cookie(cookie.to_string());
                added += 1;
            }
        }
        added
    }
}

fn join_nonempty(items: &[String]) -> Option<String> {
    if items.is_empty() {
        None
    } else {
        Some(items.join(HEADER_JOIN))
    }
}

/// The part of a `Set-Cookie` directive before the first attribute.
fn cookie_pair(directive: &str) -> Option<&str> {
    let pair = directive.split(';').next().unwrap_or_default().trim();
    if pair.is_empty() { None } else { Some(pair) }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a [Value],
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcFault>,
}

/// RPC channel bound to one endpoint and one session.
pub struct SessionTransport {
    endpoint: String,
    http: Client,
    session: Mutex<Session>,
    next_id: AtomicU64,
}

impl SessionTransport {
    /// Create a transport for `endpoint` using an existing HTTP client.
    pub fn new(endpoint: impl Into<String>, http: Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            http,
            session: Mutex::new(Session::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The RPC endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Snapshot of the current session state.
    pub fn session(&self) -> Session {
        self.lock().clone()
    }

    /// Add a CSRF token to send with every later request.
    pub fn add_csrf(&self, token: impl Into<String>) {
        self.lock().add_csrf(token.into());
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().authenticated
    }

    pub(crate) fn set_authenticated(&self, authenticated: bool) {
        self.lock().authenticated = authenticated;
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Call `method` with positional `params` and decode its result.
    ///
    /// Cookies set by the response are kept even when the call itself
    /// fails with a fault.
    pub async fn send<T>(&self, method: &str, params: &[Value]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let (cookie, csrf) = {
            let session = self.lock();
            (session.cookie_header(), session.csrf_header())
        };

        let mut builder = self.http.post(&self.endpoint).json(&request);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(csrf) = csrf {
            builder = builder.header(CSRF_HEADER, csrf);
        }

        debug!("[API] Calling {} (id {})", method, id);
        let response = builder
            .send()
            .await
            .map_err(|e| to_transport_error(method, e))?;

        let status = response.status();
        debug!(
            "[API] {} response status: {} ({})",
            method,
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        );

        let harvested = self.lock().harvest(response.headers());
        if harvested > 0 {
            debug!("[API] Stored {} cookie(s) from {}", harvested, method);
        }

        let body = response
            .text()
            .await
            .map_err(|e| to_transport_error(method, e))?;

        let result = decode_response(method, status, &body)?;
        serde_json::from_value(result).map_err(|e| {
            ApiError::malformed_with(format!("Unexpected result type from {method}"), e)
        })
    }
}

/// Unwrap an RPC response body into its `result` value.
fn decode_response(
    method: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> Result<Value, ApiError> {
    let envelope = match serde_json::from_str::<RpcResponse>(body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => return Err(to_http_error(method, status, body)),
        Err(e) => {
            return Err(ApiError::malformed_with(
                format!("Response to {method} is not a valid RPC envelope"),
                e,
            ));
        }
    };

    if let Some(fault) = envelope.error {
        return Err(to_remote_fault(method, fault));
    }
    if !status.is_success() {
        return Err(to_http_error(method, status, body));
    }

    Ok(envelope.result)
}
