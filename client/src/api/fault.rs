//! # Fault Translation
//!
//! Every failure the client can surface, and the conversions from RPC
//! faults and low-level HTTP errors into them.
//!
//! Nothing here retries. The service's fault codes do not say whether a
//! failure is transient, so retry policy belongs to the caller.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::api::status::ExecutionStatus;

/// Error types for API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// An operation that needs a session was called before `login`
    /// (or after `logout`). Raised before any network traffic.
    #[error("Not logged in: {operation} requires an authenticated session")]
    AuthenticationRequired {
        /// Name of the operation that was refused
        operation: &'static str,
    },

    /// The RPC endpoint answered with a fault instead of a result.
    #[error("Remote fault from {method} (code {code}): {message}")]
    RemoteFault {
        /// RPC method that faulted
        method: String,
        /// Fault code reported by the server
        code: i64,
        /// Fault message reported by the server
        message: String,
        /// Additional fault data, if the server sent any
        data: Option<Value>,
    },

    /// Connection failure, unreachable host, bad URL, unexpected HTTP status
    /// or an over-long redirect chain.
    #[error("Transport error: {message}")]
    Transport {
        /// Human-readable error message
        message: String,
        /// Underlying HTTP error, if there was one
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Output was requested for a job whose execution has not finished.
    #[error("Job {job_id} has not finished (execution status: {status})")]
    JobNotFinished {
        /// Job identifier
        job_id: i64,
        /// Execution status at the time of the request
        status: ExecutionStatus,
    },

    /// The server sent something that does not match the expected schema.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// What was wrong with the response
        message: String,
        /// Underlying decode error, if there was one
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// `wait` ran past its deadline while the job was still running.
    #[error("Timed out after {timeout:?} waiting for job {job_id}")]
    WaitTimedOut { job_id: i64, timeout: Duration },

    /// `wait` was cancelled by the caller.
    #[error("Wait for job {job_id} was cancelled")]
    WaitCancelled { job_id: i64 },
}

impl ApiError {
    /// Check if this is a missing-session error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ApiError::AuthenticationRequired { .. })
    }

    /// Check if this is a transport-level error.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }

    /// Check if the server returned a fault.
    pub fn is_remote_fault(&self) -> bool {
        matches!(self, ApiError::RemoteFault { .. })
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ApiError::MalformedResponse {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn malformed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ApiError::MalformedResponse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Fault object carried in the `error` member of an RPC response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RpcFault {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Convert an RPC fault into an ApiError.
pub(crate) fn to_remote_fault(method: &str, fault: RpcFault) -> ApiError {
    ApiError::RemoteFault {
        method: method.to_string(),
        code: fault.code,
        message: if fault.message.is_empty() {
            "Unknown fault".to_string()
        } else {
            fault.message
        },
        data: fault.data,
    }
}

/// Convert a reqwest error into an ApiError.
pub(crate) fn to_transport_error(context: &str, err: reqwest::Error) -> ApiError {
    let message = if err.is_builder() {
        format!("{context}: invalid request URL ({err})")
    } else if err.is_timeout() {
        format!("{context}: request timed out")
    } else if err.is_connect() {
        format!("{context}: could not connect ({err})")
    } else {
        format!("{context}: {err}")
    };

    ApiError::Transport {
        message,
        source: Some(err),
    }
}

/// Convert an unexpected HTTP status into an ApiError.
pub(crate) fn to_http_error(context: &str, status: reqwest::StatusCode, body: &str) -> ApiError {
    let reason = status.canonical_reason().unwrap_or("Unknown");
    let message = if body.trim().is_empty() {
        format!("{context}: HTTP {} ({reason})", status.as_u16())
    } else {
        format!(
            "{context}: HTTP {} ({reason}): {}",
            status.as_u16(),
            truncate(body.trim(), 200)
        )
    };
    ApiError::transport(message)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
