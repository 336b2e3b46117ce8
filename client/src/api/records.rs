//! # Records
//!
//! Schemas for the records the service returns, and the parse functions
//! that turn loosely typed RPC results into them.
//!
//! A missing field or a value of the wrong type is a `MalformedResponse`.
//! Extra fields are ignored.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::api::fault::ApiError;

/// An input corpus that queries can run against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dataset {
    /// Opaque numeric identifier
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    /// Human-readable name, e.g. "2022 Jan/Java"
    pub name: String,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id {})", self.name, self.id)
    }
}

/// A job as the server describes it.
///
/// Status fields are kept as the raw wire strings; decoding happens when
/// a job handle is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    /// Submission timestamp as formatted by the server
    pub submitted: String,
    /// Dataset the job was submitted against
    pub input: Dataset,
    pub compiler_status: String,
    /// Older servers call this field `hadoop_status`
    #[serde(alias = "hadoop_status")]
    pub execution_status: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Text(String),
}

/// Identifiers arrive as JSON integers or as decimal strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match IdRepr::deserialize(deserializer)? {
        IdRepr::Int(id) => Ok(id),
        IdRepr::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid id {text:?}"))),
    }
}

/// Parse one job record returned by `method`.
pub fn parse_job_record(method: &str, value: Value) -> Result<JobRecord, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::malformed_with(format!("Invalid job record from {method}: {e}"), e))
}

/// Parse a list of job records returned by `method`.
pub fn parse_job_records(method: &str, value: Value) -> Result<Vec<JobRecord>, ApiError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| parse_job_record(method, item))
            .collect(),
        // Empty PHP arrays can come back as objects
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        Value::Null => Ok(Vec::new()),
        other => Err(ApiError::malformed(format!(
            "Expected a list of jobs from {method}, got {}",
            type_name(&other)
        ))),
    }
}

/// Parse the dataset list returned by `method`.
pub fn parse_datasets(method: &str, value: Value) -> Result<Vec<Dataset>, ApiError> {
    match value {
        Value::Array(_) => serde_json::from_value(value).map_err(|e| {
            ApiError::malformed_with(format!("Invalid dataset record from {method}: {e}"), e)
        }),
        other => Err(ApiError::malformed(format!(
            "Expected a list of datasets from {method}, got {}",
            type_name(&other)
        ))),
    }
}

/// Read an integer result, accepting decimal strings as well.
pub fn parse_int(method: &str, value: &Value) -> Result<i64, ApiError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ApiError::malformed(format!("Non-integer number from {method}: {n}"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| ApiError::malformed(format!("Expected an integer from {method}, got {s:?}"))),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(ApiError::malformed(format!(
            "Expected an integer from {method}, got {}",
            type_name(other)
        ))),
    }
}

/// Read a string result.
pub fn parse_string(method: &str, value: Value) -> Result<String, ApiError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ApiError::malformed(format!(
            "Expected a string from {method}, got {}",
            type_name(&other)
        ))),
    }
}

/// Read the `[size, hash]` pair describing a job's output.
pub fn parse_output_hash(method: &str, value: Value) -> Result<(i64, String), ApiError> {
    let Value::Array(items) = value else {
        return Err(ApiError::malformed(format!(
            "Expected [size, hash] from {method}"
        )));
    };
    match items.as_slice() {
        [size, hash] => {
            let size = parse_int(method, size)?;
            let hash = match hash {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(ApiError::malformed(format!(
                        "Expected a hash string from {method}, got {}",
                        type_name(other)
                    )));
                }
            };
            Ok((size, hash))
        }
        _ => Err(ApiError::malformed(format!(
            "Expected [size, hash] from {method}, got {} element(s)",
            items.len()
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
