//! # Output Fetcher
//!
//! Downloads a job's output payload straight from the URL the service
//! hands out, outside the RPC channel.
//!
//! Redirects are followed by hand so the chain length can be bounded, and
//! gzip bodies are decoded here rather than by the HTTP client.

use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use log::debug;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, HeaderMap, LOCATION};
use reqwest::{Client, Url, redirect};

use crate::api::fault::{ApiError, to_http_error, to_transport_error};

/// Label used for errors raised while fetching output.
const CONTEXT: &str = "output fetch";

/// HTTP GET with bounded redirect following and gzip decoding.
#[derive(Debug, Clone)]
pub struct OutputFetcher {
    http: Client,
    max_redirects: usize,
}

impl OutputFetcher {
    /// Create a fetcher that follows at most `max_redirects` hops.
    ///
    /// # Arguments
    ///
    /// * `max_redirects` - Redirect hops allowed before giving up
    /// * `timeout` - Per-request timeout
    pub fn new(max_redirects: usize, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| to_transport_error("building HTTP client", e))?;

        Ok(Self {
            http,
            max_redirects,
        })
    }

    /// Maximum redirect hops followed by [`fetch`](OutputFetcher::fetch).
    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// Fetch `url` and return the decoded body.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<u8>)` - Body of the final response, gunzipped if needed
    /// * `Err(ApiError::Transport)` - Bad URL, connection failure, non-2xx
    ///   status or too many redirects
    /// * `Err(ApiError::MalformedResponse)` - Body claimed gzip but did not decode
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let mut current = parse_output_url(url)?;
        let mut hops = 0;

        loop {
            let response = self
                .http
                .get(current.clone())
                .header(ACCEPT_ENCODING, "gzip")
                .send()
                .await
                .map_err(|e| to_transport_error(CONTEXT, e))?;

            let status = response.status();
            debug!("[API] GET {} -> {}", current, status.as_u16());

            if status.is_redirection() {
                if let Some(target) = redirect_target(&current, response.headers())? {
                    if hops >= self.max_redirects {
                        return Err(ApiError::transport(format!(
                            "{CONTEXT}: gave up after {} redirects (last target {target})",
                            self.max_redirects
                        )));
                    }
                    hops += 1;
                    debug!("[API] Following redirect {} to {}", hops, target);
                    current = target;
                    continue;
                }
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(to_http_error(CONTEXT, status, &body));
            }

            let gzipped = is_gzip(response.headers());
            let body = response
                .bytes()
                .await
                .map_err(|e| to_transport_error(CONTEXT, e))?;

            return if gzipped {
                debug!("[API] Decoding gzip body ({} bytes)", body.len());
                gunzip(&body)
            } else {
                Ok(body.to_vec())
            };
        }
    }
}

/// Validate an output URL before any request is made.
fn parse_output_url(url: &str) -> Result<Url, ApiError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ApiError::transport(format!("{CONTEXT}: empty URL")));
    }

    let parsed = Url::parse(trimmed).map_err(|e| {
        ApiError::transport(format!("{CONTEXT}: invalid URL {trimmed:?} ({e})"))
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ApiError::transport(format!(
            "{CONTEXT}: unsupported URL scheme {scheme:?}"
        ))),
    }
}

/// Resolve the `Location` header of a redirect against the current URL.
fn redirect_target(current: &Url, headers: &HeaderMap) -> Result<Option<Url>, ApiError> {
    let Some(location) = headers.get(LOCATION) else {
        return Ok(None);
    };
    let location = location
        .to_str()
        .map_err(|_| ApiError::transport(format!("{CONTEXT}: unreadable Location header")))?;
    let target = current.join(location).map_err(|e| {
        ApiError::transport(format!("{CONTEXT}: invalid redirect target {location:?} ({e})"))
    })?;
    Ok(Some(target))
}

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|coding| {
            let coding = coding.trim();
            coding.eq_ignore_ascii_case("gzip") || coding.eq_ignore_ascii_case("x-gzip")
        })
}

fn gunzip(body: &[u8]) -> Result<Vec<u8>, ApiError> {
    let mut decoder = GzDecoder::new(body);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| ApiError::malformed_with("Output claimed gzip encoding but did not decode", e))?;
    Ok(decoded)
}
