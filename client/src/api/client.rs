//! # API Client Core
//!
//! The [`BoaClient`] facade: login and logout, dataset queries, job
//! submission and listing, plus the per-job operations that
//! [`Job`] handles route back through it.
//!
//! Every operation except `login` requires an authenticated session and
//! fails with [`ApiError::AuthenticationRequired`] before touching the
//! network otherwise.

use std::fmt;

use log::debug;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Value;

use crate::api::fault::{ApiError, to_transport_error};
use crate::api::job::Job;
use crate::api::output::OutputFetcher;
use crate::api::records::{
    Dataset, parse_datasets, parse_int, parse_job_record, parse_job_records, parse_output_hash,
    parse_string,
};
use crate::api::status::ExecutionStatus;
use crate::api::transport::{Session, SessionTransport};
use crate::config::ClientConfig;

/// Version of the library, used in the User-Agent header
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of jobs returned by [`BoaClient::jobs`]
pub const DEFAULT_JOB_LIST_LENGTH: u32 = 1000;

/// Response to a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// CSRF token to echo on every later request
    pub token: String,
    /// Session identifier, if the server reports one
    #[serde(default)]
    pub sessid: Option<String>,
    /// Session cookie name, if the server reports one
    #[serde(default)]
    pub session_name: Option<String>,
}

/// Client for the Boa API
///
/// # Example
///
/// ```rust,no_run
/// use boa_api::{BOA_API_ENDPOINT, BoaClient};
///
/// # async fn example() -> Result<(), boa_api::ApiError> {
/// let client = BoaClient::new(BOA_API_ENDPOINT)?;
/// client.login("alice", "secret").await?;
///
/// let mut job = client.submit("p: Project = input; out: output count of int; out << 1;", None).await?;
/// if job.wait().await? {
///     println!("{}", job.output().await?);
/// }
///
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct BoaClient {
    config: ClientConfig,
    transport: SessionTransport,
    fetcher: OutputFetcher,
}

impl BoaClient {
    /// Create a client for `endpoint` with default settings.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_config(ClientConfig::new(endpoint))
    }

    /// Create a client from a full configuration.
    ///
    /// The RPC client is configured with:
    /// - User-Agent: `boa-api/<version>`
    /// - Accept: `application/json`
    /// - the configured per-request timeout
    pub fn with_config(config: ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("boa-api/{VERSION}"))
                .unwrap_or_else(|_| HeaderValue::from_static("boa-api")),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| to_transport_error("building HTTP client", e))?;

        let transport = SessionTransport::new(config.endpoint(), http);
        let fetcher = OutputFetcher::new(config.max_redirects, config.request_timeout())?;

        Ok(Self {
            config,
            transport,
            fetcher,
        })
    }

    /// The RPC endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Snapshot of the session (cookies, CSRF tokens, login state).
    pub fn session(&self) -> Session {
        self.transport.session()
    }

    pub fn is_logged_in(&self) -> bool {
        self.transport.is_authenticated()
    }

    fn ensure_logged_in(&self, operation: &'static str) -> Result<(), ApiError> {
        if self.transport.is_authenticated() {
            Ok(())
        } else {
            Err(ApiError::AuthenticationRequired { operation })
        }
    }

    /// Log in to the service.
    ///
    /// Credentials are not checked locally; a rejected login surfaces as
    /// [`ApiError::RemoteFault`] and leaves the client logged out.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let result: Value = self
            .transport
            .send("user.login", &[Value::from(username), Value::from(password)])
            .await?;
        let response: LoginResponse = serde_json::from_value(result)
            .map_err(|e| ApiError::malformed_with("Login response has no token", e))?;

        self.transport.add_csrf(response.token.clone());
        self.transport.set_authenticated(true);
        debug!("[API] Logged in as {}", username);

        Ok(response)
    }

    /// Log out of the service.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.ensure_logged_in("logout")?;
        let _: IgnoredAny = self.transport.send("user.logout", &[]).await?;
        self.transport.set_authenticated(false);
        debug!("[API] Logged out");
        Ok(())
    }

    /// Same as [`logout`](BoaClient::logout).
    pub async fn close(&self) -> Result<(), ApiError> {
        self.logout().await
    }

    /// All datasets currently offered, in server order.
    pub async fn datasets(&self) -> Result<Vec<Dataset>, ApiError> {
        self.ensure_logged_in("datasets")?;
        let result = self.transport.send("boa.datasets", &[]).await?;
        parse_datasets("boa.datasets", result)
    }

    /// Names of all datasets currently offered.
    pub async fn dataset_names(&self) -> Result<Vec<String>, ApiError> {
        let datasets = self.datasets().await?;
        Ok(datasets.into_iter().map(|d| d.name).collect())
    }

    /// The dataset named exactly `name`, if there is one.
    pub async fn get_dataset(&self, name: &str) -> Result<Option<Dataset>, ApiError> {
        let datasets = self.datasets().await?;
        Ok(datasets.into_iter().find(|d| d.name == name))
    }

    /// Number of jobs the user has submitted.
    ///
    /// # Arguments
    ///
    /// * `public_only` - Count only public jobs
    pub async fn job_count(&self, public_only: bool) -> Result<i64, ApiError> {
        self.ensure_logged_in("job_count")?;
        let result: Value = self
            .transport
            .send("boa.count", &[Value::from(public_only)])
            .await?;
        parse_int("boa.count", &result)
    }

    /// Submit a query and return a handle to the new job.
    ///
    /// Without an explicit dataset the first one listed by the server is used.
    pub async fn submit(&self, query: &str, dataset: Option<&Dataset>) -> Result<Job<'_>, ApiError> {
        self.ensure_logged_in("submit")?;

        let dataset_id = match dataset {
            Some(dataset) => dataset.id,
            None => self
                .datasets()
                .await?
                .first()
                .map(|d| d.id)
                .ok_or_else(|| ApiError::malformed("Server offers no datasets to submit against"))?,
        };

        debug!("[API] Submitting query against dataset {}", dataset_id);
        let result = self
            .transport
            .send("boa.submit", &[Value::from(query), Value::from(dataset_id)])
            .await?;
        let record = parse_job_record("boa.submit", result)?;
        Ok(Job::from_record(self, record))
    }

    /// Fetch a job by identifier.
    pub async fn get_job(&self, id: i64) -> Result<Job<'_>, ApiError> {
        self.ensure_logged_in("get_job")?;
        let result = self.transport.send("boa.job", &[Value::from(id)]).await?;
        let record = parse_job_record("boa.job", result)?;
        Ok(Job::from_record(self, record))
    }

    /// A page of the user's jobs, newest first as ordered by the server.
    ///
    /// # Arguments
    ///
    /// * `public_only` - Only return public jobs
    /// * `offset` - Index of the first job to return
    /// * `length` - Maximum number of jobs to return
    pub async fn job_list(
        &self,
        public_only: bool,
        offset: u32,
        length: u32,
    ) -> Result<Vec<Job<'_>>, ApiError> {
        self.ensure_logged_in("job_list")?;
        let result = self
            .transport
            .send(
                "boa.range",
                &[
                    Value::from(public_only),
                    Value::from(offset),
                    Value::from(length),
                ],
            )
            .await?;
        let records = parse_job_records("boa.range", result)?;
        Ok(records
            .into_iter()
            .map(|record| Job::from_record(self, record))
            .collect())
    }

    /// Up to [`DEFAULT_JOB_LIST_LENGTH`] of the user's most recent jobs.
    pub async fn jobs(&self) -> Result<Vec<Job<'_>>, ApiError> {
        self.job_list(false, 0, DEFAULT_JOB_LIST_LENGTH).await
    }

    /// The most recently submitted job, if any.
    pub async fn last_job(&self) -> Result<Option<Job<'_>>, ApiError> {
        let jobs = self.job_list(false, 0, 1).await?;
        Ok(jobs.into_iter().next())
    }

    // =========================================================================
    // Per-job operations, reached through `Job`
    // =========================================================================

    async fn job_call(
        &self,
        operation: &'static str,
        method: &str,
        job: &Job<'_>,
    ) -> Result<Value, ApiError> {
        self.ensure_logged_in(operation)?;
        self.send_for_job(method, job).await
    }

    /// Issue a single-id call; the caller has already checked the session.
    async fn send_for_job(&self, method: &str, job: &Job<'_>) -> Result<Value, ApiError> {
        self.transport.send(method, &[Value::from(job.id())]).await
    }

    fn ensure_finished(job: &Job<'_>) -> Result<(), ApiError> {
        if job.execution_status() == ExecutionStatus::Finished {
            Ok(())
        } else {
            Err(ApiError::JobNotFinished {
                job_id: job.id(),
                status: job.execution_status(),
            })
        }
    }

    pub(crate) async fn stop_job(&self, job: &Job<'_>) -> Result<(), ApiError> {
        self.job_call("stop", "job.stop", job).await.map(|_| ())
    }

    pub(crate) async fn resubmit_job(&self, job: &Job<'_>) -> Result<(), ApiError> {
        self.job_call("resubmit", "job.resubmit", job).await.map(|_| ())
    }

    pub(crate) async fn delete_job(&self, job: &Job<'_>) -> Result<(), ApiError> {
        self.job_call("delete", "job.delete", job).await.map(|_| ())
    }

    pub(crate) async fn set_job_public(&self, job: &Job<'_>, public: bool) -> Result<(), ApiError> {
        self.ensure_logged_in("set_public")?;
        let flag = if public { 1 } else { 0 };
        let _: IgnoredAny = self
            .transport
            .send("job.setpublic", &[Value::from(job.id()), Value::from(flag)])
            .await?;
        Ok(())
    }

    pub(crate) async fn job_public_status(&self, job: &Job<'_>) -> Result<bool, ApiError> {
        let result = self.job_call("public_status", "job.public", job).await?;
        Ok(parse_int("job.public", &result)? == 1)
    }

    pub(crate) async fn job_url(&self, job: &Job<'_>) -> Result<String, ApiError> {
        let result = self.job_call("url", "job.url", job).await?;
        parse_string("job.url", result)
    }

    pub(crate) async fn job_public_url(&self, job: &Job<'_>) -> Result<String, ApiError> {
        let result = self.job_call("public_url", "job.publicurl", job).await?;
        parse_string("job.publicurl", result)
    }

    pub(crate) async fn job_compiler_errors(&self, job: &Job<'_>) -> Result<String, ApiError> {
        let result = self
            .job_call("compiler_errors", "job.compilerErrors", job)
            .await?;
        parse_string("job.compilerErrors", result)
    }

    pub(crate) async fn job_source(&self, job: &Job<'_>) -> Result<String, ApiError> {
        let result = self.job_call("source", "job.source", job).await?;
        parse_string("job.source", result)
    }

    pub(crate) async fn job_output(&self, job: &Job<'_>) -> Result<Vec<u8>, ApiError> {
        self.ensure_logged_in("output")?;
        Self::ensure_finished(job)?;
        let result = self.send_for_job("job.output", job).await?;
        let url = parse_string("job.output", result)?;
        self.fetcher.fetch(&url).await
    }

    pub(crate) async fn job_output_size(&self, job: &Job<'_>) -> Result<i64, ApiError> {
        self.ensure_logged_in("output_size")?;
        Self::ensure_finished(job)?;
        let result = self.send_for_job("job.outputsize", job).await?;
        parse_int("job.outputsize", &result)
    }

    pub(crate) async fn job_output_hash(&self, job: &Job<'_>) -> Result<(i64, String), ApiError> {
        self.ensure_logged_in("output_hash")?;
        Self::ensure_finished(job)?;
        let result = self.send_for_job("job.outputhash", job).await?;
        parse_output_hash("job.outputhash", result)
    }
}

#[cfg(test)]
impl BoaClient {
    pub(crate) fn transport(&self) -> &SessionTransport {
        &self.transport
    }
}

impl fmt::Debug for BoaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoaClient")
            .field("endpoint", &self.endpoint())
            .field("logged_in", &self.is_logged_in())
            .finish_non_exhaustive()
    }
}
