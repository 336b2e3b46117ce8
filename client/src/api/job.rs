//! # Job Handle
//!
//! A submitted job as seen from the client. Handles are only built from
//! records the server returns; the identifier never changes, while status
//! and timestamp are replaced by [`Job::refresh`].
//!
//! Every remote operation on a job goes through the owning
//! [`BoaClient`], which holds the session.

use std::fmt;
use std::future::pending;
use std::time::Duration;

use log::debug;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::api::client::BoaClient;
use crate::api::fault::ApiError;
use crate::api::records::{Dataset, JobRecord};
use crate::api::status::{self, CompilerStatus, ExecutionStatus};

/// How [`Job::wait_with`] polls.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Pause between status polls
    pub poll_interval: Duration,
    /// Give up after this long, if set
    pub timeout: Option<Duration>,
    /// Stop waiting when this token is cancelled, if set
    pub cancel: Option<CancellationToken>,
}

impl WaitOptions {
    /// Poll every `poll_interval` with no deadline and no cancellation.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            timeout: None,
            cancel: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Handle to one job on the service.
pub struct Job<'c> {
    client: &'c BoaClient,
    id: i64,
    submitted: String,
    dataset: Dataset,
    compiler_status: CompilerStatus,
    execution_status: ExecutionStatus,
}

impl<'c> Job<'c> {
    pub(crate) fn from_record(client: &'c BoaClient, record: JobRecord) -> Self {
        Self {
            client,
            id: record.id,
            submitted: record.submitted,
            dataset: record.input,
            compiler_status: CompilerStatus::from(record.compiler_status.as_str()),
            execution_status: ExecutionStatus::from(record.execution_status.as_str()),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Submission timestamp as reported by the server.
    pub fn submitted(&self) -> &str {
        &self.submitted
    }

    /// Dataset the job ran against.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn compiler_status(&self) -> CompilerStatus {
        self.compiler_status
    }

    pub fn execution_status(&self) -> ExecutionStatus {
        self.execution_status
    }

    /// Whether the job is still compiling or executing, per the last
    /// fetched status.
    pub fn is_running(&self) -> bool {
        status::is_running(self.compiler_status, self.execution_status)
    }

    /// Whether neither phase ended in an error, per the last fetched status.
    pub fn succeeded(&self) -> bool {
        status::succeeded(self.compiler_status, self.execution_status)
    }

    /// Re-fetch this job and overwrite its status and timestamp.
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        let fresh = self.client.get_job(self.id).await?;
        self.compiler_status = fresh.compiler_status;
        self.execution_status = fresh.execution_status;
        self.submitted = fresh.submitted;
        Ok(())
    }

    /// Block until the job settles, polling at the client's configured
    /// interval. Returns whether it succeeded.
    pub async fn wait(&mut self) -> Result<bool, ApiError> {
        let options = WaitOptions::new(self.client.config().poll_interval());
        self.wait_with(options).await
    }

    /// Poll until the job settles, the deadline passes or the token fires.
    ///
    /// Each round sleeps one interval, refreshes, then re-checks the status,
    /// so the cached status is never trusted without at least one refresh.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Neither phase ended in an error
    /// * `Ok(false)` - Compilation or execution failed
    /// * `Err(ApiError::WaitTimedOut)` - Still running at the deadline
    /// * `Err(ApiError::WaitCancelled)` - The cancellation token fired
    pub async fn wait_with(&mut self, options: WaitOptions) -> Result<bool, ApiError> {
        let started = Instant::now();
        let deadline = options.timeout.map(|timeout| started + timeout);
        let mut polls: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancelled(options.cancel.as_ref()) => {
                    return Err(ApiError::WaitCancelled { job_id: self.id });
                }
                _ = deadline_reached(deadline) => {
                    return Err(ApiError::WaitTimedOut {
                        job_id: self.id,
                        timeout: options.timeout.unwrap_or_default(),
                    });
                }
                _ = sleep(options.poll_interval) => {}
            }

            self.refresh().await?;
            polls += 1;
            debug!(
                "[API] Job {} poll {}: compiler {}, execution {}",
                self.id, polls, self.compiler_status, self.execution_status
            );

            if !self.is_running() {
                break;
            }
        }

        debug!(
            "[API] Job {} settled after {} poll(s) in {:?}",
            self.id,
            polls,
            started.elapsed()
        );
        Ok(self.succeeded())
    }

    /// Stop the job if it is running.
    pub async fn stop(&self) -> Result<(), ApiError> {
        self.client.stop_job(self).await
    }

    /// Resubmit this job.
    pub async fn resubmit(&self) -> Result<(), ApiError> {
        self.client.resubmit_job(self).await
    }

    /// Delete this job from the service.
    pub async fn delete(&self) -> Result<(), ApiError> {
        self.client.delete_job(self).await
    }

    /// Make the job public (`true`) or private (`false`).
    pub async fn set_public(&self, public: bool) -> Result<(), ApiError> {
        self.client.set_job_public(self, public).await
    }

    /// Whether the job is currently public.
    pub async fn public_status(&self) -> Result<bool, ApiError> {
        self.client.job_public_status(self).await
    }

    /// URL of the job's page.
    pub async fn url(&self) -> Result<String, ApiError> {
        self.client.job_url(self).await
    }

    /// URL of the job's public page.
    pub async fn public_url(&self) -> Result<String, ApiError> {
        self.client.job_public_url(self).await
    }

    /// Errors from compiling the query, if any.
    pub async fn compiler_errors(&self) -> Result<String, ApiError> {
        self.client.job_compiler_errors(self).await
    }

    /// Source of the submitted query.
    pub async fn source(&self) -> Result<String, ApiError> {
        self.client.job_source(self).await
    }

    /// Output of a finished job as text.
    pub async fn output(&self) -> Result<String, ApiError> {
        let bytes = self.client.job_output(self).await?;
        String::from_utf8(bytes)
            .map_err(|e| ApiError::malformed_with(format!("Output of job {} is not UTF-8", self.id), e))
    }

    /// Output of a finished job as raw bytes.
    pub async fn output_bytes(&self) -> Result<Vec<u8>, ApiError> {
        self.client.job_output(self).await
    }

    /// Size in bytes of a finished job's output.
    pub async fn output_size(&self) -> Result<i64, ApiError> {
        self.client.job_output_size(self).await
    }

    /// Size and hash of a finished job's output.
    pub async fn output_hash(&self) -> Result<(i64, String), ApiError> {
        self.client.job_output_hash(self).await
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => pending().await,
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

impl fmt::Debug for Job<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("submitted", &self.submitted)
            .field("dataset", &self.dataset)
            .field("compiler_status", &self.compiler_status)
            .field("execution_status", &self.execution_status)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Job<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id: {}, date: {}, dataset: {}, compiler_status: ({}), execution_status: ({})",
            self.id, self.submitted, self.dataset, self.compiler_status, self.execution_status
        )
    }
}
