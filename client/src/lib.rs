//! # Boa API Client
//!
//! Client library for the Boa infrastructure: log in, pick a dataset,
//! submit queries, track the resulting jobs and download their output.
//!
//! ## Modules
//!
//! - [`api`] - RPC transport, job handles and the client facade
//! - [`config`] - Configuration management
//!
//! ## Usage
//!
//! ```rust,no_run
//! use boa_api::{BoaClient, ClientConfig, WaitOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), boa_api::ApiError> {
//! let client = BoaClient::with_config(ClientConfig::default())?;
//! client.login("alice", "secret").await?;
//!
//! let dataset = client.get_dataset("2022 Jan/Java").await?;
//! let mut job = client.submit("# query", dataset.as_ref()).await?;
//!
//! let options = WaitOptions::new(Duration::from_secs(10)).with_timeout(Duration::from_secs(3600));
//! if job.wait_with(options).await? {
//!     println!("{}", job.output().await?);
//! } else {
//!     eprintln!("{}", job.compiler_errors().await?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;

// Re-export commonly used types
pub use api::{
    ApiError, BoaClient, CompilerStatus, Dataset, ExecutionStatus, Job, LoginResponse, Session,
    WaitOptions,
};
pub use config::{BOA_API_ENDPOINT, BOAC_API_ENDPOINT, ClientConfig};
