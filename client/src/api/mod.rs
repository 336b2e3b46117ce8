//! Client side of the Boa RPC API.
//!
//! - `client` - The [`BoaClient`] facade
//! - `job` - Job handles, refresh and wait
//! - `status` - Compiler/execution status decoding
//! - `transport` - Session-carrying RPC transport
//! - `output` - Output download with redirect and gzip handling
//! - `records` - Record schemas and parsing
//! - `fault` - Error taxonomy

pub mod client;
pub mod fault;
pub mod job;
pub mod output;
pub mod records;
pub mod status;
pub mod transport;

pub use client::{BoaClient, DEFAULT_JOB_LIST_LENGTH, LoginResponse};
pub use fault::ApiError;
pub use job::{Job, WaitOptions};
pub use output::OutputFetcher;
pub use records::{Dataset, JobRecord};
pub use status::{CompilerStatus, ExecutionStatus, is_running};
pub use transport::{CSRF_HEADER, Session, SessionTransport};
