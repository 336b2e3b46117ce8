//! # Job Status
//!
//! Compiler and execution status values reported for a job, and the
//! derived "still running" predicate built from both of them.
//!
//! A job moves through two phases on independent tracks: the query is
//! compiled first, then executed. Each track goes
//! `Waiting -> Running -> Finished`, and either can end in `Error`.

use serde::Serialize;
use std::fmt;

/// Status of the compile phase of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompilerStatus {
    Waiting,
    Running,
    Finished,
    Error,
}

/// Status of the execution phase of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExecutionStatus {
    Waiting,
    Running,
    Finished,
    Error,
}

/// Any status string the server sends that is not one of the three known
/// literals decodes to `Error`.
impl From<&str> for CompilerStatus {
    fn from(s: &str) -> Self {
        match s {
            "Waiting" => CompilerStatus::Waiting,
            "Running" => CompilerStatus::Running,
            "Finished" => CompilerStatus::Finished,
            _ => CompilerStatus::Error,
        }
    }
}

impl From<&str> for ExecutionStatus {
    fn from(s: &str) -> Self {
        match s {
            "Waiting" => ExecutionStatus::Waiting,
            "Running" => ExecutionStatus::Running,
            "Finished" => ExecutionStatus::Finished,
            _ => ExecutionStatus::Error,
        }
    }
}

impl CompilerStatus {
    /// Wire literal for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerStatus::Waiting => "Waiting",
            CompilerStatus::Running => "Running",
            CompilerStatus::Finished => "Finished",
            CompilerStatus::Error => "Error",
        }
    }
}

impl ExecutionStatus {
    /// Wire literal for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Waiting => "Waiting",
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Finished => "Finished",
            ExecutionStatus::Error => "Error",
        }
    }
}

impl fmt::Display for CompilerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check whether a job with the given statuses is still in progress.
///
/// Execution only starts once compilation has finished, so a finished
/// compile with execution still waiting counts as in progress.
pub fn is_running(compiler: CompilerStatus, execution: ExecutionStatus) -> bool {
    matches!(compiler, CompilerStatus::Running | CompilerStatus::Waiting)
        || execution == ExecutionStatus::Running
        || (execution == ExecutionStatus::Waiting && compiler == CompilerStatus::Finished)
}

/// Check whether a settled job succeeded, i.e. neither phase ended in error.
pub fn succeeded(compiler: CompilerStatus, execution: ExecutionStatus) -> bool {
    !(compiler == CompilerStatus::Error || execution == ExecutionStatus::Error)
}
