//! Error types for the execution engine.

use callplan_core::error::CallplanError;
use callplan_core::types::{ExecutionMode, ExecutionRecord, ExecutionStatus, Tool};

/// Errors from the decision oracle. All of them are recovered by the
/// fallback heuristic.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("Decision oracle unavailable: {0}")]
    Unavailable(String),
    #[error("Decision oracle failed: {0}")]
    Failed(String),
    #[error("Malformed decision: {0}")]
    Malformed(String),
    #[error("Decision oracle timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors from a single tool dispatch. Recorded as an `error` result for
/// that action only.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Tool not registered: {0}")]
    UnregisteredTool(Tool),
    #[error("Payload validation failed: {0}")]
    InvalidPayload(String),
    #[error("Tool dispatch failed: {0}")]
    Failed(String),
    #[error("Notification rate limit of {0} per minute exceeded")]
    RateLimited(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Run-level failures. These are the only conditions that turn a run's
/// status into `error`.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Plan not found: {0}")]
    PlanNotFound(String),
    #[error("Plan lookup failed: {0}")]
    PlanLookup(#[source] CallplanError),
    #[error("Failed to persist execution: {source}")]
    Persistence {
        record: Box<ExecutionRecord>,
        #[source]
        source: CallplanError,
    },
}

impl ExecutionError {
    /// Fold a run-level failure into the record returned to the caller.
    ///
    /// A persistence failure keeps the results of the run, since tool side
    /// effects already happened.
    pub fn into_record(self, plan_id: &str, mode: ExecutionMode) -> ExecutionRecord {
        match self {
            ExecutionError::Persistence { record, source } => {
                let mut record = *record;
                record.status = ExecutionStatus::Error;
                record.message = Some(format!("Failed to persist execution: {}", source));
                record
            }
            other => ExecutionRecord::failed(plan_id, mode, other.to_string()),
        }
    }
}
