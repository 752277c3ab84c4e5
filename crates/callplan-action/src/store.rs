//! Storage seams consumed by the execution engine.
//!
//! The engine only sees these traits; the SQLite repositories implement
//! them, and tests substitute failing or counting doubles.

use callplan_core::error::CallplanError;
use callplan_core::types::{ActionPlan, ApprovalRecord, ExecutionRecord};
use callplan_storage::{
    ApprovalRepository, ExecutionRepository, ExecutionStats, PlanRepository,
};
use uuid::Uuid;

/// Read access to stored plans.
pub trait PlanSource: Send + Sync {
    fn get_plan(&self, plan_id: &str) -> Result<Option<ActionPlan>, CallplanError>;
}

/// Read access to the per-action approval ledger.
pub trait ApprovalSource: Send + Sync {
    fn get_approval(&self, action_id: &str) -> Result<Option<ApprovalRecord>, CallplanError>;
}

/// The execution ledger as seen by the engine.
pub trait ExecutionSink: Send + Sync {
    fn record_execution(&self, record: &ExecutionRecord) -> Result<(), CallplanError>;
    fn recent_executions(&self, limit: u64) -> Result<Vec<ExecutionRecord>, CallplanError>;
    fn execution_stats(&self, days: u32) -> Result<ExecutionStats, CallplanError>;
    fn delete_execution(&self, execution_id: Uuid) -> Result<bool, CallplanError>;
    fn delete_all_executions(&self) -> Result<u64, CallplanError>;
}

impl PlanSource for PlanRepository {
    fn get_plan(&self, plan_id: &str) -> Result<Option<ActionPlan>, CallplanError> {
        self.get(plan_id)
    }
}

impl ApprovalSource for ApprovalRepository {
    fn get_approval(&self, action_id: &str) -> Result<Option<ApprovalRecord>, CallplanError> {
        self.get(action_id)
    }
}

impl ExecutionSink for ExecutionRepository {
    fn record_execution(&self, record: &ExecutionRecord) -> Result<(), CallplanError> {
        self.save(record)
    }

    fn recent_executions(&self, limit: u64) -> Result<Vec<ExecutionRecord>, CallplanError> {
        self.recent(limit)
    }

    fn execution_stats(&self, days: u32) -> Result<ExecutionStats, CallplanError> {
        self.stats(days)
    }

    fn delete_execution(&self, execution_id: Uuid) -> Result<bool, CallplanError> {
        self.delete(execution_id)
    }

    fn delete_all_executions(&self) -> Result<u64, CallplanError> {
        self.delete_all()
    }
}
