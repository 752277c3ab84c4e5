//! Approval-gated execution engine.
//!
//! Runs one stored plan through the plan gate, then walks every action in
//! fixed order (borrower immediate, borrower follow-ups, advisor,
//! supervisor, leadership) through approval gate, decision and dispatch.
//! A failing action becomes an `error` result and the loop continues; only
//! plan lookup and the final ledger write can fail the run.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use callplan_core::error::CallplanError;
use callplan_core::types::{
    ActionExecutionResult, ActionPlan, ActionResultStatus, ExecutionMode, ExecutionRecord,
    ExecutionStatus, PlanAction,
};
use callplan_storage::{
    ApprovalRepository, Database, ExecutionRepository, ExecutionStats, PlanRepository,
};

use crate::decision::{decide_with_fallback, DecisionContext, DecisionOracle};
use crate::error::ExecutionError;
use crate::gate::{plan_cleared, ApprovalGate};
use crate::handler::{DispatchRequest, ToolDispatcher};
use crate::store::{ApprovalSource, ExecutionSink, PlanSource};

pub struct ExecutionEngine {
    plans: Arc<dyn PlanSource>,
    gate: ApprovalGate,
    oracle: Arc<dyn DecisionOracle>,
    dispatcher: Arc<ToolDispatcher>,
    ledger: Arc<dyn ExecutionSink>,
}

impl ExecutionEngine {
    pub fn new(
        plans: Arc<dyn PlanSource>,
        approvals: Arc<dyn ApprovalSource>,
        oracle: Arc<dyn DecisionOracle>,
        dispatcher: Arc<ToolDispatcher>,
        ledger: Arc<dyn ExecutionSink>,
    ) -> Self {
        Self {
            plans,
            gate: ApprovalGate::new(approvals),
            oracle,
            dispatcher,
            ledger,
        }
    }

    /// Wire the engine to the SQLite repositories of one database.
    pub fn with_database(
        db: Arc<Database>,
        oracle: Arc<dyn DecisionOracle>,
        dispatcher: Arc<ToolDispatcher>,
    ) -> Self {
        Self::new(
            Arc::new(PlanRepository::new(Arc::clone(&db))),
            Arc::new(ApprovalRepository::new(Arc::clone(&db))),
            oracle,
            dispatcher,
            Arc::new(ExecutionRepository::new(db)),
        )
    }

    /// Execute a plan and always return a record. Run-level failures come
    /// back as records with status `error` and a message.
    pub async fn execute_action_plan(&self, plan_id: &str, mode: ExecutionMode) -> ExecutionRecord {
        match self.try_execute(plan_id, mode).await {
            Ok(record) => record,
            Err(e) => {
                warn!(plan_id = %plan_id, error = %e, "Execution failed");
                e.into_record(plan_id, mode)
            }
        }
    }

    /// Execute a plan, surfacing run-level failures as errors.
    pub async fn try_execute(
        &self,
        plan_id: &str,
        mode: ExecutionMode,
    ) -> Result<ExecutionRecord, ExecutionError> {
        let plan = self
            .plans
            .get_plan(plan_id)
            .map_err(ExecutionError::PlanLookup)?
            .ok_or_else(|| ExecutionError::PlanNotFound(plan_id.to_string()))?;

        if !plan_cleared(&plan, mode) {
            info!(
                plan_id = %plan_id,
                mode = %mode,
                queue_status = %plan.queue_status,
                "Plan not approved, nothing dispatched"
            );
            let record = ExecutionRecord::new(
                plan_id,
                mode,
                ExecutionStatus::PendingApproval,
                Vec::new(),
                Some(format!(
                    "Plan is {}; {} mode requires an approved plan",
                    plan.queue_status, mode
                )),
            );
            return self.persist(record);
        }

        let context = DecisionContext::from_plan(&plan);
        let mut results = Vec::with_capacity(plan.action_count());
        for action in plan.actions() {
            results.push(self.execute_action(&plan, &context, action).await);
        }

        let record = ExecutionRecord::new(plan_id, mode, ExecutionStatus::Success, results, None);
        info!(
            plan_id = %plan_id,
            execution_id = %record.execution_id,
            succeeded = record.count(ActionResultStatus::Success),
            failed = record.count(ActionResultStatus::Error),
            skipped = record.count(ActionResultStatus::Skipped),
            artifacts = record.artifacts_created.len(),
            "Plan executed"
        );
        self.persist(record)
    }

    async fn execute_action(
        &self,
        plan: &ActionPlan,
        context: &DecisionContext,
        action: PlanAction<'_>,
    ) -> ActionExecutionResult {
        let core = action.core();
        let category = action.category();

        if let Some(reason) = self.gate.check(core).skip_reason() {
            return ActionExecutionResult::skipped(category, core, reason);
        }

        let (decision, source) =
            decide_with_fallback(self.oracle.as_ref(), core, context, category).await;

        let request = DispatchRequest {
            plan_id: &plan.plan_id,
            category,
            action: core,
            decision: &decision,
        };

        let mut result = match self.dispatcher.dispatch(&request).await {
            Ok(tool_result) => {
                let mut result = ActionExecutionResult::succeeded(category, core, decision.tool);
                result.tool_status = Some(tool_result.status);
                result.artifact_path = tool_result.artifact_path;
                result.external_id = tool_result.external_id;
                result
            }
            Err(e) => {
                warn!(
                    plan_id = %plan.plan_id,
                    action_id = %core.action_id,
                    tool = %decision.tool,
                    error = %e,
                    "Tool dispatch failed"
                );
                ActionExecutionResult::failed(category, core, Some(decision.tool), e.to_string())
            }
        };

        if !decision.reasoning.is_empty() {
            result.reasoning = Some(decision.reasoning);
        }
        result.decision_source = Some(source);
        result
    }

    fn persist(&self, record: ExecutionRecord) -> Result<ExecutionRecord, ExecutionError> {
        match self.ledger.record_execution(&record) {
            Ok(()) => Ok(record),
            Err(source) => Err(ExecutionError::Persistence {
                record: Box::new(record),
                source,
            }),
        }
    }

    pub fn get_recent_executions(&self, limit: u64) -> Result<Vec<ExecutionRecord>, CallplanError> {
        self.ledger.recent_executions(limit)
    }

    pub fn get_execution_stats(&self, days: u32) -> Result<ExecutionStats, CallplanError> {
        self.ledger.execution_stats(days)
    }

    pub fn delete_execution(&self, execution_id: Uuid) -> Result<bool, CallplanError> {
        self.ledger.delete_execution(execution_id)
    }

    pub fn delete_all_executions(&self) -> Result<u64, CallplanError> {
        self.ledger.delete_all_executions()
    }
}
