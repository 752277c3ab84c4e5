//! Approval gating for plans and individual actions.
//!
//! The plan-level gate decides whether a run may dispatch at all; the
//! per-action gate resolves each action's approval status, preferring the
//! approval ledger over the status embedded in the plan.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use callplan_core::types::{ActionCore, ActionPlan, ApprovalStatus, ExecutionMode, QueueStatus};

use crate::store::ApprovalSource;

/// Skip reason attached to every action held back by the gate.
pub const AWAITING_APPROVAL: &str = "Awaiting approval";

/// Where a resolved approval status came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusOrigin {
    Ledger,
    Plan,
}

/// Result of gating one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOutcome {
    pub cleared: bool,
    pub status: ApprovalStatus,
    pub origin: StatusOrigin,
}

impl GateOutcome {
    pub fn skip_reason(&self) -> Option<&'static str> {
        (!self.cleared).then_some(AWAITING_APPROVAL)
    }
}

/// Whether a run in `mode` may proceed to per-action dispatch.
///
/// `auto` requires the plan to be approved; `manual` bypasses the check.
pub fn plan_cleared(plan: &ActionPlan, mode: ExecutionMode) -> bool {
    match mode {
        ExecutionMode::Manual => true,
        ExecutionMode::Auto => plan.queue_status == QueueStatus::Approved,
    }
}

/// Per-action approval gate backed by the approval ledger.
pub struct ApprovalGate {
    approvals: Arc<dyn ApprovalSource>,
}

impl ApprovalGate {
    pub fn new(approvals: Arc<dyn ApprovalSource>) -> Self {
        Self { approvals }
    }

    /// Resolve the approval status of one action.
    ///
    /// A ledger record wins over the embedded status. A failed ledger
    /// lookup is logged and the embedded status is used instead.
    pub fn check(&self, action: &ActionCore) -> GateOutcome {
        let (status, origin) = match self.approvals.get_approval(&action.action_id) {
            Ok(Some(record)) => (record.approval_status, StatusOrigin::Ledger),
            Ok(None) => (action.approval_status, StatusOrigin::Plan),
            Err(e) => {
                warn!(
                    action_id = %action.action_id,
                    error = %e,
                    "Approval ledger lookup failed, using plan status"
                );
                (action.approval_status, StatusOrigin::Plan)
            }
        };

        let outcome = GateOutcome {
            cleared: status.is_cleared(),
            status,
            origin,
        };
        debug!(
            action_id = %action.action_id,
            status = %outcome.status,
            origin = ?outcome.origin,
            cleared = outcome.cleared,
            "Action gated"
        );
        outcome
    }
}
