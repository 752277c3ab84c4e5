//! Plan record store.
//!
//! Plans are stored as a JSON payload plus the scalar columns the approval
//! queue is filtered by. The columns are authoritative for queue state:
//! `row_to_plan` overlays them onto the decoded payload, so approvals never
//! have to rewrite the payload.

use std::sync::Arc;

use rusqlite::OptionalExtension;
use tracing::{debug, info};

use callplan_core::error::CallplanError;
use callplan_core::types::{ActionPlan, QueueStatus, Timestamp};

use crate::db::Database;

const PLAN_COLUMNS: &str = "plan_data, queue_status, approved_at, approved_by, \
     rejected_at, rejected_by, rejection_reason, created_at";

/// Repository for four-layer action plans keyed by plan id.
pub struct PlanRepository {
    db: Arc<Database>,
}

impl PlanRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a newly generated plan. The plan is validated first; a plan id
    /// that already exists is rejected.
    pub fn save(&self, plan: &ActionPlan) -> Result<(), CallplanError> {
        plan.validate()?;
        let payload = serde_json::to_string(plan)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO plans (plan_id, analysis_id, transcript_id, plan_data, risk_level,
                                    approval_route, queue_status, approved_at, approved_by,
                                    rejected_at, rejected_by, rejection_reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                rusqlite::params![
                    plan.plan_id,
                    plan.analysis_id,
                    plan.transcript_id,
                    payload,
                    plan.risk_level.as_str(),
                    plan.approval_route.as_str(),
                    plan.queue_status.as_str(),
                    plan.approved_at.map(|t| t.0),
                    plan.approved_by,
                    plan.rejected_at.map(|t| t.0),
                    plan.rejected_by,
                    plan.rejection_reason,
                    plan.created_at.0,
                ],
            )
            .map_err(|e| {
                CallplanError::Storage(format!("Failed to save plan {}: {}", plan.plan_id, e))
            })?;
            Ok(())
        })?;

        info!(
            plan_id = %plan.plan_id,
            route = %plan.approval_route,
            queue_status = %plan.queue_status,
            actions = plan.action_count(),
            "Plan stored"
        );
        Ok(())
    }

    /// Find a plan by id.
    pub fn get(&self, plan_id: &str) -> Result<Option<ActionPlan>, CallplanError> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM plans WHERE plan_id = ?1", PLAN_COLUMNS),
                rusqlite::params![plan_id],
                read_plan_row,
            )
            .optional()
            .map_err(|e| CallplanError::Storage(e.to_string()))
        })?;

        row.map(row_to_plan).transpose()
    }

    /// List plans, newest first, optionally restricted to one queue status.
    pub fn list(
        &self,
        queue_status: Option<QueueStatus>,
        limit: u64,
    ) -> Result<Vec<ActionPlan>, CallplanError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM plans
                     WHERE (?1 IS NULL OR queue_status = ?1)
                     ORDER BY created_at DESC, plan_id ASC
                     LIMIT ?2",
                    PLAN_COLUMNS
                ))
                .map_err(|e| CallplanError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![queue_status.map(|s| s.as_str()), limit as i64],
                    read_plan_row,
                )
                .map_err(|e| CallplanError::Storage(e.to_string()))?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| CallplanError::Storage(e.to_string()))
        })?;

        rows.into_iter().map(row_to_plan).collect()
    }

    /// Approve a plan that is waiting on an advisor or supervisor.
    pub fn approve(&self, plan_id: &str, approver: &str) -> Result<ActionPlan, CallplanError> {
        self.transition(plan_id, QueueStatus::Approved, approver, None)
    }

    /// Reject a plan that is waiting on an advisor or supervisor.
    pub fn reject(
        &self,
        plan_id: &str,
        approver: &str,
        reason: Option<&str>,
    ) -> Result<ActionPlan, CallplanError> {
        self.transition(plan_id, QueueStatus::Rejected, approver, reason)
    }

    /// Move a pending plan to a final queue status.
    ///
    /// The pending check and the write are one conditional `UPDATE`, so
    /// concurrent approvers on the same database cannot both succeed.
    fn transition(
        &self,
        plan_id: &str,
        to: QueueStatus,
        reviewer: &str,
        reason: Option<&str>,
    ) -> Result<ActionPlan, CallplanError> {
        let now = Timestamp::now();
        let changed = self.db.with_conn(|conn| {
            let result = match to {
                QueueStatus::Approved => conn.execute(
                    "UPDATE plans
                     SET queue_status = ?2, approved_at = ?3, approved_by = ?4
                     WHERE plan_id = ?1
                       AND queue_status IN ('pending_advisor', 'pending_supervisor')",
                    rusqlite::params![plan_id, to.as_str(), now.0, reviewer],
                ),
                _ => conn.execute(
                    "UPDATE plans
                     SET queue_status = ?2, rejected_at = ?3, rejected_by = ?4,
                         rejection_reason = ?5
                     WHERE plan_id = ?1
                       AND queue_status IN ('pending_advisor', 'pending_supervisor')",
                    rusqlite::params![plan_id, to.as_str(), now.0, reviewer, reason],
                ),
            };
            result.map_err(|e| CallplanError::Storage(format!("Failed to update plan: {}", e)))
        })?;

        let plan = self
            .get(plan_id)?
            .ok_or_else(|| CallplanError::plan_not_found(plan_id))?;

        if changed == 0 {
            return Err(CallplanError::Validation(format!(
                "Plan {} is already {}, cannot move to {}",
                plan_id, plan.queue_status, to
            )));
        }

        info!(plan_id, to = %to, reviewer, "Plan queue status changed");
        Ok(plan)
    }

    /// Delete a plan. Returns `true` if a row was removed.
    pub fn delete(&self, plan_id: &str) -> Result<bool, CallplanError> {
        let removed = self.db.with_conn(|conn| {
            conn.execute("DELETE FROM plans WHERE plan_id = ?1", rusqlite::params![plan_id])
                .map_err(|e| CallplanError::Storage(format!("Failed to delete plan: {}", e)))
        })?;
        debug!(plan_id, removed, "Plan delete");
        Ok(removed > 0)
    }
}

// ============================================================================
// Row conversion
// ============================================================================

struct PlanRow {
    plan_data: String,
    queue_status: String,
    approved_at: Option<i64>,
    approved_by: Option<String>,
    rejected_at: Option<i64>,
    rejected_by: Option<String>,
    rejection_reason: Option<String>,
    created_at: i64,
}

fn read_plan_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlanRow> {
    Ok(PlanRow {
        plan_data: row.get(0)?,
        queue_status: row.get(1)?,
        approved_at: row.get(2)?,
        approved_by: row.get(3)?,
        rejected_at: row.get(4)?,
        rejected_by: row.get(5)?,
        rejection_reason: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn row_to_plan(row: PlanRow) -> Result<ActionPlan, CallplanError> {
    let mut plan: ActionPlan = serde_json::from_str(&row.plan_data)?;
    plan.queue_status = row
        .queue_status
        .parse::<QueueStatus>()
        .map_err(CallplanError::Storage)?;
    plan.approved_at = row.approved_at.map(Timestamp);
    plan.approved_by = row.approved_by;
    plan.rejected_at = row.rejected_at.map(Timestamp);
    plan.rejected_by = row.rejected_by;
    plan.rejection_reason = row.rejection_reason;
    plan.created_at = Timestamp(row.created_at);
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use callplan_core::types::{
        ActionCore, ApprovalRoute, ApprovalStatus, BorrowerAction, BorrowerPlan, CallContext,
        RiskLevel,
    };

    fn make_repo() -> PlanRepository {
        PlanRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn make_plan(plan_id: &str, route: ApprovalRoute, created_at: i64) -> ActionPlan {
        ActionPlan {
            plan_id: plan_id.to_string(),
            analysis_id: format!("AN-{}", plan_id),
            transcript_id: format!("TR-{}", plan_id),
            risk_level: RiskLevel::Medium,
            approval_route: route,
            queue_status: match route {
                ApprovalRoute::AutoApproved => QueueStatus::Approved,
                ApprovalRoute::AdvisorApproval => QueueStatus::PendingAdvisor,
                ApprovalRoute::SupervisorApproval => QueueStatus::PendingSupervisor,
            },
            context: CallContext::default(),
            borrower: BorrowerPlan {
                immediate_actions: vec![BorrowerAction {
                    core: ActionCore {
                        action_id: format!("{}-b1", plan_id),
                        action: "Send confirmation email".to_string(),
                        description: "Confirm the payment plan".to_string(),
                        needs_approval: false,
                        approval_status: ApprovalStatus::AutoApproved,
                        risk_level: RiskLevel::Low,
                        auto_executable: true,
                    },
                    priority: Some("high".to_string()),
                    timeline: None,
                }],
                follow_ups: vec![],
            },
            advisor: vec![],
            supervisor: vec![],
            leadership: vec![],
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            rejected_by: None,
            rejection_reason: None,
            created_at: Timestamp(created_at),
        }
    }

    #[test]
    fn test_save_and_get() {
        let repo = make_repo();
        let plan = make_plan("P1", ApprovalRoute::AdvisorApproval, 1_700_000_000);
        repo.save(&plan).unwrap();

        let loaded = repo.get("P1").unwrap().unwrap();
        assert_eq!(loaded, plan);
        assert_eq!(loaded.queue_status, QueueStatus::PendingAdvisor);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let repo = make_repo();
        assert!(repo.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_save_fails() {
        let repo = make_repo();
        let plan = make_plan("P1", ApprovalRoute::AutoApproved, 1);
        repo.save(&plan).unwrap();
        let err = repo.save(&plan).unwrap_err();
        assert!(matches!(err, CallplanError::Storage(_)));
    }

    #[test]
    fn test_save_rejects_invalid_plan() {
        let repo = make_repo();
        let mut plan = make_plan("P1", ApprovalRoute::AutoApproved, 1);
        plan.borrower.immediate_actions[0].core.action_id = String::new();
        let err = repo.save(&plan).unwrap_err();
        assert!(matches!(err, CallplanError::Validation(_)));
        assert!(repo.get("P1").unwrap().is_none());
    }

    #[test]
    fn test_approve_updates_columns() {
        let repo = make_repo();
        repo.save(&make_plan("P1", ApprovalRoute::SupervisorApproval, 1))
            .unwrap();

        let approved = repo.approve("P1", "sup-7").unwrap();
        assert_eq!(approved.queue_status, QueueStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("sup-7"));

        let loaded = repo.get("P1").unwrap().unwrap();
        assert_eq!(loaded.queue_status, QueueStatus::Approved);
        assert_eq!(loaded.approved_by.as_deref(), Some("sup-7"));
        assert!(loaded.approved_at.is_some());
    }

    #[test]
    fn test_reject_records_reason() {
        let repo = make_repo();
        repo.save(&make_plan("P1", ApprovalRoute::AdvisorApproval, 1))
            .unwrap();

        let rejected = repo.reject("P1", "adv-2", Some("wrong customer")).unwrap();
        assert_eq!(rejected.rejected_by.as_deref(), Some("adv-2"));

        let loaded = repo.get("P1").unwrap().unwrap();
        assert_eq!(loaded.queue_status, QueueStatus::Rejected);
        assert_eq!(loaded.rejection_reason.as_deref(), Some("wrong customer"));
        assert_eq!(loaded.rejected_by.as_deref(), Some("adv-2"));
        assert!(loaded.rejected_at.is_some());
        assert!(loaded.approved_by.is_none());
        assert!(loaded.approved_at.is_none());
    }

    #[test]
    fn test_transition_from_final_state_fails() {
        let repo = make_repo();
        repo.save(&make_plan("P1", ApprovalRoute::AutoApproved, 1))
            .unwrap();

        let err = repo.approve("P1", "adv-1").unwrap_err();
        assert!(matches!(err, CallplanError::Validation(_)));

        repo.save(&make_plan("P2", ApprovalRoute::AdvisorApproval, 1))
            .unwrap();
        repo.reject("P2", "adv-1", None).unwrap();
        let err = repo.approve("P2", "adv-1").unwrap_err();
        assert!(err.to_string().contains("already rejected"));

        let loaded = repo.get("P2").unwrap().unwrap();
        assert_eq!(loaded.queue_status, QueueStatus::Rejected);
        assert!(loaded.approved_by.is_none());
    }

    #[test]
    fn test_concurrent_review_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("callplan.db");
        let first = PlanRepository::new(Arc::new(Database::new(&path).unwrap()));
        let second = PlanRepository::new(Arc::new(Database::new(&path).unwrap()));

        for i in 0..100 {
            let plan_id = format!("P{}", i);
            first
                .save(&make_plan(&plan_id, ApprovalRoute::AdvisorApproval, i))
                .unwrap();

            let barrier = std::sync::Barrier::new(2);
            let (approved, rejected) = std::thread::scope(|s| {
                let approve = s.spawn(|| {
                    barrier.wait();
                    first.approve(&plan_id, "adv-1")
                });
                let reject = s.spawn(|| {
                    barrier.wait();
                    second.reject(&plan_id, "adv-2", Some("duplicate"))
                });
                (approve.join().unwrap(), reject.join().unwrap())
            });

            assert!(
                approved.is_ok() != rejected.is_ok(),
                "exactly one reviewer must win for {}",
                plan_id
            );
            let stored = first.get(&plan_id).unwrap().unwrap();
            let expected = if approved.is_ok() {
                QueueStatus::Approved
            } else {
                QueueStatus::Rejected
            };
            assert_eq!(stored.queue_status, expected);
        }
    }

    #[test]
    fn test_approve_missing_plan_is_not_found() {
        let repo = make_repo();
        let err = repo.approve("ghost", "adv-1").unwrap_err();
        assert!(matches!(err, CallplanError::NotFound { .. }));
    }

    #[test]
    fn test_list_filters_and_orders() {
        let repo = make_repo();
        repo.save(&make_plan("P1", ApprovalRoute::AdvisorApproval, 100))
            .unwrap();
        repo.save(&make_plan("P2", ApprovalRoute::AutoApproved, 200))
            .unwrap();
        repo.save(&make_plan("P3", ApprovalRoute::AdvisorApproval, 300))
            .unwrap();

        let all = repo.list(None, 10).unwrap();
        let ids: Vec<&str> = all.iter().map(|p| p.plan_id.as_str()).collect();
        assert_eq!(ids, vec!["P3", "P2", "P1"]);

        let pending = repo.list(Some(QueueStatus::PendingAdvisor), 10).unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending
            .iter()
            .all(|p| p.queue_status == QueueStatus::PendingAdvisor));

        assert_eq!(repo.list(None, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_delete() {
        let repo = make_repo();
        repo.save(&make_plan("P1", ApprovalRoute::AutoApproved, 1))
            .unwrap();
        assert!(repo.delete("P1").unwrap());
        assert!(!repo.delete("P1").unwrap());
        assert!(repo.get("P1").unwrap().is_none());
    }
}
