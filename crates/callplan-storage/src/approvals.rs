//! Approval ledger.
//!
//! Per-action approval records, kept apart from the plan payload so an
//! approval workflow can clear individual actions without touching the plan.

use std::sync::Arc;

use rusqlite::OptionalExtension;
use tracing::info;

use callplan_core::error::CallplanError;
use callplan_core::types::{ApprovalRecord, ApprovalStatus, Timestamp};

use crate::db::Database;

const APPROVAL_COLUMNS: &str = "action_id, plan_id, approval_status, approver_id, timestamp, notes";

/// Repository for approval records keyed by action id.
pub struct ApprovalRepository {
    db: Arc<Database>,
}

impl ApprovalRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Find the approval record for an action, if one exists.
    pub fn get(&self, action_id: &str) -> Result<Option<ApprovalRecord>, CallplanError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM action_approvals WHERE action_id = ?1",
                        APPROVAL_COLUMNS
                    ),
                    rusqlite::params![action_id],
                    |row| Ok(row_to_approval(row)),
                )
                .optional()
                .map_err(|e| CallplanError::Storage(e.to_string()))?;

            row.transpose()
        })
    }

    /// Create or replace the approval record for an action.
    ///
    /// Only `pending`, `approved` and `rejected` can be written here;
    /// routing statuses such as `auto_approved` belong to the plan.
    pub fn record(&self, record: &ApprovalRecord) -> Result<(), CallplanError> {
        if !record.approval_status.is_ledger_status() {
            return Err(CallplanError::Validation(format!(
                "approval ledger does not accept status {}",
                record.approval_status
            )));
        }
        if record.action_id.trim().is_empty() {
            return Err(CallplanError::Validation(
                "action_id must not be empty".to_string(),
            ));
        }

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO action_approvals (action_id, plan_id, approval_status, approver_id, timestamp, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(action_id) DO UPDATE SET
                     plan_id = COALESCE(excluded.plan_id, action_approvals.plan_id),
                     approval_status = excluded.approval_status,
                     approver_id = excluded.approver_id,
                     timestamp = excluded.timestamp,
                     notes = excluded.notes",
                rusqlite::params![
                    record.action_id,
                    record.plan_id,
                    record.approval_status.as_str(),
                    record.approver_id,
                    record.timestamp.0,
                    record.notes,
                ],
            )
            .map_err(|e| CallplanError::Storage(format!("Failed to record approval: {}", e)))?;
            Ok(())
        })?;

        info!(
            action_id = %record.action_id,
            status = %record.approval_status,
            approver = %record.approver_id,
            "Action approval recorded"
        );
        Ok(())
    }

    /// Convenience wrapper that stamps the record with the current time.
    pub fn set_status(
        &self,
        action_id: &str,
        plan_id: Option<&str>,
        status: ApprovalStatus,
        approver_id: &str,
        notes: Option<&str>,
    ) -> Result<ApprovalRecord, CallplanError> {
        let record = ApprovalRecord {
            action_id: action_id.to_string(),
            plan_id: plan_id.map(str::to_string),
            approval_status: status,
            approver_id: approver_id.to_string(),
            timestamp: Timestamp::now(),
            notes: notes.map(str::to_string),
        };
        self.record(&record)?;
        Ok(record)
    }

    /// All approval records attached to a plan, ordered by action id.
    pub fn list_for_plan(&self, plan_id: &str) -> Result<Vec<ApprovalRecord>, CallplanError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM action_approvals WHERE plan_id = ?1 ORDER BY action_id ASC",
                    APPROVAL_COLUMNS
                ))
                .map_err(|e| CallplanError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![plan_id], |row| Ok(row_to_approval(row)))
                .map_err(|e| CallplanError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row.map_err(|e| CallplanError::Storage(e.to_string()))??);
            }
            Ok(records)
        })
    }

    /// Delete the approval record for an action. Returns `true` if removed.
    pub fn delete(&self, action_id: &str) -> Result<bool, CallplanError> {
        let removed = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM action_approvals WHERE action_id = ?1",
                rusqlite::params![action_id],
            )
            .map_err(|e| CallplanError::Storage(e.to_string()))
        })?;
        Ok(removed > 0)
    }
}

fn row_to_approval(row: &rusqlite::Row<'_>) -> Result<ApprovalRecord, CallplanError> {
    let status: String = row
        .get(2)
        .map_err(|e| CallplanError::Storage(e.to_string()))?;
    let timestamp: i64 = row
        .get(4)
        .map_err(|e| CallplanError::Storage(e.to_string()))?;

    Ok(ApprovalRecord {
        action_id: row
            .get(0)
            .map_err(|e| CallplanError::Storage(e.to_string()))?,
        plan_id: row
            .get(1)
            .map_err(|e| CallplanError::Storage(e.to_string()))?,
        approval_status: status
            .parse::<ApprovalStatus>()
            .map_err(CallplanError::Storage)?,
        approver_id: row
            .get(3)
            .map_err(|e| CallplanError::Storage(e.to_string()))?,
        timestamp: Timestamp(timestamp),
        notes: row
            .get(5)
            .map_err(|e| CallplanError::Storage(e.to_string()))?,
    })
}
