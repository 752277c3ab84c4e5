//! Execution ledger.
//!
//! Append-only audit store: one `executions` row per engine run holding the
//! full serialized record, and one `action_executions` row per action result
//! for filtered queries and histograms. Deletes are hard deletes.

use std::collections::BTreeMap;
use std::sync::Arc;

use rusqlite::types::ToSql;
use rusqlite::OptionalExtension;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use callplan_core::error::CallplanError;
use callplan_core::types::{
    ActionCategory, ActionResultStatus, ExecutionRecord, ExecutionStatus, Timestamp, Tool,
};

use crate::db::Database;

/// Filters for run-level queries. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilters {
    pub plan_id: Option<String>,
    pub status: Option<ExecutionStatus>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
    pub limit: Option<u64>,
}

/// Filters for action-level queries. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ActionExecutionFilters {
    pub plan_id: Option<String>,
    pub category: Option<ActionCategory>,
    pub tool: Option<Tool>,
    pub status: Option<ActionResultStatus>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
    pub limit: Option<u64>,
}

/// One stored action result, joined with its run's plan id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionExecutionRow {
    pub execution_id: Uuid,
    pub plan_id: String,
    pub position: u32,
    pub category: ActionCategory,
    pub action_id: String,
    pub action: String,
    pub tool_used: Option<Tool>,
    pub status: ActionResultStatus,
    pub artifact_path: Option<String>,
    pub error_message: Option<String>,
    pub reasoning: Option<String>,
    pub executed_at: Timestamp,
}

/// Aggregate statistics over a trailing window of days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionStats {
    pub window_days: u32,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub pending_approval_executions: u64,
    pub failed_executions: u64,
    /// Successful runs over all runs in the window, 0.0 when there are none.
    pub success_rate: f64,
    pub total_actions: u64,
    pub successful_actions: u64,
    pub failed_actions: u64,
    pub skipped_actions: u64,
    pub tool_usage: BTreeMap<String, u64>,
    pub category_usage: BTreeMap<String, u64>,
    pub total_artifacts: u64,
}

/// Repository for execution records and their action rows.
pub struct ExecutionRepository {
    db: Arc<Database>,
}

impl ExecutionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append one execution record and its action rows in a single
    /// transaction. Records are write-once: an existing id is an error.
    pub fn save(&self, record: &ExecutionRecord) -> Result<(), CallplanError> {
        let payload = serde_json::to_string(record)?;
        let execution_id = record.execution_id.to_string();

        self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| CallplanError::Storage(format!("Failed to begin transaction: {}", e)))?;

            tx.execute(
                "INSERT INTO executions (execution_id, plan_id, mode, executed_at, status,
                                         artifacts_created, errors_count, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    execution_id,
                    record.plan_id,
                    record.mode.as_str(),
                    record.executed_at.0,
                    record.status.as_str(),
                    record.artifacts_created.len() as i64,
                    record.errors.len() as i64,
                    payload,
                ],
            )
            .map_err(|e| CallplanError::Storage(format!("Failed to save execution: {}", e)))?;

            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO action_executions (execution_id, position, category, action_id,
                                                        action, tool_used, status, artifact_path,
                                                        error_message, reasoning, executed_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    )
                    .map_err(|e| CallplanError::Storage(e.to_string()))?;

                for (position, result) in record.results.iter().enumerate() {
                    let reasoning = result.reasoning.as_ref().or(result.skip_reason.as_ref());
                    stmt.execute(rusqlite::params![
                        execution_id,
                        position as i64,
                        result.category.as_str(),
                        result.action_id,
                        result.action,
                        result.tool_used.map(|t| t.as_str()),
                        result.status.as_str(),
                        result.artifact_path,
                        result.error_message,
                        reasoning,
                        record.executed_at.0,
                    ])
                    .map_err(|e| {
                        CallplanError::Storage(format!("Failed to save action result: {}", e))
                    })?;
                }
            }

            tx.commit()
                .map_err(|e| CallplanError::Storage(format!("Failed to commit execution: {}", e)))
        })?;

        info!(
            execution_id = %record.execution_id,
            plan_id = %record.plan_id,
            status = %record.status,
            results = record.results.len(),
            "Execution recorded"
        );
        Ok(())
    }

    /// Find one execution record by id.
    pub fn get(&self, execution_id: Uuid) -> Result<Option<ExecutionRecord>, CallplanError> {
        let payload: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT payload FROM executions WHERE execution_id = ?1",
                rusqlite::params![execution_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CallplanError::Storage(e.to_string()))
        })?;

        payload.map(|p| decode_record(&p)).transpose()
    }

    /// The most recent executions, newest first.
    pub fn recent(&self, limit: u64) -> Result<Vec<ExecutionRecord>, CallplanError> {
        self.query(&ExecutionFilters {
            limit: Some(limit),
            ..ExecutionFilters::default()
        })
    }

    /// Run-level query, newest first.
    pub fn query(&self, filters: &ExecutionFilters) -> Result<Vec<ExecutionRecord>, CallplanError> {
        let mut clauses = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref plan_id) = filters.plan_id {
            params.push(Box::new(plan_id.clone()));
            clauses.push(format!("plan_id = ?{}", params.len()));
        }
        if let Some(status) = filters.status {
            params.push(Box::new(status.as_str()));
            clauses.push(format!("status = ?{}", params.len()));
        }
        push_time_range(&mut clauses, &mut params, "executed_at", filters.since, filters.until);

        let sql = format!(
            "SELECT payload FROM executions{} ORDER BY executed_at DESC, rowid DESC{}",
            where_clause(&clauses),
            limit_clause(filters.limit)
        );

        let payloads: Vec<String> = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| CallplanError::Storage(format!("Execution query prepare: {}", e)))?;
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt
                .query_map(refs.as_slice(), |row| row.get(0))
                .map_err(|e| CallplanError::Storage(format!("Execution query: {}", e)))?;
            rows.collect::<Result<Vec<String>, _>>()
                .map_err(|e| CallplanError::Storage(e.to_string()))
        })?;

        payloads.iter().map(|p| decode_record(p)).collect()
    }

    /// Action-level query, newest run first and plan order within a run.
    pub fn query_actions(
        &self,
        filters: &ActionExecutionFilters,
    ) -> Result<Vec<ActionExecutionRow>, CallplanError> {
        let mut clauses = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref plan_id) = filters.plan_id {
            params.push(Box::new(plan_id.clone()));
            clauses.push(format!("e.plan_id = ?{}", params.len()));
        }
        if let Some(category) = filters.category {
            params.push(Box::new(category.as_str()));
            clauses.push(format!("a.category = ?{}", params.len()));
        }
        if let Some(tool) = filters.tool {
            params.push(Box::new(tool.as_str()));
            clauses.push(format!("a.tool_used = ?{}", params.len()));
        }
        if let Some(status) = filters.status {
            params.push(Box::new(status.as_str()));
            clauses.push(format!("a.status = ?{}", params.len()));
        }
        push_time_range(&mut clauses, &mut params, "a.executed_at", filters.since, filters.until);

        let sql = format!(
            "SELECT a.execution_id, e.plan_id, a.position, a.category, a.action_id, a.action,
                    a.tool_used, a.status, a.artifact_path, a.error_message, a.reasoning,
                    a.executed_at
             FROM action_executions a
             JOIN executions e ON e.execution_id = a.execution_id{}
             ORDER BY a.executed_at DESC, e.rowid DESC, a.position ASC{}",
            where_clause(&clauses),
            limit_clause(filters.limit)
        );

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| CallplanError::Storage(format!("Action query prepare: {}", e)))?;
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt
                .query_map(refs.as_slice(), |row| Ok(map_action_row(row)))
                .map_err(|e| CallplanError::Storage(format!("Action query: {}", e)))?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row.map_err(|e| CallplanError::Storage(e.to_string()))??);
            }
            Ok(results)
        })
    }

    /// Aggregate statistics for runs executed in the last `days` days.
    pub fn stats(&self, days: u32) -> Result<ExecutionStats, CallplanError> {
        let since = Timestamp::days_ago(days).0;

        self.db.with_conn(|conn| {
            let (total, successful, pending, failed, artifacts): (i64, i64, i64, i64, i64) = conn
                .query_row(
                    "SELECT COUNT(*),
                            COALESCE(SUM(status = 'success'), 0),
                            COALESCE(SUM(status = 'pending_approval'), 0),
                            COALESCE(SUM(status = 'error'), 0),
                            COALESCE(SUM(artifacts_created), 0)
                     FROM executions WHERE executed_at >= ?1",
                    rusqlite::params![since],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                )
                .map_err(|e| CallplanError::Storage(format!("Stats query: {}", e)))?;

            let (actions, ok_actions, err_actions, skipped_actions): (i64, i64, i64, i64) = conn
                .query_row(
                    "SELECT COUNT(*),
                            COALESCE(SUM(status = 'success'), 0),
                            COALESCE(SUM(status = 'error'), 0),
                            COALESCE(SUM(status = 'skipped'), 0)
                     FROM action_executions WHERE executed_at >= ?1",
                    rusqlite::params![since],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .map_err(|e| CallplanError::Storage(format!("Stats query: {}", e)))?;

            let tool_usage = histogram(
                conn,
                "SELECT tool_used, COUNT(*) FROM action_executions
                 WHERE executed_at >= ?1 AND tool_used IS NOT NULL
                 GROUP BY tool_used",
                since,
            )?;
            let category_usage = histogram(
                conn,
                "SELECT category, COUNT(*) FROM action_executions
                 WHERE executed_at >= ?1
                 GROUP BY category",
                since,
            )?;

            let success_rate = if total > 0 {
                successful as f64 / total as f64
            } else {
                0.0
            };

            Ok(ExecutionStats {
                window_days: days,
                total_executions: total as u64,
                successful_executions: successful as u64,
                pending_approval_executions: pending as u64,
                failed_executions: failed as u64,
                success_rate,
                total_actions: actions as u64,
                successful_actions: ok_actions as u64,
                failed_actions: err_actions as u64,
                skipped_actions: skipped_actions as u64,
                tool_usage,
                category_usage,
                total_artifacts: artifacts as u64,
            })
        })
    }

    /// Hard-delete one execution and its action rows. Returns `true` if a
    /// run was removed.
    pub fn delete(&self, execution_id: Uuid) -> Result<bool, CallplanError> {
        let removed = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM executions WHERE execution_id = ?1",
                rusqlite::params![execution_id.to_string()],
            )
            .map_err(|e| CallplanError::Storage(format!("Failed to delete execution: {}", e)))
        })?;
        if removed > 0 {
            warn!(%execution_id, "Execution deleted");
        }
        Ok(removed > 0)
    }

    /// Hard-delete every execution. Returns the number of runs removed.
    pub fn delete_all(&self) -> Result<u64, CallplanError> {
        let removed = self.db.with_conn(|conn| {
            conn.execute("DELETE FROM executions", [])
                .map_err(|e| CallplanError::Storage(format!("Failed to delete executions: {}", e)))
        })?;
        warn!(removed, "All executions deleted");
        Ok(removed as u64)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn decode_record(payload: &str) -> Result<ExecutionRecord, CallplanError> {
    serde_json::from_str(payload)
        .map_err(|e| CallplanError::Storage(format!("Corrupt execution payload: {}", e)))
}

fn push_time_range(
    clauses: &mut Vec<String>,
    params: &mut Vec<Box<dyn ToSql>>,
    column: &str,
    since: Option<Timestamp>,
    until: Option<Timestamp>,
) {
    if let Some(since) = since {
        params.push(Box::new(since.0));
        clauses.push(format!("{} >= ?{}", column, params.len()));
    }
    if let Some(until) = until {
        params.push(Box::new(until.0));
        clauses.push(format!("{} <= ?{}", column, params.len()));
    }
}

fn where_clause(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn limit_clause(limit: Option<u64>) -> String {
    limit.map(|l| format!(" LIMIT {}", l)).unwrap_or_default()
}

fn histogram(
    conn: &rusqlite::Connection,
    sql: &str,
    since: i64,
) -> Result<BTreeMap<String, u64>, CallplanError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| CallplanError::Storage(format!("Histogram prepare: {}", e)))?;
    let rows = stmt
        .query_map(rusqlite::params![since], |row| {
            let key: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((key, count as u64))
        })
        .map_err(|e| CallplanError::Storage(format!("Histogram query: {}", e)))?;

    rows.collect::<Result<BTreeMap<_, _>, _>>()
        .map_err(|e| CallplanError::Storage(e.to_string()))
}

fn map_action_row(row: &rusqlite::Row<'_>) -> Result<ActionExecutionRow, CallplanError> {
    let get_err = |e: rusqlite::Error| CallplanError::Storage(e.to_string());

    let execution_id: String = row.get(0).map_err(get_err)?;
    let position: i64 = row.get(2).map_err(get_err)?;
    let category: String = row.get(3).map_err(get_err)?;
    let tool_used: Option<String> = row.get(6).map_err(get_err)?;
    let status: String = row.get(7).map_err(get_err)?;
    let executed_at: i64 = row.get(11).map_err(get_err)?;

    Ok(ActionExecutionRow {
        execution_id: Uuid::parse_str(&execution_id)
            .map_err(|e| CallplanError::Storage(format!("Invalid UUID: {}", e)))?,
        plan_id: row.get(1).map_err(get_err)?,
        position: position as u32,
        category: category.parse().map_err(CallplanError::Storage)?,
        action_id: row.get(4).map_err(get_err)?,
        action: row.get(5).map_err(get_err)?,
        tool_used: tool_used
            .map(|t| t.parse::<Tool>())
            .transpose()
            .map_err(CallplanError::Storage)?,
        status: status.parse().map_err(CallplanError::Storage)?,
        artifact_path: row.get(8).map_err(get_err)?,
        error_message: row.get(9).map_err(get_err)?,
        reasoning: row.get(10).map_err(get_err)?,
        executed_at: Timestamp(executed_at),
    })
}
