//! Database schema migrations.
//!
//! Creates the plan store, approval ledger, and execution ledger tables.

use rusqlite::Connection;
use tracing::info;

use callplan_core::error::CallplanError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), CallplanError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| CallplanError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| CallplanError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: plans, action approvals, executions.
fn apply_v1(conn: &Connection) -> Result<(), CallplanError> {
    conn.execute_batch(
        "
        -- Plan store: JSON payload plus the columns the queue is queried by.
        CREATE TABLE IF NOT EXISTS plans (
            plan_id          TEXT PRIMARY KEY NOT NULL,
            analysis_id      TEXT NOT NULL,
            transcript_id    TEXT NOT NULL,
            plan_data        TEXT NOT NULL,
            risk_level       TEXT NOT NULL
                             CHECK (risk_level IN ('low', 'medium', 'high')),
            approval_route   TEXT NOT NULL
                             CHECK (approval_route IN ('auto_approved', 'advisor_approval', 'supervisor_approval')),
            queue_status     TEXT NOT NULL
                             CHECK (queue_status IN ('pending_advisor', 'pending_supervisor', 'approved', 'rejected')),
            approved_at      INTEGER,
            approved_by      TEXT,
            rejected_at      INTEGER,
            rejected_by      TEXT,
            rejection_reason TEXT,
            created_at       INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_plans_queue_status
            ON plans (queue_status, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_plans_transcript
            ON plans (transcript_id);

        -- Approval ledger: at most one record per action.
        CREATE TABLE IF NOT EXISTS action_approvals (
            action_id        TEXT PRIMARY KEY NOT NULL,
            plan_id          TEXT,
            approval_status  TEXT NOT NULL
                             CHECK (approval_status IN ('pending', 'approved', 'rejected')),
            approver_id      TEXT NOT NULL,
            timestamp        INTEGER NOT NULL,
            notes            TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_action_approvals_plan
            ON action_approvals (plan_id)
            WHERE plan_id IS NOT NULL;

        -- Execution ledger: one row per run.
        CREATE TABLE IF NOT EXISTS executions (
            execution_id       TEXT PRIMARY KEY NOT NULL,
            plan_id            TEXT NOT NULL,
            mode               TEXT NOT NULL,
            executed_at        INTEGER NOT NULL,
            status             TEXT NOT NULL
                               CHECK (status IN ('success', 'pending_approval', 'error')),
            artifacts_created  INTEGER NOT NULL DEFAULT 0,
            errors_count       INTEGER NOT NULL DEFAULT 0,
            payload            TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_executions_executed_at
            ON executions (executed_at DESC);

        CREATE INDEX IF NOT EXISTS idx_executions_plan
            ON executions (plan_id, executed_at DESC);

        -- Execution ledger: one row per action result.
        CREATE TABLE IF NOT EXISTS action_executions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            execution_id    TEXT NOT NULL,
            position        INTEGER NOT NULL,
            category        TEXT NOT NULL
                            CHECK (category IN ('borrower', 'advisor', 'supervisor', 'leadership')),
            action_id       TEXT NOT NULL,
            action          TEXT NOT NULL,
            tool_used       TEXT,
            status          TEXT NOT NULL
                            CHECK (status IN ('success', 'error', 'skipped')),
            artifact_path   TEXT,
            error_message   TEXT,
            reasoning       TEXT,
            executed_at     INTEGER NOT NULL,
            FOREIGN KEY (execution_id) REFERENCES executions(execution_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_action_executions_execution
            ON action_executions (execution_id, position);

        CREATE INDEX IF NOT EXISTS idx_action_executions_tool
            ON action_executions (tool_used, executed_at DESC);

        CREATE INDEX IF NOT EXISTS idx_action_executions_category
            ON action_executions (category, executed_at DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| CallplanError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_plans_queue_status_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO plans (plan_id, analysis_id, transcript_id, plan_data, risk_level,
                                approval_route, queue_status, created_at)
             VALUES ('P1', 'A1', 'T1', '{}', 'low', 'auto_approved', 'maybe', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_approval_status_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO action_approvals (action_id, approval_status, approver_id, timestamp)
             VALUES ('a1', 'auto_approved', 'x', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_action_executions_cascade_delete() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO executions (execution_id, plan_id, mode, executed_at, status, payload)
             VALUES ('e1', 'P1', 'auto', 0, 'success', '{}')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO action_executions (execution_id, position, category, action_id, action,
                                            tool_used, status, executed_at)
             VALUES ('e1', 0, 'borrower', 'b1', 'Send email', 'email', 'success', 0)",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM executions WHERE execution_id = 'e1'", [])
            .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM action_executions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_action_execution_requires_parent() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO action_executions (execution_id, position, category, action_id, action,
                                            status, executed_at)
             VALUES ('missing', 0, 'borrower', 'b1', 'x', 'skipped', 0)",
            [],
        );
        assert!(result.is_err());
    }
}
