//! Callplan storage crate - SQLite persistence for plans, approvals and
//! executions.
//!
//! Provides a WAL-mode SQLite database with migrations and one repository
//! per store: the plan store, the per-action approval ledger, and the
//! append-only execution ledger.

pub mod approvals;
pub mod db;
pub mod executions;
pub mod migrations;
pub mod plans;

pub use approvals::ApprovalRepository;
pub use db::Database;
pub use executions::{
    ActionExecutionFilters, ActionExecutionRow, ExecutionFilters, ExecutionRepository,
    ExecutionStats,
};
pub use plans::PlanRepository;
