//! Approval-gated execution engine for callplan.
//!
//! Resolves per-action approval, obtains an execution decision from an
//! external oracle (with a keyword fallback), dispatches the chosen tool,
//! and writes one audit record per run to the execution ledger.

pub mod decision;
pub mod error;
pub mod executor;
pub mod gate;
pub mod handler;
pub mod store;

pub use decision::{
    decide_with_fallback, DecisionContext, DecisionOracle, DisabledOracle, FallbackHeuristic,
    HttpDecisionOracle,
};
pub use error::{DecisionError, DispatchError, ExecutionError};
pub use executor::ExecutionEngine;
pub use gate::{plan_cleared, ApprovalGate, GateOutcome, StatusOrigin, AWAITING_APPROVAL};
pub use handler::{DispatchRequest, ToolDispatcher, ToolHandler, ToolResult};
pub use store::{ApprovalSource, ExecutionSink, PlanSource};
