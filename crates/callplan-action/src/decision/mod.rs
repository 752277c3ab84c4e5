//! Execution decisions: the external oracle and its deterministic fallback.
//!
//! The oracle is consumed, not owned. Any failure or malformed answer from
//! it is replaced by the keyword fallback, so every cleared action always
//! receives a decision.

pub mod fallback;
pub mod http;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use callplan_core::types::{
    ActionCategory, ActionCore, ActionPlan, DecisionSource, ExecutionDecision, RiskLevel,
};

use crate::error::DecisionError;

pub use fallback::FallbackHeuristic;
pub use http::HttpDecisionOracle;

/// Call signals handed to the oracle alongside each action.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecisionContext {
    pub customer_sentiment: Option<String>,
    pub urgency: Option<String>,
    pub risk_level: RiskLevel,
    pub primary_intent: Option<String>,
}

impl DecisionContext {
    pub fn from_plan(plan: &ActionPlan) -> Self {
        Self {
            customer_sentiment: plan.context.customer_sentiment.clone(),
            urgency: plan.context.urgency.clone(),
            risk_level: plan.risk_level,
            primary_intent: plan.context.primary_intent.clone(),
        }
    }
}

/// External capability that decides how an action should be carried out.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(
        &self,
        action: &ActionCore,
        context: &DecisionContext,
        category: ActionCategory,
    ) -> Result<ExecutionDecision, DecisionError>;
}

/// Oracle used when no endpoint is configured. Every call fails, so every
/// decision comes from the fallback.
pub struct DisabledOracle;

#[async_trait]
impl DecisionOracle for DisabledOracle {
    async fn decide(
        &self,
        _action: &ActionCore,
        _context: &DecisionContext,
        _category: ActionCategory,
    ) -> Result<ExecutionDecision, DecisionError> {
        Err(DecisionError::Unavailable(
            "no decision endpoint configured".to_string(),
        ))
    }
}

/// Ask the oracle, falling back to the keyword heuristic on any failure or
/// on a decision with a blank required field. Never fails.
pub async fn decide_with_fallback(
    oracle: &dyn DecisionOracle,
    action: &ActionCore,
    context: &DecisionContext,
    category: ActionCategory,
) -> (ExecutionDecision, DecisionSource) {
    let failure = match oracle.decide(action, context, category).await {
        Ok(decision) => match decision.missing_field() {
            None => return (decision, DecisionSource::Oracle),
            Some(field) => DecisionError::Malformed(format!("{} must not be empty", field)),
        },
        Err(e) => e,
    };

    warn!(
        action_id = %action.action_id,
        error = %failure,
        "Decision oracle failed, using fallback heuristic"
    );
    (
        FallbackHeuristic::decide(action, context, category),
        DecisionSource::Fallback,
    )
}
