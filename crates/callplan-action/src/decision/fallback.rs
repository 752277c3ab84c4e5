//! Keyword-based decision synthesis used when the oracle cannot answer.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

use callplan_core::types::{ActionCategory, ActionCore, ExecutionDecision, Tool};

use super::DecisionContext;

/// Deterministic fallback. Matches on the action text, case-insensitively:
/// "email"/"send" picks email, then "call"/"callback" picks a callback
/// scheduled a day out, and anything else becomes an action summary
/// document.
pub struct FallbackHeuristic;

impl FallbackHeuristic {
    pub fn decide(
        action: &ActionCore,
        context: &DecisionContext,
        category: ActionCategory,
    ) -> ExecutionDecision {
        let text = action.action.to_lowercase();
        let tone = tone_for(context).to_string();

        if text.contains("email") || text.contains("send") {
            ExecutionDecision {
                tool: Tool::Email,
                content: format!(
                    "Thank you for speaking with us today. As discussed, we are following up on: {}.",
                    action.action
                ),
                tone,
                timing: "immediate".to_string(),
                parameters: Map::new(),
                reasoning: "Fallback: action text mentions email or send".to_string(),
            }
        } else if text.contains("call") || text.contains("callback") {
            let mut parameters = Map::new();
            parameters.insert(
                "scheduled_for".to_string(),
                Value::String((Utc::now() + Duration::days(1)).to_rfc3339()),
            );
            parameters.insert("notes".to_string(), Value::String(action.description.clone()));
            ExecutionDecision {
                tool: Tool::Callback,
                content: format!("Callback: {}", action.action),
                tone,
                timing: "scheduled".to_string(),
                parameters,
                reasoning: "Fallback: action text mentions a call".to_string(),
            }
        } else {
            let mut parameters = Map::new();
            parameters.insert("doc_type".to_string(), json!("action_summary"));
            ExecutionDecision {
                tool: Tool::Document,
                content: summary(action, category),
                tone,
                timing: "immediate".to_string(),
                parameters,
                reasoning: "Fallback: no channel keyword, documenting the action".to_string(),
            }
        }
    }
}

fn tone_for(context: &DecisionContext) -> &'static str {
    match context.customer_sentiment.as_deref() {
        Some("negative" | "frustrated" | "angry" | "upset") => "empathetic",
        _ => "professional",
    }
}

fn summary(action: &ActionCore, category: ActionCategory) -> String {
    let mut out = format!("# Action summary\n\n- Category: {}\n- Action: {}\n", category, action.action);
    if !action.description.is_empty() {
        out.push_str(&format!("- Details: {}\n", action.description));
    }
    out.push_str(&format!("- Risk level: {}\n", action.risk_level));
    out
}
