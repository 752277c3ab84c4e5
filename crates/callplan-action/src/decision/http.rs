//! HTTP-backed decision oracle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use callplan_core::config::OracleConfig;
use callplan_core::types::{ActionCategory, ActionCore, ExecutionDecision};

use super::{DecisionContext, DecisionOracle};
use crate::error::DecisionError;

/// Posts each action to a decision endpoint and parses the answer as an
/// `ExecutionDecision`. No retries.
pub struct HttpDecisionOracle {
    endpoint: String,
    model: String,
    timeout_secs: u64,
    client: Client,
}

#[derive(Debug, Serialize)]
struct DecisionRequest<'a> {
    model: &'a str,
    category: ActionCategory,
    action: &'a ActionCore,
    context: &'a DecisionContext,
}

/// Endpoints may answer with the decision at the top level or wrapped in a
/// `decision` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DecisionResponse {
    Wrapped { decision: ExecutionDecision },
    Bare(ExecutionDecision),
}

impl HttpDecisionOracle {
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .connect_timeout(Duration::from_secs(10))
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[async_trait]
impl DecisionOracle for HttpDecisionOracle {
    async fn decide(
        &self,
        action: &ActionCore,
        context: &DecisionContext,
        category: ActionCategory,
    ) -> Result<ExecutionDecision, DecisionError> {
        let request = DecisionRequest {
            model: &self.model,
            category,
            action,
            context,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DecisionError::Timeout(self.timeout_secs)
                } else {
                    DecisionError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DecisionError::Failed(format!("HTTP {}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DecisionError::Failed(e.to_string()))?;
        debug!(action_id = %action.action_id, bytes = body.len(), "Decision received");
        parse_decision(&body)
    }
}

/// Parse a decision body. Unknown tools and blank required fields are
/// malformed.
pub fn parse_decision(body: &str) -> Result<ExecutionDecision, DecisionError> {
    let decision = match serde_json::from_str::<DecisionResponse>(body)
        .map_err(|e| DecisionError::Malformed(e.to_string()))?
    {
        DecisionResponse::Wrapped { decision } => decision,
        DecisionResponse::Bare(decision) => decision,
    };

    if let Some(field) = decision.missing_field() {
        return Err(DecisionError::Malformed(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(decision)
}
