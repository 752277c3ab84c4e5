//! Email tool handler.
//!
//! Renders the email as a JSON artifact under `emails/`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;

use callplan_core::types::{Timestamp, Tool};

use crate::error::DispatchError;
use crate::handler::{
    default_recipient, write_artifact, DispatchRequest, ToolHandler, ToolResult,
};

pub struct EmailHandler {
    output_dir: PathBuf,
}

impl EmailHandler {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl ToolHandler for EmailHandler {
    fn tool(&self) -> Tool {
        Tool::Email
    }

    async fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<ToolResult, DispatchError> {
        let body = request.content()?;
        let decision = request.decision;

        let to = decision
            .parameter_str("to")
            .unwrap_or_else(|| default_recipient(request.category));
        let subject = decision
            .parameter_str("subject")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Follow-up: {}", request.action.action));

        let email = json!({
            "plan_id": request.plan_id,
            "action_id": request.action.action_id,
            "to": to,
            "subject": subject,
            "body": body,
            "tone": decision.tone,
            "timing": decision.timing,
            "created_at": Timestamp::now().to_datetime().to_rfc3339(),
        });

        let (id, path) = write_artifact(
            &self.output_dir,
            "emails",
            "json",
            &serde_json::to_vec_pretty(&email)?,
        )
        .await?;

        tracing::info!(to = %to, subject = %subject, "Email sent");

        Ok(ToolResult {
            status: "sent".to_string(),
            artifact_path: Some(path.to_string_lossy().into_owned()),
            external_id: Some(id.to_string()),
        })
    }
}
