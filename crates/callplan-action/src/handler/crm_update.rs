//! CRM update tool handler.
//!
//! Records the account update as a JSON artifact under `crm/`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;

use callplan_core::types::{Timestamp, Tool};

use crate::error::DispatchError;
use crate::handler::{write_artifact, DispatchRequest, ToolHandler, ToolResult};

pub struct CrmUpdateHandler {
    output_dir: PathBuf,
}

impl CrmUpdateHandler {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl ToolHandler for CrmUpdateHandler {
    fn tool(&self) -> Tool {
        Tool::CrmUpdate
    }

    async fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<ToolResult, DispatchError> {
        let note = request.content()?;

        let update = json!({
            "plan_id": request.plan_id,
            "action_id": request.action.action_id,
            "category": request.category,
            "note": note,
            "fields": request.decision.parameters,
            "updated_at": Timestamp::now().to_datetime().to_rfc3339(),
        });

        let (id, path) = write_artifact(
            &self.output_dir,
            "crm",
            "json",
            &serde_json::to_vec_pretty(&update)?,
        )
        .await?;

        tracing::info!(fields = request.decision.parameters.len(), "CRM record updated");

        Ok(ToolResult {
            status: "updated".to_string(),
            artifact_path: Some(path.to_string_lossy().into_owned()),
            external_id: Some(id.to_string()),
        })
    }
}
