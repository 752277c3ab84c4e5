//! Callback tool handler.
//!
//! Schedules a callback by writing a JSON artifact under `callbacks/`.
//! A decision without `scheduled_for` gets the configured default delay.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use callplan_core::types::Tool;

use crate::error::DispatchError;
use crate::handler::{write_artifact, DispatchRequest, ToolHandler, ToolResult};

pub struct CallbackHandler {
    output_dir: PathBuf,
    default_delay_hours: u32,
}

impl CallbackHandler {
    pub fn new(output_dir: &Path, default_delay_hours: u32) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            default_delay_hours,
        }
    }

    fn scheduled_for(&self, request: &DispatchRequest<'_>) -> Result<DateTime<Utc>, DispatchError> {
        match request.decision.parameter_str("scheduled_for") {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    DispatchError::InvalidPayload(format!("invalid scheduled_for '{}': {}", raw, e))
                }),
            None => Ok(Utc::now() + Duration::hours(i64::from(self.default_delay_hours))),
        }
    }
}

#[async_trait]
impl ToolHandler for CallbackHandler {
    fn tool(&self) -> Tool {
        Tool::Callback
    }

    async fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<ToolResult, DispatchError> {
        let script = request.content()?;
        let scheduled_for = self.scheduled_for(request)?;
        let notes = request
            .decision
            .parameter_str("notes")
            .unwrap_or(request.action.description.as_str());

        let callback = json!({
            "plan_id": request.plan_id,
            "action_id": request.action.action_id,
            "scheduled_for": scheduled_for.to_rfc3339(),
            "script": script,
            "notes": notes,
            "tone": request.decision.tone,
        });

        let (id, path) = write_artifact(
            &self.output_dir,
            "callbacks",
            "json",
            &serde_json::to_vec_pretty(&callback)?,
        )
        .await?;

        tracing::info!(scheduled_for = %scheduled_for, "Callback scheduled");

        Ok(ToolResult {
            status: "scheduled".to_string(),
            artifact_path: Some(path.to_string_lossy().into_owned()),
            external_id: Some(id.to_string()),
        })
    }
}
