//! Document tool handler.
//!
//! Writes the decided content as a Markdown document under `documents/`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use callplan_core::types::{Timestamp, Tool};

use crate::error::DispatchError;
use crate::handler::{write_artifact, DispatchRequest, ToolHandler, ToolResult};

pub struct DocumentHandler {
    output_dir: PathBuf,
}

impl DocumentHandler {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl ToolHandler for DocumentHandler {
    fn tool(&self) -> Tool {
        Tool::Document
    }

    async fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<ToolResult, DispatchError> {
        let content = request.content()?;
        let doc_type = request
            .decision
            .parameter_str("doc_type")
            .unwrap_or("action_summary");

        let document = format!(
            "<!-- doc_type: {} | plan: {} | action: {} | generated: {} -->\n\n{}\n",
            doc_type,
            request.plan_id,
            request.action.action_id,
            Timestamp::now().to_datetime().to_rfc3339(),
            content
        );

        let (id, path) =
            write_artifact(&self.output_dir, "documents", "md", document.as_bytes()).await?;

        tracing::info!(doc_type = %doc_type, bytes = document.len(), "Document generated");

        Ok(ToolResult {
            status: "generated".to_string(),
            artifact_path: Some(path.to_string_lossy().into_owned()),
            external_id: Some(id.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::*;

    #[tokio::test]
    async fn test_document_writes_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let handler = DocumentHandler::new(dir.path());
        let action = action("Summarise hardship discussion");
        let decision = decision(
            Tool::Document,
            "# Hardship summary\n\nBorrower lost income in March.",
            serde_json::json!({"doc_type": "hardship_note"}),
        );

        let result = handler.dispatch(&request(&action, &decision)).await.unwrap();
        assert_eq!(result.status, "generated");

        let path = result.artifact_path.unwrap();
        assert!(path.ends_with(".md"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("doc_type: hardship_note"));
        assert!(text.contains("Borrower lost income in March."));
    }

    #[tokio::test]
    async fn test_document_default_doc_type() {
        let dir = tempfile::tempdir().unwrap();
        let handler = DocumentHandler::new(dir.path());
        let action = action("Summarise");
        let decision = decision(Tool::Document, "Body", serde_json::json!({}));
        let result = handler.dispatch(&request(&action, &decision)).await.unwrap();
        let text = std::fs::read_to_string(result.artifact_path.unwrap()).unwrap();
        assert!(text.contains("doc_type: action_summary"));
    }

    #[tokio::test]
    async fn test_document_empty_content() {
        let dir = tempfile::tempdir().unwrap();
        let handler = DocumentHandler::new(dir.path());
        let action = action("Summarise");
        let decision = decision(Tool::Document, "\n", serde_json::json!({}));
        let err = handler.dispatch(&request(&action, &decision)).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidPayload(_)));
    }
}
