//! Tool handler registry and trait definition.
//!
//! Defines the `ToolHandler` async trait and the `ToolDispatcher` that maps
//! a decision's tool to exactly one registered handler.

pub mod callback;
pub mod crm_update;
pub mod document;
pub mod email;
pub mod notification;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use callplan_core::config::DispatchConfig;
use callplan_core::types::{ActionCategory, ActionCore, ExecutionDecision, Tool};

use crate::error::DispatchError;

pub use callback::CallbackHandler;
pub use crm_update::CrmUpdateHandler;
pub use document::DocumentHandler;
pub use email::EmailHandler;
pub use notification::{NotificationHandler, NotificationRateLimiter};

/// Everything a handler needs to carry out one decided action.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub plan_id: &'a str,
    pub category: ActionCategory,
    pub action: &'a ActionCore,
    pub decision: &'a ExecutionDecision,
}

impl DispatchRequest<'_> {
    /// The decision's content, rejected when blank.
    pub fn content(&self) -> Result<&str, DispatchError> {
        let content = self.decision.content.trim();
        if content.is_empty() {
            return Err(DispatchError::InvalidPayload(format!(
                "{} content must not be empty",
                self.decision.tool
            )));
        }
        Ok(content)
    }
}

/// Outcome of one successful dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    /// Tool-level status such as `sent` or `generated`.
    pub status: String,
    pub artifact_path: Option<String>,
    pub external_id: Option<String>,
}

/// A side-effecting tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn tool(&self) -> Tool;

    async fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<ToolResult, DispatchError>;
}

/// Registry mapping each tool to its handler.
pub struct ToolDispatcher {
    handlers: HashMap<Tool, Box<dyn ToolHandler>>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any handler for the same tool.
    pub fn register(&mut self, handler: Box<dyn ToolHandler>) {
        self.handlers.insert(handler.tool(), handler);
    }

    /// Register the file-backed default handlers for all five tools.
    pub fn register_defaults(&mut self, output_dir: &Path, config: &DispatchConfig) {
        self.register(Box::new(EmailHandler::new(output_dir)));
        self.register(Box::new(CallbackHandler::new(
            output_dir,
            config.callback_delay_hours,
        )));
        self.register(Box::new(DocumentHandler::new(output_dir)));
        self.register(Box::new(NotificationHandler::new(
            config.max_notifications_per_minute,
        )));
        self.register(Box::new(CrmUpdateHandler::new(output_dir)));
        debug!(output_dir = %output_dir.display(), "Default tool handlers registered");
    }

    pub fn get(&self, tool: Tool) -> Option<&dyn ToolHandler> {
        self.handlers.get(&tool).map(|h| h.as_ref())
    }

    pub fn is_registered(&self, tool: Tool) -> bool {
        self.handlers.contains_key(&tool)
    }

    /// Dispatch to the handler for the decision's tool. No retries.
    pub async fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<ToolResult, DispatchError> {
        let tool = request.decision.tool;
        let handler = self
            .get(tool)
            .ok_or(DispatchError::UnregisteredTool(tool))?;

        let result = handler.dispatch(request).await?;
        info!(
            plan_id = %request.plan_id,
            action_id = %request.action.action_id,
            tool = %tool,
            status = %result.status,
            "Tool dispatched"
        );
        Ok(result)
    }
}

impl Default for ToolDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Recipient used when a decision names none: the audience of the action's layer.
pub(crate) fn default_recipient(category: ActionCategory) -> &'static str {
    match category {
        ActionCategory::Borrower => "borrower",
        ActionCategory::Advisor => "advisor",
        ActionCategory::Supervisor => "supervisor",
        ActionCategory::Leadership => "leadership",
    }
}

/// Write one artifact file under `<root>/<subdir>/<id>.<ext>`, returning the
/// generated id and the file path.
pub(crate) async fn write_artifact(
    root: &Path,
    subdir: &str,
    ext: &str,
    contents: &[u8],
) -> Result<(Uuid, PathBuf), DispatchError> {
    let dir = root.join(subdir);
    tokio::fs::create_dir_all(&dir).await?;

    let id = Uuid::new_v4();
    let path = dir.join(format!("{}.{}", id, ext));
    tokio::fs::write(&path, contents).await?;
    Ok((id, path))
}
