//! Notification tool handler.
//!
//! Delivers internal notifications to advisors, supervisors and leadership.
//! Nothing is written to disk; delivery is logged and rate-limited.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use callplan_core::types::Tool;

use crate::error::DispatchError;
use crate::handler::{default_recipient, DispatchRequest, ToolHandler, ToolResult};

/// Token-bucket rate limiter for notification delivery.
///
/// Allows at most N notifications per minute.
pub struct NotificationRateLimiter {
    max_per_minute: u32,
    tokens: Mutex<(u32, Instant)>,
}

impl NotificationRateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            tokens: Mutex::new((max_per_minute, Instant::now())),
        }
    }

    /// Try to take a token. Returns `false` when the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        if state.1.elapsed() >= Duration::from_secs(60) {
            state.0 = self.max_per_minute;
            state.1 = Instant::now();
        }
        if state.0 > 0 {
            state.0 -= 1;
            true
        } else {
            false
        }
    }

    pub fn max_per_minute(&self) -> u32 {
        self.max_per_minute
    }
}

pub struct NotificationHandler {
    limiter: NotificationRateLimiter,
}

impl NotificationHandler {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            limiter: NotificationRateLimiter::new(max_per_minute),
        }
    }
}

#[async_trait]
impl ToolHandler for NotificationHandler {
    fn tool(&self) -> Tool {
        Tool::Notification
    }

    async fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<ToolResult, DispatchError> {
        let message = request.content()?;

        if !self.limiter.try_acquire() {
            return Err(DispatchError::RateLimited(self.limiter.max_per_minute()));
        }

        let recipient = request
            .decision
            .parameter_str("recipient")
            .unwrap_or_else(|| default_recipient(request.category));
        let id = Uuid::new_v4();

        tracing::info!(
            notification_id = %id,
            recipient = %recipient,
            message = %message,
            "Notification delivered"
        );

        Ok(ToolResult {
            status: "delivered".to_string(),
            artifact_path: None,
            external_id: Some(id.to_string()),
        })
    }
}
