//! Core domain types for call action plans, approvals, and execution records.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CallplanError, Result};

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum whose
/// wire form is a fixed snake_case string.
macro_rules! string_enum {
    ($name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Unknown {}: {}", $label, s)),
                }
            }
        }
    };
}

// =============================================================================
// Temporal
// =============================================================================

/// Unix timestamp in seconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }

    /// The instant `days` whole days before now.
    pub fn days_ago(days: u32) -> Self {
        Self(Utc::now().timestamp() - i64::from(days) * 86_400)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Risk classification assigned to a plan or an individual action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

string_enum!(RiskLevel, "risk level" {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// Which actor has to clear a plan before it may execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalRoute {
    AutoApproved,
    AdvisorApproval,
    SupervisorApproval,
}

string_enum!(ApprovalRoute, "approval route" {
    AutoApproved => "auto_approved",
    AdvisorApproval => "advisor_approval",
    SupervisorApproval => "supervisor_approval",
});

/// Plan-level position in the approval queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    PendingAdvisor,
    PendingSupervisor,
    Approved,
    Rejected,
}

string_enum!(QueueStatus, "queue status" {
    PendingAdvisor => "pending_advisor",
    PendingSupervisor => "pending_supervisor",
    Approved => "approved",
    Rejected => "rejected",
});

impl QueueStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, QueueStatus::PendingAdvisor | QueueStatus::PendingSupervisor)
    }
}

/// Approval state of a single action, either embedded in the plan or
/// recorded in the approval ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    PendingAdvisor,
    PendingSupervisor,
    Approved,
    AutoApproved,
    Rejected,
}

string_enum!(ApprovalStatus, "approval status" {
    Pending => "pending",
    PendingAdvisor => "pending_advisor",
    PendingSupervisor => "pending_supervisor",
    Approved => "approved",
    AutoApproved => "auto_approved",
    Rejected => "rejected",
});

impl ApprovalStatus {
    /// Whether an action in this state may produce a side effect.
    pub fn is_cleared(&self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::AutoApproved)
    }

    /// Statuses an approver can write to the approval ledger.
    pub fn is_ledger_status(&self) -> bool {
        matches!(
            self,
            ApprovalStatus::Pending | ApprovalStatus::Approved | ApprovalStatus::Rejected
        )
    }
}

/// The four layers of an action plan, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Borrower,
    Advisor,
    Supervisor,
    Leadership,
}

string_enum!(ActionCategory, "action category" {
    Borrower => "borrower",
    Advisor => "advisor",
    Supervisor => "supervisor",
    Leadership => "leadership",
});

impl ActionCategory {
    pub const ALL: [ActionCategory; 4] = [
        ActionCategory::Borrower,
        ActionCategory::Advisor,
        ActionCategory::Supervisor,
        ActionCategory::Leadership,
    ];
}

/// Closed set of side-effecting tools an action can be dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Email,
    Callback,
    Document,
    Notification,
    CrmUpdate,
}

string_enum!(Tool, "tool" {
    Email => "email",
    Callback => "callback",
    Document => "document",
    Notification => "notification",
    CrmUpdate => "crm_update",
});

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::Email,
        Tool::Callback,
        Tool::Document,
        Tool::Notification,
        Tool::CrmUpdate,
    ];
}

/// How strictly the plan-level gate is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Requires the plan's queue status to be `approved`.
    #[default]
    Auto,
    /// Skips the plan-level check; per-action approval still applies.
    Manual,
}

string_enum!(ExecutionMode, "execution mode" {
    Auto => "auto",
    Manual => "manual",
});

impl From<&str> for ExecutionMode {
    /// Anything other than `manual` gets the strict `auto` rule.
    fn from(mode: &str) -> Self {
        if mode.trim().eq_ignore_ascii_case("manual") {
            ExecutionMode::Manual
        } else {
            ExecutionMode::Auto
        }
    }
}

/// Run-level outcome of one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    PendingApproval,
    Error,
}

string_enum!(ExecutionStatus, "execution status" {
    Success => "success",
    PendingApproval => "pending_approval",
    Error => "error",
});

/// Outcome of a single action within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResultStatus {
    Success,
    Error,
    Skipped,
}

string_enum!(ActionResultStatus, "action result status" {
    Success => "success",
    Error => "error",
    Skipped => "skipped",
});

/// Where an execution decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Oracle,
    Fallback,
}

string_enum!(DecisionSource, "decision source" {
    Oracle => "oracle",
    Fallback => "fallback",
});

// =============================================================================
// Plan actions
// =============================================================================

/// Fields every action carries regardless of its layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCore {
    pub action_id: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub needs_approval: bool,
    pub approval_status: ApprovalStatus,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub auto_executable: bool,
}

/// Customer-facing action (immediate or follow-up).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerAction {
    #[serde(flatten)]
    pub core: ActionCore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
}

/// Coaching or workflow action for the advisor who handled the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorAction {
    #[serde(flatten)]
    pub core: ActionCore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<String>,
}

/// Review or escalation action for the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorAction {
    #[serde(flatten)]
    pub core: ActionCore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<String>,
}

/// Portfolio or process action surfaced to leadership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadershipAction {
    #[serde(flatten)]
    pub core: ActionCore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Borrower layer: immediate actions run before follow-ups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorrowerPlan {
    #[serde(default)]
    pub immediate_actions: Vec<BorrowerAction>,
    #[serde(default)]
    pub follow_ups: Vec<BorrowerAction>,
}

/// Borrowed view of one action together with its layer.
#[derive(Debug, Clone, Copy)]
pub enum PlanAction<'a> {
    Borrower(&'a BorrowerAction),
    Advisor(&'a AdvisorAction),
    Supervisor(&'a SupervisorAction),
    Leadership(&'a LeadershipAction),
}

impl<'a> PlanAction<'a> {
    pub fn core(&self) -> &'a ActionCore {
        match self {
            PlanAction::Borrower(a) => &a.core,
            PlanAction::Advisor(a) => &a.core,
            PlanAction::Supervisor(a) => &a.core,
            PlanAction::Leadership(a) => &a.core,
        }
    }

    pub fn category(&self) -> ActionCategory {
        match self {
            PlanAction::Borrower(_) => ActionCategory::Borrower,
            PlanAction::Advisor(_) => ActionCategory::Advisor,
            PlanAction::Supervisor(_) => ActionCategory::Supervisor,
            PlanAction::Leadership(_) => ActionCategory::Leadership,
        }
    }
}

// =============================================================================
// Plans
// =============================================================================

/// Call-analysis signals that inform how an action is carried out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_sentiment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_intent: Option<String>,
}

/// A four-layer action plan generated from one call analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub plan_id: String,
    pub analysis_id: String,
    pub transcript_id: String,
    pub risk_level: RiskLevel,
    pub approval_route: ApprovalRoute,
    pub queue_status: QueueStatus,
    #[serde(default)]
    pub context: CallContext,
    #[serde(default)]
    pub borrower: BorrowerPlan,
    #[serde(default)]
    pub advisor: Vec<AdvisorAction>,
    #[serde(default)]
    pub supervisor: Vec<SupervisorAction>,
    #[serde(default)]
    pub leadership: Vec<LeadershipAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default = "Timestamp::now")]
    pub created_at: Timestamp,
}

impl ActionPlan {
    /// Parse and validate a plan at the ingestion boundary.
    pub fn from_json(json: &str) -> Result<Self> {
        let plan: ActionPlan = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    /// All actions in execution order: borrower immediate actions, borrower
    /// follow-ups, advisor, supervisor, leadership. Plan order is kept
    /// within each list.
    pub fn actions(&self) -> impl Iterator<Item = PlanAction<'_>> {
        self.borrower
            .immediate_actions
            .iter()
            .map(PlanAction::Borrower)
            .chain(self.borrower.follow_ups.iter().map(PlanAction::Borrower))
            .chain(self.advisor.iter().map(PlanAction::Advisor))
            .chain(self.supervisor.iter().map(PlanAction::Supervisor))
            .chain(self.leadership.iter().map(PlanAction::Leadership))
    }

    pub fn action_count(&self) -> usize {
        self.borrower.immediate_actions.len()
            + self.borrower.follow_ups.len()
            + self.advisor.len()
            + self.supervisor.len()
            + self.leadership.len()
    }

    /// Check identifiers once so the engine can rely on them.
    ///
    /// Action ids must be non-empty and unique across all four layers,
    /// since the approval ledger is keyed by action id alone.
    pub fn validate(&self) -> Result<()> {
        if self.plan_id.trim().is_empty() {
            return Err(CallplanError::Validation(
                "plan_id must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for action in self.actions() {
            let core = action.core();
            if core.action_id.trim().is_empty() {
                return Err(CallplanError::Validation(format!(
                    "{} action '{}' has an empty action_id",
                    action.category(),
                    core.action
                )));
            }
            if core.action.trim().is_empty() {
                return Err(CallplanError::Validation(format!(
                    "action {} has empty action text",
                    core.action_id
                )));
            }
            if !seen.insert(core.action_id.as_str()) {
                return Err(CallplanError::Validation(format!(
                    "duplicate action_id {}",
                    core.action_id
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Approvals and decisions
// =============================================================================

/// Per-action approval, authoritative over the plan-embedded status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    pub approval_status: ApprovalStatus,
    pub approver_id: String,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// How a cleared action should be carried out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDecision {
    pub tool: Tool,
    pub content: String,
    #[serde(default)]
    pub tone: String,
    pub timing: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub reasoning: String,
}

impl ExecutionDecision {
    /// Name of the first required field that is blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.content.trim().is_empty() {
            Some("content")
        } else if self.timing.trim().is_empty() {
            Some("timing")
        } else {
            None
        }
    }

    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }
}

// =============================================================================
// Execution records
// =============================================================================

/// Outcome for exactly one action of a plan within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecutionResult {
    pub category: ActionCategory,
    pub action_id: String,
    pub action: String,
    pub status: ActionResultStatus,
    pub tool_used: Option<Tool>,
    pub tool_status: Option<String>,
    pub artifact_path: Option<String>,
    pub external_id: Option<String>,
    pub error_message: Option<String>,
    pub skip_reason: Option<String>,
    pub reasoning: Option<String>,
    pub decision_source: Option<DecisionSource>,
}

impl ActionExecutionResult {
    fn base(category: ActionCategory, core: &ActionCore, status: ActionResultStatus) -> Self {
        Self {
            category,
            action_id: core.action_id.clone(),
            action: core.action.clone(),
            status,
            tool_used: None,
            tool_status: None,
            artifact_path: None,
            external_id: None,
            error_message: None,
            skip_reason: None,
            reasoning: None,
            decision_source: None,
        }
    }

    /// Action held back by the approval gate.
    pub fn skipped(category: ActionCategory, core: &ActionCore, reason: impl Into<String>) -> Self {
        Self {
            skip_reason: Some(reason.into()),
            ..Self::base(category, core, ActionResultStatus::Skipped)
        }
    }

    /// Action whose decision or dispatch failed.
    pub fn failed(
        category: ActionCategory,
        core: &ActionCore,
        tool: Option<Tool>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            tool_used: tool,
            error_message: Some(error.into()),
            ..Self::base(category, core, ActionResultStatus::Error)
        }
    }

    /// Action dispatched successfully.
    pub fn succeeded(category: ActionCategory, core: &ActionCore, tool: Tool) -> Self {
        Self {
            tool_used: Some(tool),
            ..Self::base(category, core, ActionResultStatus::Success)
        }
    }
}

/// Write-once audit record of one engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub plan_id: String,
    pub mode: ExecutionMode,
    pub executed_at: Timestamp,
    pub status: ExecutionStatus,
    pub results: Vec<ActionExecutionResult>,
    pub artifacts_created: Vec<String>,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecutionRecord {
    /// Build a record with a fresh id, deriving artifacts and errors from
    /// the results.
    pub fn new(
        plan_id: impl Into<String>,
        mode: ExecutionMode,
        status: ExecutionStatus,
        results: Vec<ActionExecutionResult>,
        message: Option<String>,
    ) -> Self {
        let mut seen = HashSet::new();
        let artifacts_created = results
            .iter()
            .filter_map(|r| r.artifact_path.clone())
            .filter(|p| seen.insert(p.clone()))
            .collect();

        let errors = results
            .iter()
            .filter(|r| r.status == ActionResultStatus::Error)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.action_id,
                    r.error_message.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();

        Self {
            execution_id: Uuid::new_v4(),
            plan_id: plan_id.into(),
            mode,
            executed_at: Timestamp::now(),
            status,
            results,
            artifacts_created,
            errors,
            message,
        }
    }

    /// A run that never reached dispatch because of a run-level failure.
    pub fn failed(plan_id: impl Into<String>, mode: ExecutionMode, message: impl Into<String>) -> Self {
        Self::new(
            plan_id,
            mode,
            ExecutionStatus::Error,
            Vec::new(),
            Some(message.into()),
        )
    }

    pub fn count(&self, status: ActionResultStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn core(id: &str, status: ApprovalStatus) -> ActionCore {
        ActionCore {
            action_id: id.to_string(),
            action: format!("Action {}", id),
            description: String::new(),
            needs_approval: false,
            approval_status: status,
            risk_level: RiskLevel::Low,
            auto_executable: true,
        }
    }

    fn plan_json() -> &'static str {
        r#"{
            "plan_id": "P1",
            "analysis_id": "AN1",
            "transcript_id": "T1",
            "risk_level": "medium",
            "approval_route": "advisor_approval",
            "queue_status": "pending_advisor",
            "context": {"customer_sentiment": "frustrated", "urgency": "high"},
            "borrower": {
                "immediate_actions": [
                    {"action_id": "b1", "action": "Send confirmation email", "approval_status": "auto_approved", "priority": "high"}
                ],
                "follow_ups": [
                    {"action_id": "b2", "action": "Schedule callback", "approval_status": "pending", "timeline": "48h"}
                ]
            },
            "advisor": [
                {"action_id": "a1", "action": "Review hardship options", "approval_status": "approved", "focus_area": "empathy"}
            ],
            "supervisor": [
                {"action_id": "s1", "action": "Audit call", "approval_status": "pending_supervisor"}
            ],
            "leadership": [
                {"action_id": "l1", "action": "Track hardship trend", "approval_status": "approved", "scope": "portfolio"}
            ]
        }"#
    }

    #[test]
    fn test_enum_display_and_parse() {
        assert_eq!(Tool::CrmUpdate.to_string(), "crm_update");
        assert_eq!("crm_update".parse::<Tool>().unwrap(), Tool::CrmUpdate);
        assert!("fax".parse::<Tool>().is_err());

        assert_eq!(QueueStatus::PendingSupervisor.to_string(), "pending_supervisor");
        assert_eq!(
            "auto_approved".parse::<ApprovalStatus>().unwrap(),
            ApprovalStatus::AutoApproved
        );
        assert_eq!(
            "pending_approval".parse::<ExecutionStatus>().unwrap(),
            ExecutionStatus::PendingApproval
        );
        assert_eq!(
            "unknown".parse::<ActionCategory>().unwrap_err(),
            "Unknown action category: unknown"
        );
    }

    #[test]
    fn test_serde_matches_display() {
        for tool in Tool::ALL {
            let json = serde_json::to_string(&tool).unwrap();
            assert_eq!(json, format!("\"{}\"", tool));
        }
        for category in ActionCategory::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category));
        }
    }

    #[test]
    fn test_approval_status_clearance() {
        assert!(ApprovalStatus::Approved.is_cleared());
        assert!(ApprovalStatus::AutoApproved.is_cleared());
        assert!(!ApprovalStatus::Pending.is_cleared());
        assert!(!ApprovalStatus::PendingAdvisor.is_cleared());
        assert!(!ApprovalStatus::PendingSupervisor.is_cleared());
        assert!(!ApprovalStatus::Rejected.is_cleared());
    }

    #[test]
    fn test_ledger_statuses() {
        assert!(ApprovalStatus::Pending.is_ledger_status());
        assert!(ApprovalStatus::Approved.is_ledger_status());
        assert!(ApprovalStatus::Rejected.is_ledger_status());
        assert!(!ApprovalStatus::AutoApproved.is_ledger_status());
        assert!(!ApprovalStatus::PendingSupervisor.is_ledger_status());
    }

    #[test]
    fn test_execution_mode_lenient_parse() {
        assert_eq!(ExecutionMode::from("manual"), ExecutionMode::Manual);
        assert_eq!(ExecutionMode::from(" MANUAL "), ExecutionMode::Manual);
        assert_eq!(ExecutionMode::from("auto"), ExecutionMode::Auto);
        assert_eq!(ExecutionMode::from("force"), ExecutionMode::Auto);
        assert_eq!(ExecutionMode::from(""), ExecutionMode::Auto);
    }

    #[test]
    fn test_plan_from_json_and_order() {
        let plan = ActionPlan::from_json(plan_json()).unwrap();
        assert_eq!(plan.action_count(), 5);
        assert_eq!(plan.context.urgency.as_deref(), Some("high"));

        let ids: Vec<(&str, ActionCategory)> = plan
            .actions()
            .map(|a| (a.core().action_id.as_str(), a.category()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("b1", ActionCategory::Borrower),
                ("b2", ActionCategory::Borrower),
                ("a1", ActionCategory::Advisor),
                ("s1", ActionCategory::Supervisor),
                ("l1", ActionCategory::Leadership),
            ]
        );

        let first = plan.actions().next().unwrap();
        assert_eq!(first.core().risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_plan_json_round_trip_keeps_flattened_fields() {
        let plan = ActionPlan::from_json(plan_json()).unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        let rt = ActionPlan::from_json(&json).unwrap();
        assert_eq!(plan, rt);
        assert_eq!(rt.advisor[0].focus_area.as_deref(), Some("empathy"));
    }

    #[test]
    fn test_plan_rejects_unknown_status() {
        let json = plan_json().replace("\"auto_approved\"", "\"maybe\"");
        let err = ActionPlan::from_json(&json).unwrap_err();
        assert!(matches!(err, CallplanError::Serialization(_)));
    }

    #[test]
    fn test_plan_rejects_duplicate_action_ids() {
        let json = plan_json().replace("\"a1\"", "\"b1\"");
        let err = ActionPlan::from_json(&json).unwrap_err();
        assert!(matches!(err, CallplanError::Validation(_)));
        assert!(err.to_string().contains("duplicate action_id b1"));
    }

    #[test]
    fn test_plan_rejects_empty_ids() {
        let json = plan_json().replace("\"P1\"", "\"  \"");
        assert!(ActionPlan::from_json(&json).is_err());

        let json = plan_json().replace("\"s1\"", "\"\"");
        let err = ActionPlan::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("empty action_id"));
    }

    #[test]
    fn test_decision_missing_field() {
        let mut decision = ExecutionDecision {
            tool: Tool::Email,
            content: "Hello".to_string(),
            tone: "warm".to_string(),
            timing: "immediate".to_string(),
            parameters: serde_json::Map::new(),
            reasoning: String::new(),
        };
        assert_eq!(decision.missing_field(), None);

        decision.timing = " ".to_string();
        assert_eq!(decision.missing_field(), Some("timing"));

        decision.content = String::new();
        assert_eq!(decision.missing_field(), Some("content"));
    }

    #[test]
    fn test_decision_rejects_unknown_tool() {
        let json = r#"{"tool": "fax", "content": "x", "timing": "now"}"#;
        assert!(serde_json::from_str::<ExecutionDecision>(json).is_err());
    }

    #[test]
    fn test_record_derives_artifacts_and_errors() {
        let mut ok1 = ActionExecutionResult::succeeded(
            ActionCategory::Borrower,
            &core("b1", ApprovalStatus::Approved),
            Tool::Email,
        );
        ok1.artifact_path = Some("/tmp/emails/1.json".to_string());
        let mut ok2 = ActionExecutionResult::succeeded(
            ActionCategory::Advisor,
            &core("a1", ApprovalStatus::Approved),
            Tool::Notification,
        );
        ok2.external_id = Some("n-1".to_string());
        let err = ActionExecutionResult::failed(
            ActionCategory::Supervisor,
            &core("s1", ApprovalStatus::Approved),
            Some(Tool::Document),
            "disk full",
        );
        let skipped = ActionExecutionResult::skipped(
            ActionCategory::Leadership,
            &core("l1", ApprovalStatus::Pending),
            "Awaiting approval",
        );

        let record = ExecutionRecord::new(
            "P1",
            ExecutionMode::Auto,
            ExecutionStatus::Success,
            vec![ok1, ok2, err, skipped],
            None,
        );

        assert_eq!(record.artifacts_created, vec!["/tmp/emails/1.json".to_string()]);
        assert_eq!(record.errors, vec!["s1: disk full".to_string()]);
        assert_eq!(record.count(ActionResultStatus::Success), 2);
        assert_eq!(record.count(ActionResultStatus::Error), 1);
        assert_eq!(record.count(ActionResultStatus::Skipped), 1);
        assert_eq!(
            record.results[3].skip_reason.as_deref(),
            Some("Awaiting approval")
        );
    }

    #[test]
    fn test_records_get_fresh_ids() {
        let a = ExecutionRecord::failed("P1", ExecutionMode::Auto, "boom");
        let b = ExecutionRecord::failed("P1", ExecutionMode::Auto, "boom");
        assert_ne!(a.execution_id, b.execution_id);
        assert_eq!(a.status, ExecutionStatus::Error);
        assert_eq!(a.message.as_deref(), Some("boom"));
        assert!(a.results.is_empty());
    }

    #[test]
    fn test_timestamp_days_ago() {
        let now = Timestamp::now();
        let week = Timestamp::days_ago(7);
        let diff = now.0 - week.0;
        assert!((604_799..=604_801).contains(&diff));
        assert_eq!(Timestamp(1_700_000_000).to_datetime().timestamp(), 1_700_000_000);
    }
}
