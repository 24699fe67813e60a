//! Shared types for the ToolGate control plane crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of a role applied to a caller.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier attached to a single tool call for correlation.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

/// A named tool invocation with its JSON arguments.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: Option<CallId>,
    pub tool: String,
    pub args: serde_json::Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            call_id: Some(CallId::new()),
            tool: tool.into(),
            args,
        }
    }
}

/// Outcome categories for an admission decision.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Allowed,
    Blocked,
    RequiresApproval,
}

/// Admission verdict returned to callers.
///
/// Admission failures are data, never errors: a blocked call carries a
/// human-readable `reason` suitable for direct display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: DecisionOutcome,
    pub reason: Option<String>,
    pub violation: Option<GuardrailViolation>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            outcome: DecisionOutcome::Allowed,
            reason: None,
            violation: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            outcome: DecisionOutcome::Blocked,
            reason: Some(reason.into()),
            violation: None,
        }
    }

    pub fn deny_with(reason: impl Into<String>, violation: GuardrailViolation) -> Self {
        Self {
            outcome: DecisionOutcome::Blocked,
            reason: Some(reason.into()),
            violation: Some(violation),
        }
    }

    pub fn needs_approval(reason: impl Into<String>) -> Self {
        Self {
            outcome: DecisionOutcome::RequiresApproval,
            reason: Some(reason.into()),
            violation: None,
        }
    }

    /// Fully allowed, no approval pending.
    pub fn is_allowed(&self) -> bool {
        self.outcome == DecisionOutcome::Allowed
    }

    /// Admitted past the guardrails, possibly pending approval.
    pub fn is_admitted(&self) -> bool {
        matches!(
            self.outcome,
            DecisionOutcome::Allowed | DecisionOutcome::RequiresApproval
        )
    }

    pub fn requires_approval(&self) -> bool {
        self.outcome == DecisionOutcome::RequiresApproval
    }
}

/// Classification of a guardrail violation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Permission,
    RateLimit,
    Restriction,
    Safety,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::Permission => "permission",
            ViolationKind::RateLimit => "rate_limit",
            ViolationKind::Restriction => "restriction",
            ViolationKind::Safety => "safety",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Record of a single guardrail violation. Produced once, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuardrailViolation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl GuardrailViolation {
    pub fn new(kind: ViolationKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_constructors_set_outcome() {
        assert!(Decision::allow().is_allowed());
        assert!(Decision::allow().is_admitted());

        let denied = Decision::deny("not allowed");
        assert_eq!(denied.outcome, DecisionOutcome::Blocked);
        assert!(!denied.is_admitted());
        assert_eq!(denied.reason.as_deref(), Some("not allowed"));

        let pending = Decision::needs_approval("needs a human");
        assert!(pending.requires_approval());
        assert!(pending.is_admitted());
        assert!(!pending.is_allowed());
    }

    #[test]
    fn violation_serializes_with_snake_case_kind() {
        let violation = GuardrailViolation::new(
            ViolationKind::RateLimit,
            Severity::Medium,
            "too many requests",
        );
        let json = serde_json::to_value(&violation).unwrap();
        assert_eq!(json["kind"], "rate_limit");
        assert_eq!(json["severity"], "medium");
    }
}
