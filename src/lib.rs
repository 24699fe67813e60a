//! ToolGate - tool-execution control plane for LLM-driven browser agents.
//!
//! Every side-effecting tool call an agent attempts (navigate, click,
//! type_text, screenshot, ...) is mediated here: a role-based permission
//! evaluator, a sliding-window rate limiter and a per-tool circuit breaker
//! decide admission; a retry/timeout wrapper runs the call; a bounded audit
//! log records every decision.
//!
//! ```no_run
//! use std::time::Duration;
//! use serde_json::json;
//! use toolgate::prelude::*;
//!
//! # #[derive(Clone, Copy)] struct Browser;
//! # #[async_trait::async_trait]
//! # impl ToolExecutor for Browser {
//! #     async fn execute(&self, _call: &ToolCall) -> anyhow::Result<serde_json::Value> {
//! #         Ok(json!({}))
//! #     }
//! # }
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let plane = ControlPlane::builder().build()?;
//! let role = RoleId::from("user");
//! let call = ToolCall::new("navigate", json!({"url": "https://docs.rs"}));
//!
//! let decision = plane.authorize(&role, &call.tool, &call.args);
//! if decision.is_allowed() {
//!     let retry = RetryConfig::new(2).with_timeout(Duration::from_secs(15));
//!     let output = plane.execute_guarded(&role, &call, &Browser, &retry).await?;
//!     println!("{output}");
//! }
//! # Ok(())
//! # }
//! ```

pub use audit_log::{AuditEntry, AuditFilter, AuditLog, GuardrailStats, ToolUsage};
pub use circuit_breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use control_plane::{ApprovalHandler, ControlPlane, ControlPlaneBuilder, ControlPlaneError};
pub use permission_gate::{
    builtin_roles, load_roles_file, parse_roles, Condition, PermissionError,
    PermissionEvaluator, Permission, PermissionLevel, Predicate, Restriction, Role,
    RoleRegistry,
};
pub use rate_limiter::{RateDecision, RateLimitConfig, RateLimiter, ToolLimit};
pub use retry_executor::{
    CallValidator, ExecutionError, ExecutionHooks, RetryConfig, RetryExecutor, ToolExecutor,
};
pub use toolgate_core_types::{
    CallId, Decision, DecisionOutcome, GuardrailViolation, RoleId, Severity, ToolCall,
    ViolationKind,
};

/// The types most embedders need.
pub mod prelude {
    pub use crate::{
        ApprovalHandler, ControlPlane, ControlPlaneError, Decision, DecisionOutcome,
        ExecutionError, RetryConfig, Role, RoleId, ToolCall, ToolExecutor,
    };
}
