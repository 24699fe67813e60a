//! The control plane itself.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use audit_log::{AuditEntry, AuditFilter, AuditLog, GuardrailStats};
use circuit_breaker::{BreakerState, CircuitBreaker};
use permission_gate::{PermissionError, PermissionEvaluator, Role, RoleRegistry};
use rate_limiter::RateLimiter;
use retry_executor::{RetryConfig, RetryExecutor, ToolExecutor};
use toolgate_core_types::{
    Decision, DecisionOutcome, GuardrailViolation, RoleId, Severity, ToolCall, ViolationKind,
};

use crate::approval::ApprovalHandler;
use crate::errors::ControlPlaneError;

/// Composes the guardrails into the two-call surface the orchestration
/// layer consumes: `authorize` (pure admission) and `execute_guarded`
/// (admission, execution and bookkeeping).
pub struct ControlPlane {
    pub(crate) roles: RoleRegistry,
    pub(crate) limiter: RateLimiter,
    pub(crate) breaker: CircuitBreaker,
    pub(crate) audit: AuditLog,
    pub(crate) executor: RetryExecutor,
    pub(crate) approval: Option<Arc<dyn ApprovalHandler>>,
    pub(crate) cancel: CancellationToken,
}

impl ControlPlane {
    pub fn builder() -> crate::builder::ControlPlaneBuilder {
        crate::builder::ControlPlaneBuilder::new()
    }

    /// Admission check with the fixed order: circuit breaker, rate limiter,
    /// permission evaluation. Synchronous and non-blocking; writes exactly
    /// one audit entry whatever the outcome. Nothing is recorded against
    /// the rate window — admitted calls are counted by `execute_guarded`
    /// (or by the caller, for externally executed tools).
    pub fn authorize(&self, role: &RoleId, tool: &str, args: &Value) -> Decision {
        let decision = self.authorize_inner(role, tool, args);
        self.audit.append(AuditEntry {
            timestamp: Utc::now(),
            role: role.clone(),
            tool: tool.to_string(),
            args: args.clone(),
            decision: decision.outcome,
            violation: decision.violation.clone(),
        });
        decision
    }

    fn authorize_inner(&self, role: &RoleId, tool: &str, args: &Value) -> Decision {
        if self.breaker.is_open(tool) {
            warn!(tool, "call rejected: circuit breaker open");
            return Decision::deny_with(
                format!("tool '{}' is temporarily disabled after repeated failures", tool),
                GuardrailViolation::new(
                    ViolationKind::Safety,
                    Severity::High,
                    format!("circuit breaker open for '{}'", tool),
                ),
            );
        }

        let rate = self.limiter.check(role, tool);
        if !rate.allowed {
            let reason = rate
                .reason
                .unwrap_or_else(|| format!("rate limit exceeded for tool '{}'", tool));
            return Decision::deny_with(
                reason.clone(),
                GuardrailViolation::new(ViolationKind::RateLimit, Severity::Medium, reason),
            );
        }

        let Some(compiled) = self.roles.get(role) else {
            return Decision::deny_with(
                format!("unknown role '{}'", role),
                GuardrailViolation::new(
                    ViolationKind::Permission,
                    Severity::High,
                    format!("call attempted with unregistered role '{}'", role),
                ),
            );
        };
        PermissionEvaluator::evaluate(&compiled, tool, args)
    }

    /// Admit, execute and record one tool call.
    ///
    /// Requires-approval outcomes block on the configured handler; with no
    /// handler they fail. Outcome bookkeeping (breaker feedback) runs on
    /// every exit path: if the returned future is dropped mid-flight the
    /// call is recorded as a failure.
    pub async fn execute_guarded(
        &self,
        role: &RoleId,
        call: &ToolCall,
        executor: &dyn ToolExecutor,
        config: &RetryConfig,
    ) -> Result<Value, ControlPlaneError> {
        let decision = self.authorize(role, &call.tool, &call.args);
        match decision.outcome {
            DecisionOutcome::Blocked => {
                return Err(ControlPlaneError::Denied {
                    reason: decision
                        .reason
                        .unwrap_or_else(|| "call denied".to_string()),
                    violation: decision.violation,
                });
            }
            DecisionOutcome::RequiresApproval => {
                let reason = decision
                    .reason
                    .unwrap_or_else(|| "approval required".to_string());
                let Some(handler) = &self.approval else {
                    return Err(ControlPlaneError::ApprovalRequired { reason });
                };
                info!(tool = %call.tool, %reason, "awaiting approval");
                if !handler.request_approval(call, &reason).await {
                    info!(tool = %call.tool, "approval rejected");
                    return Err(ControlPlaneError::ApprovalRejected { reason });
                }
            }
            DecisionOutcome::Allowed => {}
        }

        // Admitted: the call now counts against the sliding window.
        self.limiter.record(role, &call.tool);

        let mut outcome = OutcomeGuard::new(&self.breaker, &call.tool);
        let result = self
            .executor
            .run(call, executor, config, &self.cancel)
            .await;
        match &result {
            Ok(_) => outcome.settle(true),
            Err(error) => {
                if error.counts_as_tool_failure() {
                    outcome.settle(false);
                } else {
                    // Input rejections and aborts never reached the tool.
                    outcome.disarm();
                }
            }
        }
        result.map_err(ControlPlaneError::Execution)
    }

    /// Circuit-breaker feedback for tools executed outside
    /// `execute_guarded`.
    pub fn record_tool_result(&self, tool: &str, success: bool) {
        if success {
            self.breaker.record_success(tool);
        } else {
            self.breaker.record_failure(tool);
        }
    }

    /// Register an additional role after construction, wiring its rate
    /// limits. Replaces any existing role of the same name.
    pub fn register_role(&self, role: Role) -> Result<(), PermissionError> {
        let compiled = self.roles.register(role)?;
        if let Some(config) = compiled.rate_limits() {
            self.limiter
                .set_role_config(&RoleId::new(compiled.name()), config.clone());
        }
        Ok(())
    }

    pub fn has_role(&self, role: &RoleId) -> bool {
        self.roles.contains(role)
    }

    pub fn audit(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.audit.entries(filter)
    }

    pub fn stats(&self) -> GuardrailStats {
        self.audit.stats()
    }

    /// Live stream of audit entries for UI consumers.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AuditEntry> {
        self.audit.subscribe()
    }

    pub fn breaker_state(&self, tool: &str) -> BreakerState {
        self.breaker.state(tool)
    }

    /// Propagate a top-level abort: in-flight guarded executions stop
    /// scheduling retries.
    pub fn abort(&self) {
        info!("control plane abort signalled");
        self.cancel.cancel();
    }

    pub fn abort_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Records the execution outcome into the breaker on every exit path. If
/// the guarded future is dropped before settling, the drop handler records
/// a failure so an abandoned call cannot leave the breaker blind.
struct OutcomeGuard<'a> {
    breaker: &'a CircuitBreaker,
    tool: &'a str,
    settled: bool,
}

impl<'a> OutcomeGuard<'a> {
    fn new(breaker: &'a CircuitBreaker, tool: &'a str) -> Self {
        Self {
            breaker,
            tool,
            settled: false,
        }
    }

    fn settle(&mut self, success: bool) {
        if success {
            self.breaker.record_success(self.tool);
        } else {
            self.breaker.record_failure(self.tool);
        }
        self.settled = true;
    }

    fn disarm(&mut self) {
        self.settled = true;
    }
}

impl Drop for OutcomeGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(tool = self.tool, "guarded call abandoned mid-flight, recording failure");
            self.breaker.record_failure(self.tool);
        }
    }
}
