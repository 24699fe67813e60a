//! Construction. Each built instance owns its state end to end, so tests
//! and embedders can run several independent control planes side by side.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use audit_log::AuditLog;
use circuit_breaker::{BreakerConfig, CircuitBreaker};
use permission_gate::{PermissionError, Role, RoleRegistry};
use rate_limiter::RateLimiter;
use retry_executor::{CallValidator, ExecutionHooks, RetryExecutor};
use toolgate_core_types::RoleId;

use crate::approval::ApprovalHandler;
use crate::plane::ControlPlane;

pub struct ControlPlaneBuilder {
    roles: Vec<Role>,
    include_builtins: bool,
    audit_capacity: usize,
    breaker_defaults: BreakerConfig,
    breaker_overrides: Vec<(String, BreakerConfig)>,
    validator: Option<Arc<dyn CallValidator>>,
    hooks: Option<Arc<dyn ExecutionHooks>>,
    approval: Option<Arc<dyn ApprovalHandler>>,
}

impl ControlPlaneBuilder {
    pub fn new() -> Self {
        Self {
            roles: Vec::new(),
            include_builtins: true,
            audit_capacity: audit_log::DEFAULT_CAPACITY,
            breaker_defaults: BreakerConfig::default(),
            breaker_overrides: Vec::new(),
            validator: None,
            hooks: None,
            approval: None,
        }
    }

    /// Add a custom role (registered after the builtins, replacing any
    /// builtin of the same name).
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    /// Skip the builtin guest/user/admin/automation roles.
    pub fn without_builtin_roles(mut self) -> Self {
        self.include_builtins = false;
        self
    }

    pub fn with_audit_capacity(mut self, capacity: usize) -> Self {
        self.audit_capacity = capacity;
        self
    }

    pub fn with_breaker_defaults(mut self, config: BreakerConfig) -> Self {
        self.breaker_defaults = config;
        self
    }

    /// Per-tool breaker tuning.
    pub fn with_tool_breaker(mut self, tool: impl Into<String>, config: BreakerConfig) -> Self {
        self.breaker_overrides.push((tool.into(), config));
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn CallValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ExecutionHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_approval_handler(mut self, handler: Arc<dyn ApprovalHandler>) -> Self {
        self.approval = Some(handler);
        self
    }

    pub fn build(self) -> Result<ControlPlane, PermissionError> {
        let roles = if self.include_builtins {
            RoleRegistry::with_builtins()
        } else {
            RoleRegistry::new()
        };
        for role in self.roles {
            roles.register(role)?;
        }

        let limiter = RateLimiter::new();
        for compiled in roles.compiled_roles() {
            if let Some(config) = compiled.rate_limits() {
                limiter.set_role_config(&RoleId::new(compiled.name()), config.clone());
            }
        }

        let breaker = CircuitBreaker::with_config(self.breaker_defaults);
        for (tool, config) in self.breaker_overrides {
            breaker.configure(tool, config);
        }

        let mut executor = RetryExecutor::new();
        if let Some(validator) = self.validator {
            executor = executor.with_validator(validator);
        }
        if let Some(hooks) = self.hooks {
            executor = executor.with_hooks(hooks);
        }

        Ok(ControlPlane {
            roles,
            limiter,
            breaker,
            audit: AuditLog::with_capacity(self.audit_capacity),
            executor,
            approval: self.approval,
            cancel: CancellationToken::new(),
        })
    }
}

impl Default for ControlPlaneBuilder {
    fn default() -> Self {
        Self::new()
    }
}
