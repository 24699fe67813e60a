//! End-to-end checks of the documented guardrail properties through the
//! public facade.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{json, Value};

use toolgate::prelude::*;
use toolgate::{AuditFilter, BreakerState, Permission, PermissionLevel, RateLimitConfig};

struct AlwaysFails {
    calls: AtomicU32,
}

#[async_trait]
impl ToolExecutor for AlwaysFails {
    async fn execute(&self, _call: &ToolCall) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("page crashed"))
    }
}

struct AlwaysSucceeds;

#[async_trait]
impl ToolExecutor for AlwaysSucceeds {
    async fn execute(&self, _call: &ToolCall) -> anyhow::Result<Value> {
        Ok(json!({"ok": true}))
    }
}

#[tokio::test]
async fn retries_are_bounded_and_wrapped() {
    let plane = ControlPlane::builder().build().unwrap();
    let executor = AlwaysFails {
        calls: AtomicU32::new(0),
    };
    let call = ToolCall::new("navigate", json!({"url": "https://docs.rs"}));

    let result = plane
        .execute_guarded(
            &RoleId::from("user"),
            &call,
            &executor,
            &RetryConfig::new(2)
                .with_retry_delay(Duration::from_millis(1))
                .without_timeout(),
        )
        .await;

    assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
    match result {
        Err(ControlPlaneError::Execution(ExecutionError::Exhausted { attempts, .. })) => {
            assert_eq!(attempts, 3)
        }
        other => panic!("expected exhausted execution, got {other:?}"),
    }
}

#[tokio::test]
async fn breaker_rate_limit_and_audit_compose() {
    let role = Role::new("pipeline", "integration test role")
        .with_permission(Permission::new(vec!["*"], PermissionLevel::Public))
        .with_rate_limits(RateLimitConfig::new(3, 60_000));
    let plane = ControlPlane::builder()
        .with_role(role)
        .with_audit_capacity(10)
        .build()
        .unwrap();
    let role = RoleId::from("pipeline");

    // Five consecutive failures reported externally open the breaker...
    for _ in 0..5 {
        plane.record_tool_result("click", false);
    }
    assert_eq!(plane.breaker_state("click"), BreakerState::Open);
    let denied = plane.authorize(&role, "click", &json!({}));
    assert!(!denied.is_admitted());

    // ...while other tools keep flowing until the window fills up. Only
    // executed calls consume the window.
    let retry = RetryConfig::new(0).without_timeout();
    let call = ToolCall::new("scroll", json!({"dy": 100}));
    for _ in 0..3 {
        plane
            .execute_guarded(&role, &call, &AlwaysSucceeds, &retry)
            .await
            .unwrap();
    }
    let over_limit = plane.authorize(&role, "scroll", &json!({}));
    assert!(!over_limit.is_admitted());

    // Audit capacity is a hard bound.
    for _ in 0..20 {
        plane.authorize(&role, "scroll", &json!({}));
    }
    assert!(plane.audit(&AuditFilter::default()).len() <= 10);
}
