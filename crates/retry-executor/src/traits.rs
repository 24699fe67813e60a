//! Seams between the control plane and the outside world.

use async_trait::async_trait;
use serde_json::Value;

use toolgate_core_types::ToolCall;

use crate::errors::ExecutionError;

/// The actual side-effecting tool implementation, provided by the
/// orchestration layer (browser driver, extension bridge, ...).
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> anyhow::Result<Value>;
}

/// Input/output validation around one execution. Input failures are
/// terminal; output failures are retried like any execution failure.
pub trait CallValidator: Send + Sync {
    fn validate_input(&self, _call: &ToolCall) -> Result<(), String> {
        Ok(())
    }

    fn validate_output(&self, _call: &ToolCall, _output: &Value) -> Result<(), String> {
        Ok(())
    }
}

/// Pass-through validator.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoValidation;

impl CallValidator for NoValidation {}

/// Observation hooks firing once per attempt. They must not influence the
/// admission decision or the retry loop.
#[async_trait]
pub trait ExecutionHooks: Send + Sync {
    async fn on_execute(&self, _call: &ToolCall, _attempt: u32) {}
    async fn on_success(&self, _call: &ToolCall, _output: &Value, _attempt: u32) {}
    async fn on_error(&self, _call: &ToolCall, _error: &ExecutionError, _attempt: u32) {}
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

#[async_trait]
impl ExecutionHooks for NoopHooks {}
