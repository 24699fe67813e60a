use thiserror::Error;

/// Failures surfaced by [`crate::RetryExecutor::run`].
///
/// `InputValidation` is terminal and never retried (a caller error, not a
/// transient fault). `Timeout`, `OutputValidation` and `Tool` describe a
/// single attempt and reach callers wrapped in `Exhausted` once every
/// attempt has been spent.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("input validation failed: {0}")]
    InputValidation(String),
    #[error("tool '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },
    #[error("output validation failed: {0}")]
    OutputValidation(String),
    #[error("tool execution failed: {0}")]
    Tool(#[source] anyhow::Error),
    #[error("execution aborted before attempt {attempt}")]
    Aborted { attempt: u32 },
    #[error("tool '{tool}' failed after {attempts} attempts: {source}")]
    Exhausted {
        tool: String,
        attempts: u32,
        #[source]
        source: Box<ExecutionError>,
    },
}

impl ExecutionError {
    /// Whether this outcome should count as a failure for circuit-breaker
    /// bookkeeping. Input validation rejections never reached the tool;
    /// aborts are caller-initiated.
    pub fn counts_as_tool_failure(&self) -> bool {
        matches!(
            self,
            ExecutionError::Timeout { .. }
                | ExecutionError::OutputValidation(_)
                | ExecutionError::Tool(_)
                | ExecutionError::Exhausted { .. }
        )
    }
}
