//! The attempt loop.

use std::sync::Arc;

use serde_json::Value;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use toolgate_core_types::ToolCall;

use crate::config::RetryConfig;
use crate::errors::ExecutionError;
use crate::traits::{CallValidator, ExecutionHooks, NoValidation, NoopHooks, ToolExecutor};

/// Wraps a [`ToolExecutor`] with timeout, validation and bounded retries.
pub struct RetryExecutor {
    validator: Arc<dyn CallValidator>,
    hooks: Arc<dyn ExecutionHooks>,
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self {
            validator: Arc::new(NoValidation),
            hooks: Arc::new(NoopHooks),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn CallValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ExecutionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Run `call` against `executor` under `config`.
    ///
    /// A timed-out attempt counts as a failure; the underlying effect may
    /// still be in flight — this wrapper stops waiting, it does not cancel
    /// the callee. Once `cancel` fires, no further attempt starts.
    pub async fn run(
        &self,
        call: &ToolCall,
        executor: &dyn ToolExecutor,
        config: &RetryConfig,
        cancel: &CancellationToken,
    ) -> Result<Value, ExecutionError> {
        if let Err(message) = self.validator.validate_input(call) {
            warn!(tool = %call.tool, %message, "input validation rejected call");
            return Err(ExecutionError::InputValidation(message));
        }

        let attempts = config.attempts();
        let mut attempt: u32 = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(ExecutionError::Aborted { attempt });
            }

            self.hooks.on_execute(call, attempt).await;
            let outcome = self.attempt_once(call, executor, config).await;

            let error = match outcome {
                Ok(output) => match self.validator.validate_output(call, &output) {
                    Ok(()) => {
                        debug!(tool = %call.tool, attempt, "tool call succeeded");
                        self.hooks.on_success(call, &output, attempt).await;
                        return Ok(output);
                    }
                    Err(message) => ExecutionError::OutputValidation(message),
                },
                Err(error) => error,
            };

            warn!(tool = %call.tool, attempt, %error, "tool attempt failed");
            self.hooks.on_error(call, &error, attempt).await;

            if attempt >= attempts {
                return Err(ExecutionError::Exhausted {
                    tool: call.tool.clone(),
                    attempts,
                    source: Box::new(error),
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ExecutionError::Aborted { attempt: attempt + 1 });
                }
                _ = tokio::time::sleep(config.retry_delay) => {}
            }
            attempt += 1;
        }
    }

    async fn attempt_once(
        &self,
        call: &ToolCall,
        executor: &dyn ToolExecutor,
        config: &RetryConfig,
    ) -> Result<Value, ExecutionError> {
        match config.timeout {
            Some(limit) => match timeout(limit, executor.execute(call)).await {
                Ok(result) => result.map_err(ExecutionError::Tool),
                Err(_) => Err(ExecutionError::Timeout {
                    tool: call.tool.clone(),
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
            None => executor.execute(call).await.map_err(ExecutionError::Tool),
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyExecutor {
        calls: AtomicU32,
        succeed_on: u32,
    }

    impl FlakyExecutor {
        fn new(succeed_on: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                succeed_on,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolExecutor for FlakyExecutor {
        async fn execute(&self, _call: &ToolCall) -> anyhow::Result<Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(json!({"attempt": call}))
            } else {
                Err(anyhow!("transient failure on attempt {call}"))
            }
        }
    }

    struct SlowExecutor;

    #[async_trait]
    impl ToolExecutor for SlowExecutor {
        async fn execute(&self, _call: &ToolCall) -> anyhow::Result<Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!(null))
        }
    }

    fn call() -> ToolCall {
        ToolCall::new("navigate", json!({"url": "https://example.com"}))
    }

    fn config(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries)
            .with_retry_delay(Duration::from_millis(10))
            .without_timeout()
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_executor_is_invoked_exactly_attempts_times() {
        let executor = FlakyExecutor::new(u32::MAX);
        let result = RetryExecutor::new()
            .run(&call(), &executor, &config(2), &CancellationToken::new())
            .await;

        assert_eq!(executor.calls(), 3);
        match result {
            Err(ExecutionError::Exhausted {
                tool,
                attempts,
                source,
            }) => {
                assert_eq!(tool, "navigate");
                assert_eq!(attempts, 3);
                assert!(matches!(*source, ExecutionError::Tool(_)));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_a_retry_succeeds() {
        let executor = FlakyExecutor::new(2);
        let output = RetryExecutor::new()
            .run(&call(), &executor, &config(2), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(executor.calls(), 2);
        assert_eq!(output["attempt"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_attempt_failure() {
        let config = RetryConfig::new(1)
            .with_retry_delay(Duration::from_millis(10))
            .with_timeout(Duration::from_millis(50));
        let result = RetryExecutor::new()
            .run(&call(), &SlowExecutor, &config, &CancellationToken::new())
            .await;

        match result {
            Err(ExecutionError::Exhausted { attempts, source, .. }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(
                    *source,
                    ExecutionError::Timeout { timeout_ms: 50, .. }
                ));
            }
            other => panic!("expected Exhausted(Timeout), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn input_validation_failure_never_invokes_the_tool() {
        struct RejectInput;
        impl CallValidator for RejectInput {
            fn validate_input(&self, _call: &ToolCall) -> Result<(), String> {
                Err("missing required argument".to_string())
            }
        }

        let executor = FlakyExecutor::new(1);
        let result = RetryExecutor::new()
            .with_validator(Arc::new(RejectInput))
            .run(&call(), &executor, &config(3), &CancellationToken::new())
            .await;

        assert_eq!(executor.calls(), 0);
        assert!(matches!(result, Err(ExecutionError::InputValidation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn output_validation_failure_is_retried() {
        struct RejectFirstOutput {
            seen: AtomicU32,
        }
        impl CallValidator for RejectFirstOutput {
            fn validate_output(&self, _call: &ToolCall, _output: &Value) -> Result<(), String> {
                if self.seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("empty result".to_string())
                } else {
                    Ok(())
                }
            }
        }

        let executor = FlakyExecutor::new(1);
        let output = RetryExecutor::new()
            .with_validator(Arc::new(RejectFirstOutput {
                seen: AtomicU32::new(0),
            }))
            .run(&call(), &executor, &config(2), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(executor.calls(), 2);
        assert_eq!(output["attempt"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_retry_starts_after_abort() {
        let executor = Arc::new(FlakyExecutor::new(u32::MAX));
        let cancel = CancellationToken::new();
        let runner_cancel = cancel.clone();
        let runner_executor = Arc::clone(&executor);

        let handle = tokio::spawn(async move {
            RetryExecutor::new()
                .run(
                    &ToolCall::new("navigate", json!({})),
                    runner_executor.as_ref(),
                    &RetryConfig::new(5)
                        .with_retry_delay(Duration::from_secs(60))
                        .without_timeout(),
                    &runner_cancel,
                )
                .await
        });

        // Let the first attempt fail and the retry delay begin, then abort.
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let result = handle.await.unwrap();

        assert_eq!(executor.calls(), 1);
        assert!(matches!(result, Err(ExecutionError::Aborted { attempt: 2 })));
    }

    #[tokio::test(start_paused = true)]
    async fn hooks_fire_once_per_attempt() {
        #[derive(Default)]
        struct CountingHooks {
            executes: AtomicU32,
            successes: AtomicU32,
            errors: AtomicU32,
        }

        #[async_trait]
        impl ExecutionHooks for CountingHooks {
            async fn on_execute(&self, _call: &ToolCall, _attempt: u32) {
                self.executes.fetch_add(1, Ordering::SeqCst);
            }
            async fn on_success(&self, _call: &ToolCall, _output: &Value, _attempt: u32) {
                self.successes.fetch_add(1, Ordering::SeqCst);
            }
            async fn on_error(&self, _call: &ToolCall, _error: &ExecutionError, _attempt: u32) {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
        }

        let hooks = Arc::new(CountingHooks::default());
        let executor = FlakyExecutor::new(3);
        RetryExecutor::new()
            .with_hooks(Arc::clone(&hooks) as Arc<dyn ExecutionHooks>)
            .run(&call(), &executor, &config(3), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(hooks.executes.load(Ordering::SeqCst), 3);
        assert_eq!(hooks.errors.load(Ordering::SeqCst), 2);
        assert_eq!(hooks.successes.load(Ordering::SeqCst), 1);
    }
}
