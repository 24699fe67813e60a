use std::time::Duration;

/// Retry and timeout tuning for one guarded execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Additional attempts after the first; `max_retries = 2` means three
    /// invocations in total.
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Per-attempt deadline. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_millis(300),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}
