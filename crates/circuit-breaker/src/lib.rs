//! Per-tool circuit breaker.
//!
//! A tool whose underlying action keeps failing (a page that will not
//! navigate, a selector that never resolves) is given a cooldown instead of
//! being hammered: after `failure_threshold` consecutive failures the
//! breaker opens, and once `reset_timeout` has elapsed it lets a single
//! trial call through (half-open) before deciding to close or re-open.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Breaker tuning, configurable per tool registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    #[serde(with = "duration_ms")]
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
        }
    }
}

/// Breaker states. `Open` holds only while the cooldown is running; the
/// transition to `HalfOpen` is observed lazily on the next query.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerEntry {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    config: BreakerConfig,
}

impl BreakerEntry {
    fn new(config: BreakerConfig) -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure: None,
            config,
        }
    }

    /// Apply the lazy `Open -> HalfOpen` transition if the cooldown elapsed.
    fn refresh(&mut self, now: Instant) {
        if self.state != BreakerState::Open {
            return;
        }
        let Some(last_failure) = self.last_failure else {
            return;
        };
        if now.saturating_duration_since(last_failure) >= self.config.reset_timeout {
            self.state = BreakerState::HalfOpen;
        }
    }
}

/// Failure-tracking state machine per tool. Entries are created lazily on
/// first use and all mutation happens under the per-tool mutex.
pub struct CircuitBreaker {
    default_config: BreakerConfig,
    tools: DashMap<String, Mutex<BreakerEntry>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(BreakerConfig::default())
    }

    pub fn with_config(default_config: BreakerConfig) -> Self {
        Self {
            default_config,
            tools: DashMap::new(),
        }
    }

    /// Register a per-tool configuration, resetting any accumulated state
    /// for that tool.
    pub fn configure(&self, tool: impl Into<String>, config: BreakerConfig) {
        self.tools
            .insert(tool.into(), Mutex::new(BreakerEntry::new(config)));
    }

    /// Whether calls to `tool` should currently be rejected. Side-effecting:
    /// an open breaker whose cooldown has elapsed transitions to half-open
    /// as a consequence of being queried.
    pub fn is_open(&self, tool: &str) -> bool {
        self.is_open_at(tool, Instant::now())
    }

    /// Current (refreshed) state for diagnostics.
    pub fn state(&self, tool: &str) -> BreakerState {
        self.state_at(tool, Instant::now())
    }

    pub fn record_failure(&self, tool: &str) {
        self.record_failure_at(tool, Instant::now());
    }

    /// A single success closes the breaker from any state and resets the
    /// consecutive-failure count.
    pub fn record_success(&self, tool: &str) {
        let entry = self.entry(tool);
        let mut state = entry.lock();
        if state.state != BreakerState::Closed {
            info!(tool, "circuit breaker closed after successful call");
        }
        state.state = BreakerState::Closed;
        state.failure_count = 0;
    }

    fn is_open_at(&self, tool: &str, now: Instant) -> bool {
        self.state_at(tool, now) == BreakerState::Open
    }

    fn state_at(&self, tool: &str, now: Instant) -> BreakerState {
        let entry = self.entry(tool);
        let mut state = entry.lock();
        let before = state.state;
        state.refresh(now);
        if before == BreakerState::Open && state.state == BreakerState::HalfOpen {
            info!(tool, "circuit breaker half-open, allowing a trial call");
        }
        state.state
    }

    fn record_failure_at(&self, tool: &str, now: Instant) {
        let entry = self.entry(tool);
        let mut state = entry.lock();
        state.refresh(now);
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure = Some(now);
        match state.state {
            BreakerState::HalfOpen => {
                warn!(tool, "trial call failed, circuit breaker re-opened");
                state.state = BreakerState::Open;
            }
            BreakerState::Closed if state.failure_count >= state.config.failure_threshold => {
                warn!(
                    tool,
                    failures = state.failure_count,
                    "failure threshold reached, circuit breaker opened"
                );
                state.state = BreakerState::Open;
            }
            _ => {
                debug!(tool, failures = state.failure_count, "tool failure recorded");
            }
        }
    }

    fn entry(&self, tool: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<BreakerEntry>> {
        if let Some(entry) = self.tools.get(tool) {
            return entry;
        }
        self.tools
            .entry(tool.to_string())
            .or_insert_with(|| Mutex::new(BreakerEntry::new(self.default_config)))
            .downgrade()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (value.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
