//! Sliding-window rate limiting keyed by (role, tool).
//!
//! Each admitted call is recorded as a timestamp; a check counts the
//! timestamps still inside the trailing window and denies once the
//! configured maximum is reached. Windows are pruned on every check so the
//! per-key lists never grow without bound.

pub mod config;

pub use config::{RateLimitConfig, ToolLimit};

use std::collections::VecDeque;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use toolgate_core_types::RoleId;

/// Verdict of a rate-limit check. Denials carry a displayable reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl RateDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn denied(reason: String) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
struct WindowKey {
    role: String,
    tool: String,
}

impl WindowKey {
    fn new(role: &RoleId, tool: &str) -> Self {
        Self {
            role: role.0.clone(),
            tool: tool.to_string(),
        }
    }
}

/// Sliding-window request counter shared by concurrently in-flight calls.
///
/// Every mutation goes through the per-key mutex, so parallel dispatch
/// cannot lose updates. Windows are created lazily on first use and live
/// for the process lifetime.
pub struct RateLimiter {
    configs: DashMap<String, RateLimitConfig>,
    windows: DashMap<WindowKey, Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
            windows: DashMap::new(),
        }
    }

    /// Register (or replace) the rate-limit configuration for a role.
    /// Roles without a configuration are never rate limited.
    pub fn set_role_config(&self, role: &RoleId, config: RateLimitConfig) {
        self.configs.insert(role.0.clone(), config);
    }

    /// Check whether one more call for `(role, tool)` fits in the window.
    /// Pure query: nothing is recorded.
    pub fn check(&self, role: &RoleId, tool: &str) -> RateDecision {
        self.check_at(role, tool, Instant::now())
    }

    /// Record an admitted call. Callers must only record after a successful
    /// admission; the append itself is unconditional.
    pub fn record(&self, role: &RoleId, tool: &str) {
        self.record_at(role, tool, Instant::now());
    }

    fn check_at(&self, role: &RoleId, tool: &str, now: Instant) -> RateDecision {
        let Some(config) = self.configs.get(role.as_str()) else {
            return RateDecision::allowed();
        };
        let limit = config.limit_for(tool);
        drop(config);

        let key = WindowKey::new(role, tool);
        let entry = self
            .windows
            .entry(key)
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut window = entry.lock();
        prune(&mut window, now, limit.window_ms);

        if (window.len() as u32) < limit.max_requests {
            RateDecision::allowed()
        } else {
            debug!(
                role = %role,
                tool,
                max_requests = limit.max_requests,
                window_ms = limit.window_ms,
                "rate limit reached"
            );
            RateDecision::denied(format!(
                "rate limit exceeded for tool '{}': {} requests per {}ms",
                tool, limit.max_requests, limit.window_ms
            ))
        }
    }

    fn record_at(&self, role: &RoleId, tool: &str, now: Instant) {
        let window_ms = self
            .configs
            .get(role.as_str())
            .map(|config| config.limit_for(tool).window_ms);
        let key = WindowKey::new(role, tool);
        let entry = self
            .windows
            .entry(key)
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut window = entry.lock();
        if let Some(window_ms) = window_ms {
            prune(&mut window, now, window_ms);
        }
        window.push_back(now);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop timestamps that have fallen out of the trailing window. A call made
/// exactly `window_ms` ago no longer counts.
fn prune(window: &mut VecDeque<Instant>, now: Instant, window_ms: u64) {
    while let Some(oldest) = window.front() {
        let age_ms = now
            .checked_duration_since(*oldest)
            .map(|age| age.as_millis() as u64)
            .unwrap_or(0);
        if age_ms >= window_ms {
            window.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter_with(role: &RoleId, config: RateLimitConfig) -> RateLimiter {
        let limiter = RateLimiter::new();
        limiter.set_role_config(role, config);
        limiter
    }

    #[test]
    fn unconfigured_role_is_never_limited() {
        let limiter = RateLimiter::new();
        let role = RoleId::from("guest");
        for _ in 0..100 {
            assert!(limiter.check(&role, "navigate").allowed);
            limiter.record(&role, "navigate");
        }
    }

    #[test]
    fn denies_once_window_is_full() {
        let role = RoleId::from("user");
        let limiter = limiter_with(&role, RateLimitConfig::new(3, 60_000));
        let base = Instant::now();

        for i in 0..3 {
            let decision = limiter.check_at(&role, "click", base + Duration::from_millis(i));
            assert!(decision.allowed, "call {i} should be admitted");
            limiter.record_at(&role, "click", base + Duration::from_millis(i));
        }

        let fourth = limiter.check_at(&role, "click", base + Duration::from_millis(10));
        assert!(!fourth.allowed);
        assert!(fourth.reason.unwrap().contains("rate limit exceeded"));
    }

    #[test]
    fn window_slides_after_oldest_call_expires() {
        let role = RoleId::from("user");
        let limiter = limiter_with(&role, RateLimitConfig::new(2, 1_000));
        let base = Instant::now();

        limiter.record_at(&role, "navigate", base);
        limiter.record_at(&role, "navigate", base + Duration::from_millis(100));
        assert!(
            !limiter
                .check_at(&role, "navigate", base + Duration::from_millis(500))
                .allowed
        );

        // Exactly window_ms after the oldest call it no longer counts.
        assert!(
            limiter
                .check_at(&role, "navigate", base + Duration::from_millis(1_000))
                .allowed
        );
    }

    #[test]
    fn tool_override_takes_precedence_over_role_default() {
        let role = RoleId::from("automation");
        let config = RateLimitConfig::new(100, 60_000).with_tool_limit(
            "navigate",
            ToolLimit {
                max_requests: 1,
                window_ms: 60_000,
            },
        );
        let limiter = limiter_with(&role, config);
        let base = Instant::now();

        limiter.record_at(&role, "navigate", base);
        assert!(
            !limiter
                .check_at(&role, "navigate", base + Duration::from_millis(1))
                .allowed
        );
        // Other tools still use the generous role default.
        assert!(
            limiter
                .check_at(&role, "click", base + Duration::from_millis(1))
                .allowed
        );
    }

    #[test]
    fn keys_are_independent_per_role_and_tool() {
        let alice = RoleId::from("alice");
        let bob = RoleId::from("bob");
        let limiter = RateLimiter::new();
        limiter.set_role_config(&alice, RateLimitConfig::new(1, 60_000));
        limiter.set_role_config(&bob, RateLimitConfig::new(1, 60_000));
        let base = Instant::now();

        limiter.record_at(&alice, "click", base);
        assert!(!limiter.check_at(&alice, "click", base).allowed);
        assert!(limiter.check_at(&alice, "navigate", base).allowed);
        assert!(limiter.check_at(&bob, "click", base).allowed);
    }
}
