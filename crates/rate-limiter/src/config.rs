use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-tool override inside a role's rate-limit configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolLimit {
    pub max_requests: u32,
    pub window_ms: u64,
}

/// Rate-limit configuration attached to a role.
///
/// The role-wide default applies to every tool unless `tool_limits` carries
/// an override for that tool name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: u64,
    #[serde(default)]
    pub tool_limits: HashMap<String, ToolLimit>,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
            tool_limits: HashMap::new(),
        }
    }

    pub fn with_tool_limit(mut self, tool: impl Into<String>, limit: ToolLimit) -> Self {
        self.tool_limits.insert(tool.into(), limit);
        self
    }

    /// Effective limit for a tool: the per-tool override if present,
    /// otherwise the role-wide default.
    pub fn limit_for(&self, tool: &str) -> ToolLimit {
        self.tool_limits.get(tool).copied().unwrap_or(ToolLimit {
            max_requests: self.max_requests,
            window_ms: self.window_ms,
        })
    }
}
