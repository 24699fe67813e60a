//! Tool-name pattern matching, compiled once at role registration.

use crate::errors::PermissionError;

/// Compiled form of a tool-name pattern: an exact name, `*`, or a glob
/// with a single `*` (prefix, suffix, or both sides fixed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolMatcher {
    Exact(String),
    Any,
    Prefix(String),
    Suffix(String),
    Infix { prefix: String, suffix: String },
}

impl ToolMatcher {
    pub fn compile(pattern: &str) -> Result<Self, PermissionError> {
        if pattern.is_empty() {
            return Err(PermissionError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "empty pattern".to_string(),
            });
        }
        if pattern == "*" {
            return Ok(ToolMatcher::Any);
        }
        if !pattern.contains('*') {
            return Ok(ToolMatcher::Exact(pattern.to_string()));
        }

        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() != 2 {
            return Err(PermissionError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "at most one '*' wildcard is supported".to_string(),
            });
        }
        let (prefix, suffix) = (parts[0], parts[1]);
        Ok(match (prefix.is_empty(), suffix.is_empty()) {
            (true, false) => ToolMatcher::Suffix(suffix.to_string()),
            (false, true) => ToolMatcher::Prefix(prefix.to_string()),
            (false, false) => ToolMatcher::Infix {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            },
            // "*" alone was handled above.
            (true, true) => ToolMatcher::Any,
        })
    }

    pub fn matches(&self, tool: &str) -> bool {
        match self {
            ToolMatcher::Exact(name) => tool == name,
            ToolMatcher::Any => true,
            ToolMatcher::Prefix(prefix) => tool.starts_with(prefix),
            ToolMatcher::Suffix(suffix) => tool.ends_with(suffix),
            ToolMatcher::Infix { prefix, suffix } => {
                tool.len() >= prefix.len() + suffix.len()
                    && tool.starts_with(prefix)
                    && tool.ends_with(suffix)
            }
        }
    }
}
