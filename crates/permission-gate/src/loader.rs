//! Role configuration files.
//!
//! Roles can be declared in YAML (or JSON, which YAML parsing accepts) and
//! loaded at startup. Rate-limit windows are written as human-readable
//! durations ("30s", "1m"). Every role is compiled during loading, so a bad
//! pattern or regex fails the load instead of a later call.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use rate_limiter::{RateLimitConfig, ToolLimit};

use crate::errors::PermissionError;
use crate::evaluator::CompiledRole;
use crate::model::{Condition, Permission, Restriction, Role};

#[derive(Debug, Serialize, Deserialize)]
pub struct RolesFile {
    pub version: u32,
    pub roles: Vec<RoleSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    pub description: String,
    pub permissions: Vec<PermissionSpec>,
    #[serde(default)]
    pub rate_limits: Option<RateLimitSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PermissionSpec {
    pub patterns: Vec<String>,
    pub level: crate::model::PermissionLevel,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub restrictions: Vec<Restriction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RateLimitSpec {
    pub max_requests: u32,
    /// Human-readable window, e.g. "30s" or "1m".
    pub window: String,
    #[serde(default)]
    pub tool_limits: HashMap<String, ToolLimitSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolLimitSpec {
    pub max_requests: u32,
    pub window: String,
}

/// Parse and validate roles from a YAML/JSON string.
pub fn parse_roles(content: &str) -> Result<Vec<Role>, PermissionError> {
    let file: RolesFile = serde_yaml::from_str(content)
        .map_err(|err| PermissionError::Invalid(err.to_string()))?;
    if file.version != 1 {
        return Err(PermissionError::Invalid(format!(
            "unsupported roles file version {}",
            file.version
        )));
    }

    let mut roles = Vec::with_capacity(file.roles.len());
    for spec in file.roles {
        let role = role_from_spec(spec)?;
        // Compile to surface pattern/regex errors at load time.
        CompiledRole::compile(role.clone())?;
        roles.push(role);
    }
    Ok(roles)
}

/// Load and validate roles from a file on disk.
pub fn load_roles_file(path: &Path) -> Result<Vec<Role>, PermissionError> {
    let content = fs::read_to_string(path).map_err(|err| PermissionError::Io(err.to_string()))?;
    parse_roles(&content)
}

fn role_from_spec(spec: RoleSpec) -> Result<Role, PermissionError> {
    let rate_limits = spec.rate_limits.map(rate_limits_from_spec).transpose()?;
    Ok(Role {
        name: spec.name,
        description: spec.description,
        permissions: spec
            .permissions
            .into_iter()
            .map(|permission| Permission {
                patterns: permission.patterns,
                level: permission.level,
                conditions: permission.conditions,
                restrictions: permission.restrictions,
            })
            .collect(),
        rate_limits,
    })
}

fn rate_limits_from_spec(spec: RateLimitSpec) -> Result<RateLimitConfig, PermissionError> {
    let mut config = RateLimitConfig::new(spec.max_requests, parse_window(&spec.window)?);
    for (tool, limit) in spec.tool_limits {
        config.tool_limits.insert(
            tool,
            ToolLimit {
                max_requests: limit.max_requests,
                window_ms: parse_window(&limit.window)?,
            },
        );
    }
    Ok(config)
}

fn parse_window(raw: &str) -> Result<u64, PermissionError> {
    let duration = humantime::parse_duration(raw)
        .map_err(|_| PermissionError::Invalid(format!("invalid window duration: {raw}")))?;
    Ok(duration.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
version: 1
roles:
  - name: reviewer
    description: Reviews public repositories
    permissions:
      - patterns: ["navigate"]
        level: public
        restrictions:
          - type: domain_whitelist
            domains: ["github.com"]
      - patterns: ["screenshot", "read_*"]
        level: public
      - patterns: ["*"]
        level: blocked
    rate_limits:
      max_requests: 30
      window: 1m
      tool_limits:
        navigate:
          max_requests: 10
          window: 30s
"#;

    #[test]
    fn parses_roles_with_humantime_windows() {
        let roles = parse_roles(SAMPLE).unwrap();
        assert_eq!(roles.len(), 1);
        let reviewer = &roles[0];
        assert_eq!(reviewer.name, "reviewer");
        assert_eq!(reviewer.permissions.len(), 3);

        let limits = reviewer.rate_limits.as_ref().unwrap();
        assert_eq!(limits.max_requests, 30);
        assert_eq!(limits.window_ms, 60_000);
        let navigate = limits.tool_limits.get("navigate").unwrap();
        assert_eq!(navigate.window_ms, 30_000);
    }

    #[test]
    fn rejects_unsupported_version() {
        let result = parse_roles("version: 2\nroles: []\n");
        assert!(matches!(result, Err(PermissionError::Invalid(_))));
    }

    #[test]
    fn rejects_invalid_window() {
        let content = r#"
version: 1
roles:
  - name: broken
    description: bad window
    permissions:
      - patterns: ["*"]
        level: public
    rate_limits:
      max_requests: 1
      window: not-a-duration
"#;
        assert!(parse_roles(content).is_err());
    }

    #[test]
    fn rejects_invalid_pattern_at_load_time() {
        let content = r#"
version: 1
roles:
  - name: broken
    description: bad pattern
    permissions:
      - patterns: ["a*b*c"]
        level: public
"#;
        assert!(matches!(
            parse_roles(content),
            Err(PermissionError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let roles = load_roles_file(file.path()).unwrap();
        assert_eq!(roles[0].name, "reviewer");
    }
}
