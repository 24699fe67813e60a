//! Pure-data role model. Everything here is serde-friendly configuration;
//! compilation into matchers happens at registration (see `evaluator`).

use rate_limiter::RateLimitConfig;
use serde::{Deserialize, Serialize};

/// Access level a permission rule grants for the tools it matches.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Public,
    Restricted,
    Admin,
    Blocked,
}

/// Soft predicate over the call arguments. A failing condition on a
/// `restricted` permission degrades the call to requires-approval; on any
/// other level it denies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub message: String,
    pub predicate: Predicate,
}

impl Condition {
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
        predicate: Predicate,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            predicate,
        }
    }
}

/// Predicates conditions can express. Field-addressed checks are no-ops
/// when the field is absent; present values of the wrong type fail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// The named argument must be present and non-null.
    FieldPresent { field: String },
    /// The named argument must equal the given JSON value.
    FieldEquals {
        field: String,
        value: serde_json::Value,
    },
    /// The named string argument must match the regex.
    FieldMatches { field: String, pattern: String },
    /// The named string argument must not exceed `limit` characters.
    MaxTextLength { field: String, limit: usize },
    /// The `url` argument, when present, must use https.
    UrlIsHttps,
    /// Always fails: every call matching the rule escalates (or denies,
    /// depending on level).
    Never,
}

/// Hard structural constraint over the call arguments. Any restriction
/// failure denies outright, regardless of level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Restriction {
    /// The `url` argument's host must be one of these domains (or a
    /// subdomain of one).
    DomainWhitelist { domains: Vec<String> },
    /// The `url` argument's host must not be one of these domains (or a
    /// subdomain of one).
    DomainBlacklist { domains: Vec<String> },
    /// Size cap in bytes: over the named string argument, or over the
    /// serialized argument object when `field` is unset.
    MaxSize {
        field: Option<String>,
        limit_bytes: usize,
    },
    /// The named string argument must match the regex.
    Regex { field: String, pattern: String },
}

/// One permission rule: tool-name patterns plus level, conditions and
/// restrictions. Within a role, rules are evaluated in declaration order
/// and the first matching rule wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub patterns: Vec<String>,
    pub level: PermissionLevel,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub restrictions: Vec<Restriction>,
}

impl Permission {
    pub fn new(patterns: Vec<&str>, level: PermissionLevel) -> Self {
        Self {
            patterns: patterns.into_iter().map(str::to_string).collect(),
            level,
            conditions: Vec::new(),
            restrictions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }
}

/// A named bundle of permissions and rate limits applied to a caller.
/// Immutable, process-wide configuration registered at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub rate_limits: Option<RateLimitConfig>,
}

impl Role {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            permissions: Vec::new(),
            rate_limits: None,
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn with_rate_limits(mut self, config: RateLimitConfig) -> Self {
        self.rate_limits = Some(config);
        self
    }
}
