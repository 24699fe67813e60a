//! Permission evaluation against a compiled role.

use regex::Regex;
use serde_json::Value;
use tracing::debug;
use url::Url;

use toolgate_core_types::{Decision, GuardrailViolation, Severity, ViolationKind};

use crate::errors::PermissionError;
use crate::matcher::ToolMatcher;
use crate::model::{Permission, PermissionLevel, Predicate, Restriction, Role};

/// A role with its patterns and regexes compiled for per-call evaluation.
#[derive(Debug)]
pub struct CompiledRole {
    role: Role,
    permissions: Vec<CompiledPermission>,
}

#[derive(Debug)]
pub struct CompiledPermission {
    source: Permission,
    matchers: Vec<ToolMatcher>,
    conditions: Vec<CompiledCondition>,
    restrictions: Vec<CompiledRestriction>,
}

#[derive(Debug)]
struct CompiledCondition {
    name: String,
    message: String,
    check: CompiledPredicate,
}

#[derive(Debug)]
enum CompiledPredicate {
    FieldPresent { field: String },
    FieldEquals { field: String, value: Value },
    FieldMatches { field: String, regex: Regex },
    MaxTextLength { field: String, limit: usize },
    UrlIsHttps,
    Never,
}

#[derive(Debug)]
enum CompiledRestriction {
    DomainWhitelist(Vec<String>),
    DomainBlacklist(Vec<String>),
    MaxSize {
        field: Option<String>,
        limit_bytes: usize,
    },
    Regex {
        field: String,
        regex: Regex,
    },
}

impl CompiledRole {
    pub fn compile(role: Role) -> Result<Self, PermissionError> {
        if role.name.trim().is_empty() {
            return Err(PermissionError::Invalid("role name is empty".to_string()));
        }
        let permissions = role
            .permissions
            .iter()
            .cloned()
            .map(CompiledPermission::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { role, permissions })
    }

    pub fn name(&self) -> &str {
        &self.role.name
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn rate_limits(&self) -> Option<&rate_limiter::RateLimitConfig> {
        self.role.rate_limits.as_ref()
    }

    /// First permission whose pattern set matches, in declaration order.
    fn find_permission(&self, tool: &str) -> Option<&CompiledPermission> {
        self.permissions
            .iter()
            .find(|permission| permission.matches(tool))
    }
}

impl CompiledPermission {
    fn compile(source: Permission) -> Result<Self, PermissionError> {
        if source.patterns.is_empty() {
            return Err(PermissionError::Invalid(
                "permission has no tool patterns".to_string(),
            ));
        }
        let matchers = source
            .patterns
            .iter()
            .map(|pattern| ToolMatcher::compile(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        let conditions = source
            .conditions
            .iter()
            .map(|condition| {
                Ok(CompiledCondition {
                    name: condition.name.clone(),
                    message: condition.message.clone(),
                    check: CompiledPredicate::compile(&condition.predicate)?,
                })
            })
            .collect::<Result<Vec<_>, PermissionError>>()?;
        let restrictions = source
            .restrictions
            .iter()
            .map(CompiledRestriction::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source,
            matchers,
            conditions,
            restrictions,
        })
    }

    pub fn level(&self) -> PermissionLevel {
        self.source.level
    }

    fn matches(&self, tool: &str) -> bool {
        self.matchers.iter().any(|matcher| matcher.matches(tool))
    }
}

impl CompiledPredicate {
    fn compile(predicate: &Predicate) -> Result<Self, PermissionError> {
        Ok(match predicate {
            Predicate::FieldPresent { field } => CompiledPredicate::FieldPresent {
                field: field.clone(),
            },
            Predicate::FieldEquals { field, value } => CompiledPredicate::FieldEquals {
                field: field.clone(),
                value: value.clone(),
            },
            Predicate::FieldMatches { field, pattern } => CompiledPredicate::FieldMatches {
                field: field.clone(),
                regex: compile_regex(pattern)?,
            },
            Predicate::MaxTextLength { field, limit } => CompiledPredicate::MaxTextLength {
                field: field.clone(),
                limit: *limit,
            },
            Predicate::UrlIsHttps => CompiledPredicate::UrlIsHttps,
            Predicate::Never => CompiledPredicate::Never,
        })
    }

    fn check(&self, args: &Value) -> bool {
        match self {
            CompiledPredicate::FieldPresent { field } => {
                args.get(field).map_or(false, |value| !value.is_null())
            }
            CompiledPredicate::FieldEquals { field, value } => args.get(field) == Some(value),
            CompiledPredicate::FieldMatches { field, regex } => match args.get(field) {
                None => true,
                Some(value) => value.as_str().map_or(false, |text| regex.is_match(text)),
            },
            CompiledPredicate::MaxTextLength { field, limit } => match args.get(field) {
                None => true,
                Some(value) => value.as_str().map_or(false, |text| text.len() <= *limit),
            },
            CompiledPredicate::UrlIsHttps => match args.get("url").and_then(Value::as_str) {
                None => true,
                Some(raw) => Url::parse(raw)
                    .map(|parsed| parsed.scheme() == "https")
                    .unwrap_or(false),
            },
            CompiledPredicate::Never => false,
        }
    }
}

impl CompiledRestriction {
    fn compile(restriction: &Restriction) -> Result<Self, PermissionError> {
        Ok(match restriction {
            Restriction::DomainWhitelist { domains } => {
                CompiledRestriction::DomainWhitelist(normalize_domains(domains))
            }
            Restriction::DomainBlacklist { domains } => {
                CompiledRestriction::DomainBlacklist(normalize_domains(domains))
            }
            Restriction::MaxSize { field, limit_bytes } => CompiledRestriction::MaxSize {
                field: field.clone(),
                limit_bytes: *limit_bytes,
            },
            Restriction::Regex { field, pattern } => CompiledRestriction::Regex {
                field: field.clone(),
                regex: compile_regex(pattern)?,
            },
        })
    }

    /// `Err` carries the displayable denial message.
    fn check(&self, args: &Value) -> Result<(), String> {
        match self {
            CompiledRestriction::DomainWhitelist(domains) => {
                check_domains(args, domains, DomainMode::Whitelist)
            }
            CompiledRestriction::DomainBlacklist(domains) => {
                check_domains(args, domains, DomainMode::Blacklist)
            }
            CompiledRestriction::MaxSize { field, limit_bytes } => {
                let size = match field {
                    Some(field) => match args.get(field) {
                        None => return Ok(()),
                        Some(value) => value
                            .as_str()
                            .map(str::len)
                            .unwrap_or_else(|| value.to_string().len()),
                    },
                    None => args.to_string().len(),
                };
                if size > *limit_bytes {
                    Err(format!(
                        "argument size {} exceeds limit of {} bytes",
                        size, limit_bytes
                    ))
                } else {
                    Ok(())
                }
            }
            CompiledRestriction::Regex { field, regex } => match args.get(field) {
                None => Ok(()),
                Some(value) => {
                    let Some(text) = value.as_str() else {
                        return Err(format!("argument '{}' is not a string", field));
                    };
                    if regex.is_match(text) {
                        Ok(())
                    } else {
                        Err(format!(
                            "argument '{}' does not match the required pattern",
                            field
                        ))
                    }
                }
            },
        }
    }
}

enum DomainMode {
    Whitelist,
    Blacklist,
}

fn check_domains(args: &Value, domains: &[String], mode: DomainMode) -> Result<(), String> {
    // URL restrictions are a no-op when the call has no url argument.
    let Some(raw) = args.get("url").and_then(Value::as_str) else {
        return Ok(());
    };
    let parsed = Url::parse(raw).map_err(|_| "Invalid URL format".to_string())?;
    let Some(host) = parsed.host_str() else {
        return Err("Invalid URL format".to_string());
    };
    let host = host.to_ascii_lowercase();
    let listed = domains.iter().any(|domain| domain_matches(&host, domain));
    match mode {
        DomainMode::Whitelist if !listed => {
            Err(format!("domain '{}' is not in the allowed list", host))
        }
        DomainMode::Blacklist if listed => Err(format!("domain '{}' is blocked", host)),
        _ => Ok(()),
    }
}

/// A listed domain matches the exact host or any subdomain of it.
fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

fn normalize_domains(domains: &[String]) -> Vec<String> {
    domains
        .iter()
        .map(|domain| domain.trim().to_ascii_lowercase())
        .collect()
}

fn compile_regex(pattern: &str) -> Result<Regex, PermissionError> {
    Regex::new(pattern).map_err(|source| PermissionError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Stateless evaluator: resolves a (role, tool, args) triple to a decision.
pub struct PermissionEvaluator;

impl PermissionEvaluator {
    pub fn evaluate(role: &CompiledRole, tool: &str, args: &Value) -> Decision {
        let Some(permission) = role.find_permission(tool) else {
            debug!(role = role.name(), tool, "no permission rule matched");
            return Decision::deny_with(
                format!("no permission for tool '{}'", tool),
                GuardrailViolation::new(
                    ViolationKind::Permission,
                    Severity::Medium,
                    format!("role '{}' has no permission for '{}'", role.name(), tool),
                ),
            );
        };

        if permission.level() == PermissionLevel::Blocked {
            return Decision::deny_with(
                format!("tool '{}' is blocked for role '{}'", tool, role.name()),
                GuardrailViolation::new(
                    ViolationKind::Permission,
                    Severity::High,
                    format!("blocked tool '{}' requested", tool),
                ),
            );
        }

        for condition in &permission.conditions {
            if condition.check.check(args) {
                continue;
            }
            debug!(
                role = role.name(),
                tool,
                condition = condition.name,
                "condition failed"
            );
            // Only `restricted` degrades to approval; every other level
            // denies on the first failed condition.
            if permission.level() == PermissionLevel::Restricted {
                return Decision::needs_approval(condition.message.clone());
            }
            return Decision::deny_with(
                condition.message.clone(),
                GuardrailViolation::new(
                    ViolationKind::Permission,
                    Severity::Medium,
                    format!("condition '{}' failed for '{}'", condition.name, tool),
                ),
            );
        }

        for restriction in &permission.restrictions {
            if let Err(message) = restriction.check(args) {
                debug!(role = role.name(), tool, %message, "restriction failed");
                return Decision::deny_with(
                    message.clone(),
                    GuardrailViolation::new(ViolationKind::Restriction, Severity::High, message),
                );
            }
        }

        Decision::allow()
    }
}
