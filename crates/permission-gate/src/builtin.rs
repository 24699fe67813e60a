//! Built-in roles registered by default: guest, user, admin, automation.

use rate_limiter::{RateLimitConfig, ToolLimit};

use crate::model::{Condition, Permission, PermissionLevel, Predicate, Restriction, Role};

const MINUTE_MS: u64 = 60_000;

/// Hosts an agent should never be steered into from page content.
fn internal_hosts() -> Vec<String> {
    vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
        "0.0.0.0".to_string(),
        "169.254.169.254".to_string(),
    ]
}

fn manual_review(message: &str) -> Condition {
    Condition::new("manual_review", message, Predicate::Never)
}

pub fn guest_role() -> Role {
    Role::new("guest", "Unauthenticated caller: read-only observation")
        .with_permission(Permission::new(
            vec!["screenshot", "read_*", "extract_*"],
            PermissionLevel::Public,
        ))
        .with_permission(
            Permission::new(vec!["navigate"], PermissionLevel::Restricted)
                .with_condition(Condition::new(
                    "https_only",
                    "Guests may only navigate to https pages",
                    Predicate::UrlIsHttps,
                ))
                .with_restriction(Restriction::DomainBlacklist {
                    domains: internal_hosts(),
                }),
        )
        .with_permission(Permission::new(vec!["*"], PermissionLevel::Blocked))
        .with_rate_limits(RateLimitConfig::new(10, MINUTE_MS).with_tool_limit(
            "navigate",
            ToolLimit {
                max_requests: 5,
                window_ms: MINUTE_MS,
            },
        ))
}

pub fn user_role() -> Role {
    Role::new("user", "Signed-in caller driving their own session")
        .with_permission(
            Permission::new(vec!["navigate"], PermissionLevel::Public).with_restriction(
                Restriction::DomainBlacklist {
                    domains: internal_hosts(),
                },
            ),
        )
        .with_permission(
            Permission::new(vec!["type_text"], PermissionLevel::Public).with_restriction(
                Restriction::MaxSize {
                    field: Some("text".to_string()),
                    limit_bytes: 16 * 1024,
                },
            ),
        )
        .with_permission(Permission::new(
            vec![
                "click",
                "select_option",
                "scroll",
                "wait",
                "screenshot",
                "read_*",
                "extract_*",
            ],
            PermissionLevel::Public,
        ))
        .with_permission(
            Permission::new(vec!["download"], PermissionLevel::Restricted)
                .with_condition(manual_review("Downloads need explicit confirmation")),
        )
        .with_permission(Permission::new(
            vec!["execute_script"],
            PermissionLevel::Blocked,
        ))
        .with_permission(
            Permission::new(vec!["*"], PermissionLevel::Restricted)
                .with_condition(manual_review("Unrecognized tools need explicit confirmation")),
        )
        .with_rate_limits(RateLimitConfig::new(60, MINUTE_MS).with_tool_limit(
            "navigate",
            ToolLimit {
                max_requests: 20,
                window_ms: MINUTE_MS,
            },
        ))
}

pub fn admin_role() -> Role {
    Role::new("admin", "Operator with unrestricted tool access")
        .with_permission(Permission::new(vec!["*"], PermissionLevel::Admin))
}

pub fn automation_role() -> Role {
    Role::new("automation", "Headless pipelines running vetted flows")
        .with_permission(
            Permission::new(
                vec![
                    "navigate",
                    "click",
                    "type_text",
                    "select_option",
                    "scroll",
                    "wait",
                    "screenshot",
                    "read_*",
                    "extract_*",
                ],
                PermissionLevel::Public,
            )
            .with_restriction(Restriction::DomainBlacklist {
                domains: internal_hosts(),
            }),
        )
        .with_permission(
            Permission::new(vec!["download"], PermissionLevel::Restricted)
                .with_condition(manual_review("Downloads need explicit confirmation")),
        )
        .with_permission(Permission::new(vec!["*"], PermissionLevel::Blocked))
        .with_rate_limits(RateLimitConfig::new(240, MINUTE_MS))
}

/// The four roles every control plane instance supports out of the box.
pub fn builtin_roles() -> Vec<Role> {
    vec![guest_role(), user_role(), admin_role(), automation_role()]
}
