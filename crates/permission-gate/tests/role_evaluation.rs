use permission_gate::{
    parse_roles, Permission, PermissionEvaluator, PermissionLevel, Role, RoleRegistry,
};
use serde_json::json;
use toolgate_core_types::{DecisionOutcome, RoleId};

#[test]
fn loaded_roles_evaluate_like_programmatic_ones() {
    let content = r#"
version: 1
roles:
  - name: scraper
    description: Collects data from approved sites
    permissions:
      - patterns: ["navigate"]
        level: public
        restrictions:
          - type: domain_whitelist
            domains: ["github.com", "docs.rs"]
      - patterns: ["extract_*", "screenshot"]
        level: public
      - patterns: ["*"]
        level: blocked
"#;
    let registry = RoleRegistry::new();
    for role in parse_roles(content).unwrap() {
        registry.register(role).unwrap();
    }
    let scraper = registry.get(&RoleId::from("scraper")).unwrap();

    assert!(PermissionEvaluator::evaluate(
        &scraper,
        "navigate",
        &json!({"url": "https://docs.rs/tokio"})
    )
    .is_allowed());
    assert_eq!(
        PermissionEvaluator::evaluate(
            &scraper,
            "navigate",
            &json!({"url": "https://evil.com"})
        )
        .outcome,
        DecisionOutcome::Blocked
    );
    assert!(PermissionEvaluator::evaluate(&scraper, "extract_text", &json!({})).is_allowed());
    assert_eq!(
        PermissionEvaluator::evaluate(&scraper, "type_text", &json!({})).outcome,
        DecisionOutcome::Blocked
    );
}

#[test]
fn declaration_order_beats_specificity() {
    // A broad rule declared first shadows a later exact rule: evaluation is
    // strictly first-match-wins, with no specificity heuristic.
    let registry = RoleRegistry::new();
    registry
        .register(
            Role::new("ordered", "wildcard first")
                .with_permission(Permission::new(vec!["*"], PermissionLevel::Public))
                .with_permission(Permission::new(vec!["navigate"], PermissionLevel::Blocked)),
        )
        .unwrap();
    let role = registry.get(&RoleId::from("ordered")).unwrap();
    assert!(PermissionEvaluator::evaluate(&role, "navigate", &json!({})).is_allowed());
}
