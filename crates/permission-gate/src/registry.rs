//! Role registry: compiled roles keyed by name.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use toolgate_core_types::RoleId;

use crate::builtin::builtin_roles;
use crate::errors::PermissionError;
use crate::evaluator::CompiledRole;
use crate::model::Role;

/// Process-wide set of registered roles. Registration compiles patterns and
/// regexes once; lookups hand out shared compiled roles.
pub struct RoleRegistry {
    roles: DashMap<String, Arc<CompiledRole>>,
}

impl RoleRegistry {
    /// Empty registry, no builtins.
    pub fn new() -> Self {
        Self {
            roles: DashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in roles.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for role in builtin_roles() {
            // Builtins are covered by tests; a compile failure here is a
            // programming error in this crate, not a caller error.
            if let Err(err) = registry.register(role) {
                unreachable!("builtin role failed to compile: {err}");
            }
        }
        registry
    }

    /// Compile and register a role, replacing any previous role of the same
    /// name.
    pub fn register(&self, role: Role) -> Result<Arc<CompiledRole>, PermissionError> {
        let compiled = Arc::new(CompiledRole::compile(role)?);
        debug!(role = compiled.name(), "role registered");
        self.roles
            .insert(compiled.name().to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn get(&self, role: &RoleId) -> Option<Arc<CompiledRole>> {
        self.roles.get(role.as_str()).map(|entry| Arc::clone(&entry))
    }

    pub fn contains(&self, role: &RoleId) -> bool {
        self.roles.contains_key(role.as_str())
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Iterate registered roles (for wiring rate-limit configs).
    pub fn compiled_roles(&self) -> Vec<Arc<CompiledRole>> {
        self.roles.iter().map(|entry| Arc::clone(&entry)).collect()
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
