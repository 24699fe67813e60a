//! Role-based permission evaluation.
//!
//! A role is an ordered list of permission rules; each rule maps tool-name
//! patterns to an access level plus soft conditions (which can degrade an
//! allowed call to requires-approval) and hard restrictions (which always
//! deny). Rules are compiled once at registration so per-call evaluation
//! never re-parses patterns or regexes.

pub mod builtin;
pub mod errors;
pub mod evaluator;
pub mod loader;
pub mod matcher;
pub mod model;
pub mod registry;

pub use builtin::builtin_roles;
pub use errors::PermissionError;
pub use evaluator::{CompiledPermission, CompiledRole, PermissionEvaluator};
pub use loader::{load_roles_file, parse_roles, RolesFile};
pub use matcher::ToolMatcher;
pub use model::{Condition, Permission, PermissionLevel, Predicate, Restriction, Role};
pub use registry::RoleRegistry;
