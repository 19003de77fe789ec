//! Privilege and role authorization with deny-by-default semantics.
//!
//! Decisions read only the per-request principal; the one escape hatch is
//! the admin flag, which bypasses every check and is itself visible to the
//! audit layer. When the privilege store was unreachable at principal
//! resolution time, checks fall back to a static role table kept in
//! lock-step with the canonical grants.

pub mod aliases;
pub mod authorizer;
pub mod defaults;
pub mod errors;
pub mod model;
pub mod store;

pub use aliases::{canonical_role, is_super_admin_role};
pub use authorizer::PrivilegeAuthorizer;
pub use defaults::{fallback_privileges, seed_grants};
pub use errors::{AuthzError, StoreError};
pub use model::{AllowReason, Decision, Denial, Privilege, Requirement, Role};
pub use store::{AuthzStore, InMemoryAuthzStore};
