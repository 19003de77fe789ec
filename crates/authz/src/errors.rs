use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum AuthzError {
    #[error("authorization check failed: {0}")]
    Internal(String),
}

/// Role and privilege management failures.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("role not found")]
    RoleNotFound,
    #[error("role name already in use")]
    DuplicateRole,
    #[error("system roles cannot be modified or deleted")]
    SystemRoleProtected,
    #[error("role still has assigned accounts")]
    RoleInUse,
}
