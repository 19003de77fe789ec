use thiserror::Error;

/// Authentication failures. Display strings double as the caller-visible
/// error bodies, so they stay minimal-disclosure: no internals, no hints
/// beyond what the caller already knows.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AuthError {
    #[error("No token provided")]
    TokenMissing,
    #[error("Invalid or expired token")]
    InvalidOrExpired,
    /// Token verified but its subject does not resolve to an account.
    #[error("Invalid token")]
    InvalidToken,
    #[error("Account is suspended or inactive")]
    AccountInactive,
    /// The account store could not be reached. Fail-secure: surfaces as a
    /// generic 401, never as an open gate.
    #[error("Invalid token")]
    ContextUnavailable,
}

pub type AuthResult<T> = Result<T, AuthError>;
