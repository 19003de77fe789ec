use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum AuditError {
    #[error("append rejected: {0}")]
    AppendRejected(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("export too large")]
    ExportTooLarge,
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
