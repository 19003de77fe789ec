//! Append-only audit trail for the clinical access layer.
//!
//! Every authorization decision and PHI-relevant operation lands here as an
//! immutable event: sanitized of PHI, hash-chained for tamper evidence, and
//! written through a non-blocking recorder so a slow or failing audit sink
//! can never fail the guarded operation.

pub mod api;
pub mod chain;
pub mod errors;
pub mod export;
pub mod metrics;
pub mod model;
pub mod reader;
pub mod recorder;
pub mod sanitize;

pub use api::{AuditStore, InMemoryAuditStore};
pub use chain::{verify_chain, ChainVerification, GENESIS_HASH};
pub use errors::{AuditError, AuditResult};
pub use export::{export_csv, ExportFilters, EXPORT_COLUMNS, EXPORT_ROW_LIMIT};
pub use metrics::{AuditMetrics, MetricsSnapshot};
pub use model::{AuditDraft, AuditEvent, QueryFilter, ReaderIdentity};
pub use reader::{query_scoped, redact_for_reader};
pub use recorder::{AuditRecorder, RecorderConfig};
pub use sanitize::{sanitize_details, REDACTION_MARKER};
