//! Read-side gating: tenant isolation and data minimization.

use serde_json::json;

use crate::api::AuditStore;
use crate::errors::AuditResult;
use crate::model::{AuditEvent, QueryFilter, ReaderIdentity};

/// Queries the trail on behalf of a caller. Non-platform readers are pinned
/// to their own tenant regardless of the filter they supplied, and readers
/// below the compliance tier get ip/user-agent/details hidden.
pub async fn query_scoped(
    store: &dyn AuditStore,
    mut filter: QueryFilter,
    reader: &ReaderIdentity,
) -> AuditResult<Vec<AuditEvent>> {
    if !reader.crosses_tenants() {
        filter.tenant = reader.tenant.clone();
    }
    let events = store.query(&filter).await?;
    Ok(redact_for_reader(events, reader))
}

/// Field-level minimization for readers outside the compliance tier.
pub fn redact_for_reader(events: Vec<AuditEvent>, reader: &ReaderIdentity) -> Vec<AuditEvent> {
    if reader.is_compliance() {
        return events;
    }
    events
        .into_iter()
        .map(|mut event| {
            event.ip = Some("REDACTED".to_string());
            event.user_agent = Some("REDACTED".to_string());
            event.details = json!({ "info": "Restricted by RBAC" });
            event
        })
        .collect()
}
