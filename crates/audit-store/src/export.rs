//! CSV export of the audit trail.
//!
//! Exporting is itself an auditable action: the `EXPORT_CREATED` event,
//! including the filters used, is recorded durably before any data is
//! returned. Exports are always tenant-scoped and row-bounded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use chartgate_core_types::{Outcome, RequestContext};

use crate::errors::AuditResult;
use crate::model::{AuditDraft, AuditEvent, QueryFilter, ReaderIdentity};
use crate::reader::query_scoped;
use crate::recorder::AuditRecorder;

pub const EXPORT_COLUMNS: [&str; 9] = [
    "Timestamp",
    "Action",
    "Entity",
    "Entity ID",
    "Actor",
    "Role",
    "IP",
    "User Agent",
    "Details",
];

pub const EXPORT_ROW_LIMIT: usize = 5_000;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExportFilters {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub action: Option<String>,
}

/// Produces the CSV document. The reader must already have been authorized
/// for audit export by the caller; this function only enforces tenant scope
/// and the self-audit invariant.
pub async fn export_csv(
    recorder: &AuditRecorder,
    reader: &ReaderIdentity,
    filters: &ExportFilters,
    ctx: &RequestContext,
) -> AuditResult<String> {
    let mut draft = AuditDraft::new("EXPORT_CREATED", "AuditLog")
        .details(json!({
            "format": "CSV",
            "filters": filters,
        }))
        .context(ctx);
    draft.tenant = reader.tenant.clone();
    if let Some(role) = &reader.role {
        draft = draft.actor_role(role.clone());
    }
    draft = draft.outcome(Outcome::Success);
    // Durable before any rows leave the system.
    recorder.record_now(draft).await;

    let filter = QueryFilter {
        start: filters.start,
        end: filters.end,
        action: filters.action.clone(),
        tenant: reader.tenant.clone(),
        limit: EXPORT_ROW_LIMIT,
        ..QueryFilter::default()
    };
    let events = query_scoped(recorder.store().as_ref(), filter, reader).await?;
    Ok(render_csv(&events))
}

fn render_csv(events: &[AuditEvent]) -> String {
    let mut rows = Vec::with_capacity(events.len() + 1);
    rows.push(EXPORT_COLUMNS.join(","));
    for event in events {
        let user_agent = event.user_agent.as_deref().unwrap_or("N/A");
        let details = event.details.to_string();
        let row = [
            event.occurred_at.to_rfc3339(),
            event.action.clone(),
            event.target_type.clone(),
            event
                .target_id
                .as_ref()
                .map(|id| id.0.clone())
                .unwrap_or_else(|| "N/A".to_string()),
            event
                .actor
                .as_ref()
                .map(|id| id.0.clone())
                .unwrap_or_else(|| "System".to_string()),
            event
                .actor_role
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            event.ip.clone().unwrap_or_else(|| "N/A".to_string()),
            quote(user_agent),
            quote(&details),
        ];
        rows.push(row.join(","));
    }
    rows.join("\n")
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AuditStore, InMemoryAuditStore};
    use crate::recorder::RecorderConfig;
    use chartgate_core_types::TenantId;

    #[tokio::test]
    async fn export_records_itself_before_returning_rows() {
        let store = InMemoryAuditStore::new();
        let tenant = TenantId("clinic-a".to_string());
        let mut seed = AuditDraft::new("patient.view", "Patient");
        seed.tenant = Some(tenant.clone());
        store.append(seed).await.unwrap();

        let recorder = AuditRecorder::spawn(store.clone(), RecorderConfig::default());
        let reader = ReaderIdentity {
            tenant: Some(tenant),
            role: Some("Compliance".to_string()),
            is_admin: false,
        };
        let ctx = RequestContext::new("/audit/admin/export", "GET");

        let csv = export_csv(&recorder, &reader, &ExportFilters::default(), &ctx)
            .await
            .unwrap();

        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), EXPORT_COLUMNS.join(","));
        // The export's own entry is part of the trail it returned.
        assert!(csv.contains("EXPORT_CREATED"));
        assert!(csv.contains("patient.view"));

        let trail = store.query(&QueryFilter::latest(10)).await.unwrap();
        assert_eq!(trail[0].action, "EXPORT_CREATED");
        assert_eq!(trail[0].details["format"], serde_json::json!("CSV"));
    }

    #[test]
    fn csv_quoting_doubles_embedded_quotes() {
        assert_eq!(quote(r#"a "b" c"#), r#""a ""b"" c""#);
    }
}
