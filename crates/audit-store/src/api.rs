use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::chain::{compute_hash, verify_chain, ChainVerification, GENESIS_HASH};
use crate::errors::AuditResult;
use crate::model::{AuditDraft, AuditEvent, QueryFilter};
use crate::sanitize::sanitize_details;

pub type SharedAuditStore = Arc<dyn AuditStore>;

/// Durable sink for audit events. `append` finalizes a draft: sanitizes the
/// detail payload, assigns id/timestamp, and links the hash chain under a
/// single writer section so the chain never forks.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, draft: AuditDraft) -> AuditResult<AuditEvent>;
    async fn query(&self, filter: &QueryFilter) -> AuditResult<Vec<AuditEvent>>;
    async fn tail(&self, limit: usize) -> AuditResult<Vec<AuditEvent>>;
    async fn verify_integrity(&self, limit: usize) -> AuditResult<ChainVerification>;
}

/// Reference store used by tests and the demo wiring; production swaps in a
/// database-backed implementation behind the same trait.
#[derive(Default)]
pub struct InMemoryAuditStore {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, draft: AuditDraft) -> AuditResult<AuditEvent> {
        let mut events = self.events.write();
        let previous_hash = events
            .last()
            .map(|event| event.current_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let mut event = AuditEvent {
            id: Uuid::new_v4().to_string(),
            occurred_at: Utc::now(),
            actor: draft.actor,
            actor_role: draft.actor_role,
            action: draft.action,
            target_type: draft.target_type,
            target_id: draft.target_id,
            patient_id: draft.patient_id,
            tenant: draft.tenant,
            ip: draft.ip,
            user_agent: draft.user_agent,
            outcome: draft.outcome,
            details: sanitize_details(&draft.details),
            request_id: draft.request_id,
            previous_hash,
            current_hash: String::new(),
        };
        event.current_hash = compute_hash(&event.previous_hash, &event);
        events.push(event.clone());
        Ok(event)
    }

    async fn query(&self, filter: &QueryFilter) -> AuditResult<Vec<AuditEvent>> {
        let events = self.events.read();
        Ok(events
            .iter()
            .rev()
            .filter(|event| filter.matches(event))
            .skip(filter.offset)
            .take(filter.effective_limit())
            .cloned()
            .collect())
    }

    async fn tail(&self, limit: usize) -> AuditResult<Vec<AuditEvent>> {
        let events = self.events.read();
        let start = events.len().saturating_sub(limit);
        Ok(events[start..].to_vec())
    }

    async fn verify_integrity(&self, limit: usize) -> AuditResult<ChainVerification> {
        let recent = self.tail(limit).await?;
        Ok(verify_chain(&recent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::REDACTION_MARKER;
    use serde_json::json;

    #[tokio::test]
    async fn append_sanitizes_and_chains() {
        let store = InMemoryAuditStore::new();
        let first = store
            .append(
                AuditDraft::new("patient.create", "Patient")
                    .details(json!({"first_name": "Jane", "method": "POST"})),
            )
            .await
            .unwrap();
        assert_eq!(first.action, "patient.create");
        assert_eq!(first.previous_hash, GENESIS_HASH);
        assert_eq!(first.details["first_name"], json!(REDACTION_MARKER));
        assert_eq!(first.details["method"], json!("POST"));

        let second = store
            .append(AuditDraft::new("patient.view", "Patient"))
            .await
            .unwrap();
        assert_eq!(second.previous_hash, first.current_hash);

        let verification = store.verify_integrity(100).await.unwrap();
        assert!(verification.verified);
        assert_eq!(verification.checked, 2);
    }

    #[tokio::test]
    async fn query_is_newest_first_and_bounded() {
        let store = InMemoryAuditStore::new();
        for i in 0..10 {
            store
                .append(AuditDraft::new(format!("action.{i}"), "Platform"))
                .await
                .unwrap();
        }
        let page = store.query(&QueryFilter::latest(3)).await.unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].action, "action.9");

        let offset_page = store
            .query(&QueryFilter {
                limit: 3,
                offset: 3,
                ..QueryFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(offset_page[0].action, "action.6");
    }
}
