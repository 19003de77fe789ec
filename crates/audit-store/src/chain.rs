//! SHA-256 hash chaining for tamper evidence.
//!
//! Each event hashes its canonical fields together with the previous
//! event's hash; verification walks the stored order oldest to newest and
//! reports the first break.

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::model::AuditEvent;

pub const GENESIS_HASH: &str = "GENESIS_HASH";

/// Canonical hash input: the fields an attacker would need to rewrite.
pub fn compute_hash(previous_hash: &str, event: &AuditEvent) -> String {
    let canonical = json!({
        "action": event.action,
        "target_type": event.target_type,
        "target_id": event.target_id,
        "patient_id": event.patient_id,
        "actor": event.actor,
        "outcome": event.outcome,
        "timestamp": event.occurred_at.to_rfc3339(),
    });
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone, Debug)]
pub struct ChainVerification {
    pub verified: bool,
    /// Id of the first event whose linkage or content hash fails.
    pub broken_at: Option<String>,
    pub checked: usize,
}

/// Verifies linkage and recomputes content hashes over events ordered
/// oldest to newest.
pub fn verify_chain(events: &[AuditEvent]) -> ChainVerification {
    let mut result = ChainVerification {
        verified: true,
        broken_at: None,
        checked: 0,
    };

    let mut expected_previous: Option<&str> = None;
    for event in events {
        if let Some(previous) = expected_previous {
            if event.previous_hash != previous {
                result.verified = false;
                result.broken_at = Some(event.id.clone());
                return result;
            }
        }
        if compute_hash(&event.previous_hash, event) != event.current_hash {
            result.verified = false;
            result.broken_at = Some(event.id.clone());
            return result;
        }
        expected_previous = Some(&event.current_hash);
        result.checked += 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartgate_core_types::Outcome;
    use chrono::Utc;
    use serde_json::Value;

    fn chained_events(n: usize) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        let mut previous = GENESIS_HASH.to_string();
        for i in 0..n {
            let mut event = AuditEvent {
                id: format!("e-{i}"),
                occurred_at: Utc::now(),
                actor: None,
                actor_role: None,
                action: format!("ACTION_{i}"),
                target_type: "Patient".into(),
                target_id: None,
                patient_id: None,
                tenant: None,
                ip: None,
                user_agent: None,
                outcome: Outcome::Success,
                details: Value::Null,
                request_id: None,
                previous_hash: previous.clone(),
                current_hash: String::new(),
            };
            event.current_hash = compute_hash(&previous, &event);
            previous = event.current_hash.clone();
            events.push(event);
        }
        events
    }

    #[test]
    fn intact_chain_verifies() {
        let events = chained_events(5);
        let result = verify_chain(&events);
        assert!(result.verified);
        assert_eq!(result.checked, 5);
        assert!(result.broken_at.is_none());
    }

    #[test]
    fn tampered_content_is_detected() {
        let mut events = chained_events(5);
        events[2].action = "SOMETHING_ELSE".into();
        let result = verify_chain(&events);
        assert!(!result.verified);
        assert_eq!(result.broken_at.as_deref(), Some("e-2"));
    }

    #[test]
    fn broken_linkage_is_detected() {
        let mut events = chained_events(5);
        events[3].previous_hash = "forged".into();
        let result = verify_chain(&events);
        assert!(!result.verified);
        assert_eq!(result.broken_at.as_deref(), Some("e-3"));
    }
}
