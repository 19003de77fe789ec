use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chartgate_core_types::{AccountId, Outcome, RequestContext, RequestId, TargetId, TenantId};

/// Immutable audit trail row. Created once, read many times, never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub occurred_at: DateTime<Utc>,
    pub actor: Option<AccountId>,
    pub actor_role: Option<String>,
    /// Stored verbatim, e.g. `patient:view.denied`, `EXPORT_CREATED`;
    /// filters compare case-insensitively.
    pub action: String,
    pub target_type: String,
    pub target_id: Option<TargetId>,
    pub patient_id: Option<TargetId>,
    pub tenant: Option<TenantId>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub outcome: Outcome,
    /// Sanitized before persistence; never contains raw PHI.
    pub details: Value,
    pub request_id: Option<RequestId>,
    pub previous_hash: String,
    pub current_hash: String,
}

/// Input to the recorder: everything the caller knows, before the store
/// assigns identity, timestamp, and chain hashes.
#[derive(Clone, Debug)]
pub struct AuditDraft {
    pub actor: Option<AccountId>,
    pub actor_role: Option<String>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<TargetId>,
    pub patient_id: Option<TargetId>,
    pub tenant: Option<TenantId>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub outcome: Outcome,
    pub details: Value,
    pub request_id: Option<RequestId>,
}

impl AuditDraft {
    pub fn new(action: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            actor: None,
            actor_role: None,
            action: action.into(),
            target_type: target_type.into(),
            target_id: None,
            patient_id: None,
            tenant: None,
            ip: None,
            user_agent: None,
            outcome: Outcome::Success,
            details: Value::Null,
            request_id: None,
        }
    }

    pub fn actor(mut self, actor: AccountId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn actor_role(mut self, role: impl Into<String>) -> Self {
        self.actor_role = Some(role.into());
        self
    }

    pub fn target(mut self, target_id: TargetId) -> Self {
        self.target_id = Some(target_id);
        self
    }

    pub fn patient(mut self, patient_id: TargetId) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Copies tenant, peer, and correlation data out of the request context.
    pub fn context(mut self, ctx: &RequestContext) -> Self {
        self.tenant = ctx.tenant.clone();
        self.ip = ctx.ip.clone();
        self.user_agent = ctx.user_agent.clone();
        self.request_id = Some(ctx.request_id.clone());
        self
    }
}

/// Filter constraints accepted by read queries.
#[derive(Clone, Debug, Default)]
pub struct QueryFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub actor: Option<AccountId>,
    pub patient_id: Option<TargetId>,
    /// Compared case-insensitively.
    pub action: Option<String>,
    pub target_type: Option<String>,
    pub tenant: Option<TenantId>,
    pub limit: usize,
    pub offset: usize,
}

impl QueryFilter {
    pub fn latest(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            50
        } else {
            self.limit
        }
    }

    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(start) = self.start {
            if event.occurred_at < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if event.occurred_at > end {
                return false;
            }
        }
        if let Some(actor) = &self.actor {
            if event.actor.as_ref() != Some(actor) {
                return false;
            }
        }
        if let Some(patient) = &self.patient_id {
            if event.patient_id.as_ref() != Some(patient) {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if !event.action.eq_ignore_ascii_case(action) {
                return false;
            }
        }
        if let Some(target_type) = &self.target_type {
            if &event.target_type != target_type {
                return false;
            }
        }
        if let Some(tenant) = &self.tenant {
            if event.tenant.as_ref() != Some(tenant) {
                return false;
            }
        }
        true
    }
}

/// Who is reading the trail, for tenant isolation and field gating.
#[derive(Clone, Debug)]
pub struct ReaderIdentity {
    pub tenant: Option<TenantId>,
    pub role: Option<String>,
    pub is_admin: bool,
}

impl ReaderIdentity {
    /// Compliance-tier readers see ip, user agent, and detail payloads.
    pub fn is_compliance(&self) -> bool {
        if self.is_admin {
            return true;
        }
        self.role
            .as_deref()
            .map(|role| {
                let role = role.to_lowercase();
                matches!(role.as_str(), "compliance" | "him" | "superadmin" | "admin")
            })
            .unwrap_or(false)
    }

    /// Only platform-level readers cross tenant boundaries.
    pub fn crosses_tenants(&self) -> bool {
        self.is_admin
            || self
                .role
                .as_deref()
                .map(|role| role.to_lowercase().contains("super"))
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compliance_tier_includes_admin_flag_and_named_roles() {
        let him = ReaderIdentity {
            tenant: None,
            role: Some("HIM".into()),
            is_admin: false,
        };
        assert!(him.is_compliance());
        assert!(!him.crosses_tenants());

        let flagged = ReaderIdentity {
            tenant: None,
            role: Some("Nurse".into()),
            is_admin: true,
        };
        assert!(flagged.is_compliance());
        assert!(flagged.crosses_tenants());

        let nurse = ReaderIdentity {
            tenant: None,
            role: Some("Nurse".into()),
            is_admin: false,
        };
        assert!(!nurse.is_compliance());
    }

    #[test]
    fn filter_compares_actions_case_insensitively() {
        let filter = QueryFilter {
            action: Some("export_created".into()),
            ..QueryFilter::default()
        };
        let mut event = sample_event();
        event.action = "EXPORT_CREATED".into();
        assert!(filter.matches(&event));
        event.action = "PATIENT:VIEW".into();
        assert!(!filter.matches(&event));
    }

    fn sample_event() -> AuditEvent {
        AuditEvent {
            id: "e-1".into(),
            occurred_at: Utc::now(),
            actor: None,
            actor_role: None,
            action: "X".into(),
            target_type: "Patient".into(),
            target_id: None,
            patient_id: None,
            tenant: None,
            ip: None,
            user_agent: None,
            outcome: Outcome::Success,
            details: Value::Null,
            request_id: None,
            previous_hash: String::new(),
            current_hash: String::new(),
        }
    }
}
