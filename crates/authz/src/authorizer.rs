use std::collections::HashSet;

use serde_json::json;
use tracing::debug;

use chartgate_audit_store::{AuditDraft, AuditRecorder};
use chartgate_core_types::{Outcome, RequestContext};
use chartgate_principal::Principal;

use crate::aliases::{canonical_role, is_super_admin_role};
use crate::defaults::fallback_privileges;
use crate::errors::AuthzError;
use crate::model::{AllowReason, Decision, Denial, Requirement};

/// Deny-by-default decision point.
///
/// Reads only the immutable principal. Every denial records exactly one
/// audit entry — durably, before the caller ever sees the rejection.
pub struct PrivilegeAuthorizer {
    recorder: AuditRecorder,
}

impl PrivilegeAuthorizer {
    pub fn new(recorder: AuditRecorder) -> Self {
        Self { recorder }
    }

    pub async fn allow(
        &self,
        principal: &Principal,
        requirement: &Requirement,
        ctx: &RequestContext,
    ) -> Result<Decision, AuthzError> {
        let decision = self.evaluate(principal, requirement);
        if let Decision::Deny(denial) = &decision {
            self.record_denial(principal, requirement, denial, ctx).await;
        }
        Ok(decision)
    }

    fn evaluate(&self, principal: &Principal, requirement: &Requirement) -> Decision {
        let role = principal.role.as_deref().unwrap_or("");
        let canonical = canonical_role(role);

        // SuperAdmin is the one tier the admin bypass does not reach.
        if let Requirement::SuperAdmin = requirement {
            return if is_super_admin_role(role) {
                Decision::Allow(AllowReason::RoleMatch)
            } else {
                self.deny(principal, requirement)
            };
        }

        if principal.is_admin || canonical == "admin" {
            return Decision::Allow(AllowReason::AdminBypass);
        }

        match requirement {
            Requirement::Privilege(name) => self.check_privileges(
                principal,
                std::slice::from_ref(name),
                false,
                requirement,
            ),
            Requirement::AnyOf(names) => self.check_privileges(principal, names, false, requirement),
            Requirement::AllOf(names) => self.check_privileges(principal, names, true, requirement),
            Requirement::RoleIn(names) => {
                let allowed: HashSet<String> =
                    names.iter().map(|name| canonical_role(name)).collect();
                if allowed.contains(&canonical) {
                    Decision::Allow(AllowReason::RoleMatch)
                } else {
                    self.deny(principal, requirement)
                }
            }
            Requirement::Admin => self.deny(principal, requirement),
            Requirement::SuperAdmin => unreachable!("handled above"),
        }
    }

    fn check_privileges(
        &self,
        principal: &Principal,
        names: &[String],
        require_all: bool,
        requirement: &Requirement,
    ) -> Decision {
        let (held, reason): (Box<dyn Fn(&str) -> bool>, AllowReason) = if principal.degraded {
            // Privilege store was unreachable at resolution time: answer
            // from the static fallback table. A role outside the table gets
            // nothing — availability never widens access.
            let role = principal.role.as_deref().unwrap_or("");
            match fallback_privileges(&canonical_role(role)) {
                Some(grants) => {
                    debug!(role, "privilege check answered by fallback table");
                    (
                        Box::new(move |name: &str| grants.contains(name)),
                        AllowReason::FallbackGrant,
                    )
                }
                None => return self.deny(principal, requirement),
            }
        } else {
            let privileges = principal.privileges.clone();
            (
                Box::new(move |name: &str| privileges.contains(name)),
                AllowReason::Granted,
            )
        };

        let passes = if require_all {
            names.iter().all(|name| held(name))
        } else {
            names.iter().any(|name| held(name))
        };
        if passes {
            Decision::Allow(reason)
        } else {
            self.deny(principal, requirement)
        }
    }

    fn deny(&self, principal: &Principal, requirement: &Requirement) -> Decision {
        Decision::Deny(Denial {
            required: requirement.describe(),
            current_role: principal.role.clone(),
        })
    }

    async fn record_denial(
        &self,
        principal: &Principal,
        requirement: &Requirement,
        denial: &Denial,
        ctx: &RequestContext,
    ) {
        let details = match requirement {
            Requirement::RoleIn(_) => json!({
                "attempted_roles": denial.required,
                "user_role": principal.role,
                "path": ctx.path,
                "method": ctx.method,
            }),
            _ => json!({
                "attempted_action": denial.required,
                "path": ctx.path,
                "method": ctx.method,
            }),
        };
        let mut draft = AuditDraft::new(requirement.denied_action(), "authorization")
            .actor(principal.account_id.clone())
            .outcome(Outcome::Failure)
            .details(details)
            .context(ctx);
        if let Some(role) = &principal.role {
            draft = draft.actor_role(role.clone());
        }
        if draft.tenant.is_none() {
            draft.tenant = principal.tenant.clone();
        }
        self.recorder.record_now(draft).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartgate_audit_store::{
        AuditStore, InMemoryAuditStore, QueryFilter, RecorderConfig,
    };
    use chartgate_core_types::AccountId;
    use chartgate_principal::Scope;

    fn principal(role: Option<&str>, is_admin: bool, privileges: &[&str]) -> Principal {
        Principal {
            account_id: AccountId::new(),
            email: "user@clinic.test".into(),
            role: role.map(str::to_string),
            is_admin,
            privileges: privileges.iter().map(|p| p.to_string()).collect(),
            scope: Scope::Clinic,
            tenant: None,
            degraded: false,
        }
    }

    fn harness() -> (PrivilegeAuthorizer, std::sync::Arc<InMemoryAuditStore>) {
        let store = InMemoryAuditStore::new();
        let recorder = AuditRecorder::spawn(store.clone(), RecorderConfig::default());
        (PrivilegeAuthorizer::new(recorder), store)
    }

    fn ctx() -> RequestContext {
        RequestContext::new("/patients", "GET")
    }

    #[tokio::test]
    async fn deny_by_default_without_grant() {
        let (authorizer, store) = harness();
        let nurse = principal(Some("Nurse"), false, &["note:view"]);
        let decision = authorizer
            .allow(
                &nurse,
                &Requirement::Privilege("patient:delete".into()),
                &ctx(),
            )
            .await
            .unwrap();

        let Decision::Deny(denial) = decision else {
            panic!("expected denial");
        };
        assert_eq!(denial.required, json!("patient:delete"));
        assert_eq!(denial.current_role.as_deref(), Some("Nurse"));

        // Exactly one audit entry, already durable, action suffix .denied.
        let events = store.query(&QueryFilter::latest(10)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "patient:delete.denied");
        assert!(events[0].action.ends_with(".denied"));
        assert_eq!(events[0].details["attempted_action"], json!("patient:delete"));
        assert_eq!(events[0].details["path"], json!("/patients"));
    }

    #[tokio::test]
    async fn admin_flag_bypasses_regardless_of_role() {
        let (authorizer, store) = harness();
        let admin = principal(Some("User"), true, &[]);
        for requirement in [
            Requirement::Privilege("patient:view".into()),
            Requirement::AllOf(vec!["a:b".into(), "c:d".into()]),
            Requirement::RoleIn(vec!["clinician".into(), "admin".into()]),
            Requirement::Admin,
        ] {
            let decision = authorizer.allow(&admin, &requirement, &ctx()).await.unwrap();
            assert!(matches!(decision, Decision::Allow(AllowReason::AdminBypass)));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn super_admin_is_not_reachable_by_admin_flag() {
        let (authorizer, _store) = harness();
        let admin = principal(Some("Admin"), true, &[]);
        let decision = authorizer
            .allow(&admin, &Requirement::SuperAdmin, &ctx())
            .await
            .unwrap();
        assert!(!decision.is_allow());

        let super_admin = principal(Some("SuperAdmin"), false, &[]);
        let decision = authorizer
            .allow(&super_admin, &Requirement::SuperAdmin, &ctx())
            .await
            .unwrap();
        assert!(decision.is_allow());
    }

    #[tokio::test]
    async fn aliased_roles_satisfy_role_requirements() {
        let (authorizer, _store) = harness();
        for role in ["physician", "Doctor", "MD", "Nurse Practitioner", "np", "PA"] {
            let p = principal(Some(role), false, &[]);
            let decision = authorizer
                .allow(
                    &p,
                    &Requirement::RoleIn(vec!["clinician".into()]),
                    &ctx(),
                )
                .await
                .unwrap();
            assert!(decision.is_allow(), "role {role} should alias to clinician");
        }
    }

    #[tokio::test]
    async fn any_of_and_all_of_compose() {
        let (authorizer, _store) = harness();
        let p = principal(Some("Nurse"), false, &["note:view", "patient:view"]);

        let any = authorizer
            .allow(
                &p,
                &Requirement::AnyOf(vec!["order:create".into(), "note:view".into()]),
                &ctx(),
            )
            .await
            .unwrap();
        assert!(any.is_allow());

        let all = authorizer
            .allow(
                &p,
                &Requirement::AllOf(vec!["note:view".into(), "order:create".into()]),
                &ctx(),
            )
            .await
            .unwrap();
        assert!(!all.is_allow());
    }

    #[tokio::test]
    async fn degraded_principal_answers_from_fallback_table() {
        let (authorizer, _store) = harness();
        let mut nurse = principal(Some("Nurse"), false, &[]);
        nurse.degraded = true;

        let allowed = authorizer
            .allow(&nurse, &Requirement::Privilege("patient:view".into()), &ctx())
            .await
            .unwrap();
        assert!(matches!(allowed, Decision::Allow(AllowReason::FallbackGrant)));

        // A role outside the fallback table stays denied.
        let mut outsider = principal(Some("Care Coordinator"), false, &[]);
        outsider.degraded = true;
        let denied = authorizer
            .allow(
                &outsider,
                &Requirement::Privilege("patient:view".into()),
                &ctx(),
            )
            .await
            .unwrap();
        assert!(!denied.is_allow());
    }
}
