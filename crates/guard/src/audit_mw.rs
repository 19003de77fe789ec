use std::sync::Arc;

use axum::extract::Request;
use axum::http::header::USER_AGENT;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use chartgate_audit_store::AuditDraft;
use chartgate_core_types::{Outcome, RequestContext, RequestId, TargetId};

use crate::extract::CurrentActor;
use crate::state::GuardState;

/// PHI-relevant path prefixes and the entity each maps to. Only requests
/// hitting these paths are recorded by the response wrapper.
pub const PHI_ENDPOINTS: &[(&str, &str)] = &[
    ("/patients", "Patient"),
    ("/visits", "Visit"),
    ("/encounters", "Encounter"),
    ("/notes", "Note"),
    ("/documents", "Document"),
    ("/medications", "Medication"),
    ("/allergies", "Allergy"),
    ("/problems", "Problem"),
    ("/orders", "Order"),
    ("/prescriptions", "Prescription"),
    ("/labs", "Lab"),
    ("/billing", "Billing"),
];

const AUDITED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

pub fn is_phi_relevant(path: &str, method: &str) -> bool {
    AUDITED_METHODS.contains(&method.to_uppercase().as_str())
        && PHI_ENDPOINTS
            .iter()
            .any(|(prefix, _)| path.contains(prefix))
}

fn entity_for(path: &str) -> &'static str {
    PHI_ENDPOINTS
        .iter()
        .find(|(prefix, _)| path.contains(prefix))
        .map(|(_, entity)| *entity)
        .unwrap_or("Resource")
}

/// Trailing path segments that look like resource ids become the target id.
fn target_from_path(path: &str) -> Option<TargetId> {
    let last = path.trim_end_matches('/').rsplit('/').next()?;
    Uuid::parse_str(last).ok().map(|_| TargetId(last.to_string()))
}

/// Marker preventing the wrapper from recording the same response twice
/// when it ends up mounted on more than one resolution path.
#[derive(Clone, Copy)]
struct AuditLogged;

/// Response-wrapping audit middleware.
///
/// Derives the outcome from the final HTTP status and records one event
/// per PHI-relevant request. The request body is never part of the payload
/// — method, path, and status only. The write is fire-and-forget; the
/// response is never delayed or failed by the audit path.
pub async fn audit_response_mw(request: Request, next: Next) -> Response {
    let state = request.extensions().get::<Arc<GuardState>>().cloned();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let relevant = state.is_some() && is_phi_relevant(&path, &method);

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(|value| RequestId(value.to_string()))
        .unwrap_or_else(RequestId::new);
    let ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let actor_slot = CurrentActor::default();
    let mut request = request;
    request.extensions_mut().insert(request_id.clone());
    request.extensions_mut().insert(actor_slot.clone());

    let mut response = next.run(request).await;

    if !relevant || response.extensions().get::<AuditLogged>().is_some() {
        return response;
    }
    response.extensions_mut().insert(AuditLogged);

    let Some(state) = state else {
        return response;
    };
    let status = response.status().as_u16();
    let actor = actor_slot.0.get().cloned();

    let entity = entity_for(&path);
    let ctx = RequestContext {
        tenant: actor.as_ref().and_then(|actor| actor.tenant.clone()),
        ip,
        user_agent,
        request_id,
        path: path.clone(),
        method: method.clone(),
    };
    let mut draft = AuditDraft::new(
        format!("{}.{}", method.to_lowercase(), entity.to_lowercase()),
        entity,
    )
    .outcome(Outcome::from_http_status(status))
    .details(serde_json::json!({
        "method": method,
        "path": path,
        "statusCode": status,
    }))
    .context(&ctx);
    if let Some(target) = target_from_path(&path) {
        draft = draft.target(target);
    }
    if let Some(actor) = actor {
        draft = draft.actor(actor.account);
        if let Some(role) = actor.role {
            draft = draft.actor_role(role);
        }
    }
    state.recorder.record(draft);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_gates_paths_and_methods() {
        assert!(is_phi_relevant("/patients", "GET"));
        assert!(is_phi_relevant("/api/patients/abc", "delete"));
        assert!(is_phi_relevant("/billing/claims", "POST"));
        assert!(!is_phi_relevant("/roles", "GET"));
        assert!(!is_phi_relevant("/patients", "OPTIONS"));
    }

    #[test]
    fn entity_follows_the_first_matching_prefix() {
        assert_eq!(entity_for("/patients/123"), "Patient");
        assert_eq!(entity_for("/api/prescriptions"), "Prescription");
    }

    #[test]
    fn uuid_tails_become_target_ids() {
        let id = "a7f5f35f-6c2d-4b0a-9d58-0f4d6c2d4b0a";
        assert_eq!(
            target_from_path(&format!("/patients/{id}")).map(|t| t.0),
            Some(id.to_string())
        );
        assert!(target_from_path("/patients").is_none());
    }
}
