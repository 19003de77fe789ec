use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use chartgate_audit_store::{
    export_csv, query_scoped, AuditDraft, AuditRecorder, AuditStore, ExportFilters,
    InMemoryAuditStore, QueryFilter, RecorderConfig,
};
use chartgate_authz::{InMemoryAuthzStore, PrivilegeAuthorizer};
use chartgate_core_types::{AccountId, AdminFlag};
use chartgate_guard::{audit_response_mw, Authenticated, GuardError, GuardState};
use chartgate_phi_cipher::FieldCipher;
use chartgate_principal::{
    Account, AccountDirectory, AccountStatus, InMemoryDirectory, PermissionSource,
    PrincipalResolver, TokenVerifier,
};

use crate::patients::PatientStore;

/// Shared application state for the demo router.
pub struct AppState {
    pub guard: Arc<GuardState>,
    pub patients: Arc<PatientStore>,
    pub audit: Arc<dyn AuditStore>,
    pub recorder: AuditRecorder,
    pub directory: Arc<InMemoryDirectory>,
    pub authz: Arc<InMemoryAuthzStore>,
}

/// Wires the four services together around the given stores.
pub fn build_state(
    secret: &[u8],
    directory: Arc<InMemoryDirectory>,
    permissions: Arc<dyn PermissionSource>,
    authz: Arc<InMemoryAuthzStore>,
    cipher: FieldCipher,
) -> Arc<AppState> {
    let audit = InMemoryAuditStore::new();
    let recorder = AuditRecorder::spawn(audit.clone(), RecorderConfig::default());
    let resolver = PrincipalResolver::new(
        TokenVerifier::new(secret),
        directory.clone() as Arc<dyn AccountDirectory>,
        permissions,
    );
    let authorizer = PrivilegeAuthorizer::new(recorder.clone());
    let guard = GuardState::new(resolver, authorizer, recorder.clone());

    Arc::new(AppState {
        guard,
        patients: PatientStore::new(cipher),
        audit,
        recorder,
        directory,
        authz,
    })
}

/// Demo fixture: seeded roles plus a cast of accounts covering the
/// interesting cases (admin-flag encodings, aliases, suspension, a role
/// with no grants anywhere).
pub fn demo_state(secret: &[u8], cipher: FieldCipher) -> Arc<AppState> {
    let directory = InMemoryDirectory::new();
    let accounts = [
        ("acct-admin", "User", Some(AccountStatus::Active), "t"),
        ("acct-superadmin", "SuperAdmin", Some(AccountStatus::Active), "true"),
        ("acct-physician", "Physician", Some(AccountStatus::Active), "false"),
        ("acct-nurse", "Nurse", Some(AccountStatus::Active), "false"),
        ("acct-frontdesk", "Front Desk", Some(AccountStatus::Active), "false"),
        ("acct-compliance", "Compliance", Some(AccountStatus::Active), "false"),
        ("acct-suspended", "Nurse", Some(AccountStatus::Suspended), "false"),
        ("acct-coordinator", "Care Coordinator", Some(AccountStatus::Active), "false"),
    ];
    for (id, role, status, admin) in accounts {
        directory.insert(Account {
            id: AccountId(id.to_string()),
            email: format!("{id}@clinic.test"),
            status,
            role: Some(role.to_string()),
            legacy_role: None,
            is_admin: AdminFlag::from_encoding(admin),
        });
    }

    let authz = InMemoryAuthzStore::seeded();
    build_state(
        secret,
        directory,
        authz.clone() as Arc<dyn PermissionSource>,
        authz,
        cipher,
    )
}

pub fn build_app(state: Arc<AppState>) -> Router {
    let guard = state.guard.clone();
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/:id", get(get_patient))
        .route("/audit/admin", get(audit_admin))
        .route("/audit/patient/:id", get(audit_patient))
        .route("/audit/admin/export", get(audit_export))
        .route("/audit/admin/verify", get(audit_verify))
        .route("/admin/phi-repair", post(phi_repair))
        .layer(middleware::from_fn(audit_response_mw))
        .layer(Extension(guard))
        .with_state(state)
}

async fn list_patients(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> Result<Json<Value>, GuardError> {
    state
        .guard
        .require_privilege(&auth.principal, "patient:view", &auth.ctx)
        .await?;
    let patients: Vec<Value> = state
        .patients
        .list()
        .into_iter()
        .map(Value::Object)
        .collect();
    Ok(Json(Value::Array(patients)))
}

async fn create_patient(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Json(body): Json<Value>,
) -> Result<Response, GuardError> {
    state
        .guard
        .require_privilege(&auth.principal, "patient:create", &auth.ctx)
        .await?;
    let Value::Object(record) = body else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Expected a patient object" })),
        )
            .into_response());
    };
    match state.patients.create(record) {
        Ok(created) => Ok((StatusCode::CREATED, Json(Value::Object(created))).into_response()),
        Err(err) => {
            // Enforced mode: an encryption failure is fatal to the write.
            tracing::error!(%err, "patient write rejected");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to store record" })),
            )
                .into_response())
        }
    }
}

async fn get_patient(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Response, GuardError> {
    state
        .guard
        .require_privilege(&auth.principal, "patient:view", &auth.ctx)
        .await?;
    match state.patients.get(&id) {
        Some(record) => Ok(Json(Value::Object(record)).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Patient not found" })),
        )
            .into_response()),
    }
}

#[derive(Deserialize)]
struct AuditQuery {
    action: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn audit_admin(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Value>, GuardError> {
    state
        .guard
        .require_role(
            &auth.principal,
            &["SuperAdmin", "Compliance", "HIM", "admin"],
            &auth.ctx,
        )
        .await?;
    let filter = QueryFilter {
        action: params.action,
        limit: params.limit.unwrap_or(50),
        offset: params.offset.unwrap_or(0),
        ..QueryFilter::default()
    };
    let reader = state.guard.reader_identity(&auth.principal);
    let events = query_scoped(state.audit.as_ref(), filter, &reader)
        .await
        .map_err(|_| GuardError::Internal)?;
    Ok(Json(json!({ "events": events })))
}

/// Contextual activity for one patient chart. Any authenticated caller may
/// see the timeline; ip/user-agent/details stay gated to compliance tiers.
async fn audit_patient(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Path(id): Path<String>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Value>, GuardError> {
    let filter = QueryFilter {
        patient_id: Some(chartgate_core_types::TargetId(id)),
        limit: params.limit.unwrap_or(50),
        offset: params.offset.unwrap_or(0),
        ..QueryFilter::default()
    };
    let reader = state.guard.reader_identity(&auth.principal);
    let events = query_scoped(state.audit.as_ref(), filter, &reader)
        .await
        .map_err(|_| GuardError::Internal)?;
    Ok(Json(json!({ "events": events })))
}

#[derive(Deserialize)]
struct ExportQuery {
    #[serde(rename = "startDate")]
    start_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "endDate")]
    end_date: Option<chrono::DateTime<chrono::Utc>>,
    action: Option<String>,
}

async fn audit_export(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Query(params): Query<ExportQuery>,
) -> Result<Response, GuardError> {
    state
        .guard
        .require_role(
            &auth.principal,
            &["Compliance", "HIM", "SuperAdmin", "admin"],
            &auth.ctx,
        )
        .await?;
    let reader = state.guard.reader_identity(&auth.principal);
    let filters = ExportFilters {
        start: params.start_date,
        end: params.end_date,
        action: params.action,
    };
    let csv = export_csv(&state.recorder, &reader, &filters, &auth.ctx)
        .await
        .map_err(|_| GuardError::Internal)?;
    Ok(([(header::CONTENT_TYPE, "text/csv")], csv).into_response())
}

async fn audit_verify(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> Result<Json<Value>, GuardError> {
    state.guard.require_admin(&auth.principal, &auth.ctx).await?;
    let verification = state
        .audit
        .verify_integrity(100)
        .await
        .map_err(|_| GuardError::Internal)?;
    Ok(Json(json!({
        "verified": verification.verified,
        "brokenAt": verification.broken_at,
        "checked": verification.checked,
    })))
}

async fn phi_repair(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> Result<Json<Value>, GuardError> {
    state
        .guard
        .require_super_admin(&auth.principal, &auth.ctx)
        .await?;

    let report = state.patients.repair_all();
    let draft = AuditDraft::new("PHI_REPAIR", "Patient")
        .actor(auth.principal.account_id.clone())
        .details(json!({
            "scanned": report.scanned,
            "rewritten": report.rewritten,
        }))
        .context(&auth.ctx);
    state.recorder.record_now(draft).await;

    Ok(Json(json!({
        "scanned": report.scanned,
        "rewritten": report.rewritten,
    })))
}
