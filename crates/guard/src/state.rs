use std::sync::Arc;

use chartgate_audit_store::{AuditRecorder, ReaderIdentity};
use chartgate_authz::{Decision, PrivilegeAuthorizer, Requirement};
use chartgate_core_types::RequestContext;
use chartgate_principal::{Principal, PrincipalResolver};

use crate::errors::GuardError;

/// Everything a route guard needs, shared across the router via an
/// extension layer.
pub struct GuardState {
    pub resolver: PrincipalResolver,
    pub authorizer: PrivilegeAuthorizer,
    pub recorder: AuditRecorder,
}

impl GuardState {
    pub fn new(
        resolver: PrincipalResolver,
        authorizer: PrivilegeAuthorizer,
        recorder: AuditRecorder,
    ) -> Arc<Self> {
        Arc::new(Self {
            resolver,
            authorizer,
            recorder,
        })
    }

    /// Runs one requirement; a denial has already been audited by the
    /// authorizer when this returns the 403.
    pub async fn require(
        &self,
        principal: &Principal,
        requirement: Requirement,
        ctx: &RequestContext,
    ) -> Result<(), GuardError> {
        match self.authorizer.allow(principal, &requirement, ctx).await {
            Ok(Decision::Allow(_)) => Ok(()),
            Ok(Decision::Deny(denial)) => Err(GuardError::Forbidden(denial)),
            Err(err) => {
                tracing::error!(%err, "authorizer failure");
                Err(GuardError::Internal)
            }
        }
    }

    pub async fn require_privilege(
        &self,
        principal: &Principal,
        privilege: &str,
        ctx: &RequestContext,
    ) -> Result<(), GuardError> {
        self.require(principal, Requirement::Privilege(privilege.into()), ctx)
            .await
    }

    pub async fn require_any_privilege(
        &self,
        principal: &Principal,
        privileges: &[&str],
        ctx: &RequestContext,
    ) -> Result<(), GuardError> {
        let names = privileges.iter().map(|p| p.to_string()).collect();
        self.require(principal, Requirement::AnyOf(names), ctx).await
    }

    pub async fn require_all_privileges(
        &self,
        principal: &Principal,
        privileges: &[&str],
        ctx: &RequestContext,
    ) -> Result<(), GuardError> {
        let names = privileges.iter().map(|p| p.to_string()).collect();
        self.require(principal, Requirement::AllOf(names), ctx).await
    }

    pub async fn require_role(
        &self,
        principal: &Principal,
        roles: &[&str],
        ctx: &RequestContext,
    ) -> Result<(), GuardError> {
        let names = roles.iter().map(|r| r.to_string()).collect();
        self.require(principal, Requirement::RoleIn(names), ctx).await
    }

    pub async fn require_admin(
        &self,
        principal: &Principal,
        ctx: &RequestContext,
    ) -> Result<(), GuardError> {
        self.require(principal, Requirement::Admin, ctx).await
    }

    pub async fn require_super_admin(
        &self,
        principal: &Principal,
        ctx: &RequestContext,
    ) -> Result<(), GuardError> {
        self.require(principal, Requirement::SuperAdmin, ctx).await
    }

    /// Read-side identity for audit queries and exports.
    pub fn reader_identity(&self, principal: &Principal) -> ReaderIdentity {
        ReaderIdentity {
            tenant: principal.tenant.clone(),
            role: principal.role.clone(),
            is_admin: principal.is_admin,
        }
    }
}
