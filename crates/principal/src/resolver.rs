use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use chartgate_core_types::{AccountId, TenantId};

use crate::directory::{AccountDirectory, DirectoryError};
use crate::errors::{AuthError, AuthResult};
use crate::model::{Account, PermissionGrant, Principal, Scope};
use crate::token::TokenVerifier;

#[derive(Clone, Debug, Error)]
pub enum PermissionError {
    #[error("authorization store unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the permission set and scope for an account. Implemented by the
/// authorization store; failures here degrade the principal instead of
/// failing the request.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn permissions_for(&self, account: &Account) -> Result<PermissionGrant, PermissionError>;
}

/// Builds one [`Principal`] per request from a raw bearer token.
pub struct PrincipalResolver {
    verifier: TokenVerifier,
    directory: Arc<dyn AccountDirectory>,
    permissions: Arc<dyn PermissionSource>,
}

impl PrincipalResolver {
    pub fn new(
        verifier: TokenVerifier,
        directory: Arc<dyn AccountDirectory>,
        permissions: Arc<dyn PermissionSource>,
    ) -> Self {
        Self {
            verifier,
            directory,
            permissions,
        }
    }

    pub async fn resolve(&self, token: &str) -> AuthResult<Principal> {
        let claims = self.verifier.verify(token)?;

        let account = match self.directory.find(&AccountId(claims.sub.clone())).await {
            Ok(Some(account)) => account,
            Ok(None) => return Err(AuthError::InvalidToken),
            Err(DirectoryError::Unavailable(reason)) => {
                warn!(reason, "account lookup failed, refusing authentication");
                return Err(AuthError::ContextUnavailable);
            }
        };

        if !account.is_active() {
            return Err(AuthError::AccountInactive);
        }

        // The admin flag survives every downstream failure: it is the single
        // source of truth for elevated access and must not be lost when the
        // permission context degrades.
        let is_admin = account.is_admin.granted();

        let (privileges, scope, degraded) = match self.permissions.permissions_for(&account).await
        {
            Ok(grant) => (grant.privileges, grant.scope, false),
            Err(err) => {
                warn!(%err, account = %account.id, "permission context unavailable, issuing minimal principal");
                (HashSet::new(), Scope::OwnRecords, true)
            }
        };

        Ok(Principal {
            account_id: account.id.clone(),
            email: account.email.clone(),
            role: account.effective_role().map(str::to_string),
            is_admin,
            privileges,
            scope,
            tenant: claims.tenant.map(TenantId),
            degraded,
        })
    }
}
