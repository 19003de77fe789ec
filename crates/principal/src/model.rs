use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use chartgate_core_types::{AccountId, AdminFlag, TenantId};

/// Stored account status. `None` is legacy data and treated as active.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
    #[serde(other)]
    Disabled,
}

/// Account row as the directory returns it. The admin flag has already
/// been normalized at the boundary; nothing downstream re-parses it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub status: Option<AccountStatus>,
    /// Role assigned through the roles table.
    pub role: Option<String>,
    /// Legacy role column kept for accounts predating the roles table.
    pub legacy_role: Option<String>,
    pub is_admin: AdminFlag,
}

impl Account {
    pub fn effective_role(&self) -> Option<&str> {
        self.role.as_deref().or(self.legacy_role.as_deref())
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, None | Some(AccountStatus::Active))
    }
}

/// How far a principal's reads reach inside its tenant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Clinic-wide access within the tenant.
    Clinic,
    /// Restricted to records the principal owns; the coarse default when
    /// the permission context cannot be loaded.
    OwnRecords,
}

/// Permission set and scope loaded from the authorization store.
#[derive(Clone, Debug)]
pub struct PermissionGrant {
    pub privileges: HashSet<String>,
    pub scope: Scope,
}

/// Resolved identity for one request. Built fresh per request, immutable,
/// never persisted and never cached.
#[derive(Clone, Debug)]
pub struct Principal {
    pub account_id: AccountId,
    pub email: String,
    pub role: Option<String>,
    /// Strict bool, normalized once at the directory boundary. Always wins
    /// over role-based checks.
    pub is_admin: bool,
    pub privileges: HashSet<String>,
    pub scope: Scope,
    pub tenant: Option<TenantId>,
    /// True when the permission context failed to load and this principal
    /// carries the minimal (empty) grant.
    pub degraded: bool,
}

impl Principal {
    pub fn has_privilege(&self, privilege: &str) -> bool {
        self.privileges.contains(privilege)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_status_is_legacy_active() {
        let account = Account {
            id: AccountId::new(),
            email: "a@clinic.test".into(),
            status: None,
            role: None,
            legacy_role: None,
            is_admin: AdminFlag::from(false),
        };
        assert!(account.is_active());
    }

    #[test]
    fn unknown_status_strings_deserialize_as_disabled() {
        let status: AccountStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(status, AccountStatus::Disabled);
    }

    #[test]
    fn effective_role_falls_back_to_legacy_column() {
        let account = Account {
            id: AccountId::new(),
            email: "a@clinic.test".into(),
            status: Some(AccountStatus::Active),
            role: None,
            legacy_role: Some("clinician".into()),
            is_admin: AdminFlag::from(false),
        };
        assert_eq!(account.effective_role(), Some("clinician"));
    }
}
