use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use chartgate_core_types::AccountId;
use chartgate_principal::{Account, PermissionError, PermissionGrant, PermissionSource, Scope};

use crate::aliases::canonical_role;
use crate::defaults::seed_grants;
use crate::errors::StoreError;
use crate::model::{Privilege, Role};

/// Role and privilege persistence. Grant reads are keyed by role name and
/// resolve through the alias table; absence of a grant is denial, never an
/// error.
#[async_trait]
pub trait AuthzStore: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;
    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;
    async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
        is_system_role: bool,
    ) -> Result<Role, StoreError>;
    async fn update_role(
        &self,
        role_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Role, StoreError>;
    async fn delete_role(&self, role_id: &str) -> Result<(), StoreError>;

    async fn list_privileges(&self) -> Result<Vec<Privilege>, StoreError>;
    async fn privileges_for_role(&self, role_name: &str) -> Result<HashSet<String>, StoreError>;
    async fn assign_privilege(&self, role_id: &str, privilege: &str) -> Result<(), StoreError>;
    async fn remove_privilege(&self, role_id: &str, privilege: &str) -> Result<(), StoreError>;
    /// Replaces the role's whole grant set in one step. Concurrent edits
    /// are last-write-wins, but a reader never observes a half-replaced
    /// set.
    async fn replace_privileges(
        &self,
        role_id: &str,
        privileges: Vec<String>,
    ) -> Result<(), StoreError>;

    async fn assign_account(&self, role_id: &str, account: &AccountId) -> Result<(), StoreError>;
    async fn release_account(&self, role_id: &str, account: &AccountId) -> Result<(), StoreError>;
}

#[derive(Default)]
struct StoreInner {
    roles: HashMap<String, Role>,
    grants: HashMap<String, HashSet<String>>,
    privileges: HashMap<String, Privilege>,
    members: HashMap<String, HashSet<String>>,
}

impl StoreInner {
    fn role_id_by_name(&self, name: &str) -> Option<String> {
        let canonical = canonical_role(name);
        self.roles
            .values()
            .find(|role| role.name.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.roles
                    .values()
                    .find(|role| canonical_role(&role.name) == canonical)
            })
            .map(|role| role.id.clone())
    }

    fn register_privilege(&mut self, name: &str) {
        self.privileges
            .entry(name.to_string())
            .or_insert_with(|| Privilege {
                name: name.to_string(),
                description: None,
                category: name.split(':').next().map(str::to_string),
            });
    }
}

/// Reference store. Production deployments back this trait with the
/// relational schema; semantics here match it operation for operation.
#[derive(Default)]
pub struct InMemoryAuthzStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryAuthzStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store pre-populated with the canonical system roles and grants.
    pub fn seeded() -> Arc<Self> {
        let store = Self::default();
        {
            let mut inner = store.inner.write();
            for (name, is_system, privileges) in seed_grants() {
                let role = Role {
                    id: Uuid::new_v4().to_string(),
                    name: name.to_string(),
                    description: None,
                    is_system_role: is_system,
                    created_at: Utc::now(),
                };
                for privilege in &privileges {
                    inner.register_privilege(privilege);
                }
                inner.grants.insert(
                    role.id.clone(),
                    privileges.into_iter().map(str::to_string).collect(),
                );
                inner.roles.insert(role.id.clone(), role);
            }
        }
        Arc::new(store)
    }
}

#[async_trait]
impl AuthzStore for InMemoryAuthzStore {
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let inner = self.inner.read();
        let mut roles: Vec<Role> = inner.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .role_id_by_name(name)
            .and_then(|id| inner.roles.get(&id).cloned()))
    }

    async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
        is_system_role: bool,
    ) -> Result<Role, StoreError> {
        let mut inner = self.inner.write();
        let duplicate = inner
            .roles
            .values()
            .any(|role| role.name.eq_ignore_ascii_case(name));
        if duplicate {
            return Err(StoreError::DuplicateRole);
        }
        let role = Role {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            is_system_role,
            created_at: Utc::now(),
        };
        inner.grants.insert(role.id.clone(), HashSet::new());
        inner.roles.insert(role.id.clone(), role.clone());
        Ok(role)
    }

    async fn update_role(
        &self,
        role_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Role, StoreError> {
        let mut inner = self.inner.write();
        let role = inner
            .roles
            .get_mut(role_id)
            .ok_or(StoreError::RoleNotFound)?;
        if role.is_system_role {
            return Err(StoreError::SystemRoleProtected);
        }
        if let Some(name) = name {
            role.name = name.to_string();
        }
        if let Some(description) = description {
            role.description = Some(description.to_string());
        }
        Ok(role.clone())
    }

    async fn delete_role(&self, role_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let role = inner.roles.get(role_id).ok_or(StoreError::RoleNotFound)?;
        if role.is_system_role {
            return Err(StoreError::SystemRoleProtected);
        }
        if inner
            .members
            .get(role_id)
            .map(|members| !members.is_empty())
            .unwrap_or(false)
        {
            return Err(StoreError::RoleInUse);
        }
        inner.roles.remove(role_id);
        inner.grants.remove(role_id);
        inner.members.remove(role_id);
        Ok(())
    }

    async fn list_privileges(&self) -> Result<Vec<Privilege>, StoreError> {
        let inner = self.inner.read();
        let mut privileges: Vec<Privilege> = inner.privileges.values().cloned().collect();
        privileges.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(privileges)
    }

    async fn privileges_for_role(&self, role_name: &str) -> Result<HashSet<String>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .role_id_by_name(role_name)
            .and_then(|id| inner.grants.get(&id).cloned())
            .unwrap_or_default())
    }

    async fn assign_privilege(&self, role_id: &str, privilege: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.roles.contains_key(role_id) {
            return Err(StoreError::RoleNotFound);
        }
        inner.register_privilege(privilege);
        inner
            .grants
            .entry(role_id.to_string())
            .or_default()
            .insert(privilege.to_string());
        Ok(())
    }

    async fn remove_privilege(&self, role_id: &str, privilege: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.roles.contains_key(role_id) {
            return Err(StoreError::RoleNotFound);
        }
        if let Some(grants) = inner.grants.get_mut(role_id) {
            grants.remove(privilege);
        }
        Ok(())
    }

    async fn replace_privileges(
        &self,
        role_id: &str,
        privileges: Vec<String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.roles.contains_key(role_id) {
            return Err(StoreError::RoleNotFound);
        }
        for privilege in &privileges {
            inner.register_privilege(privilege);
        }
        // One swap under the write lock: no interleaved delete-then-insert
        // window where the role briefly holds nothing.
        inner
            .grants
            .insert(role_id.to_string(), privileges.into_iter().collect());
        Ok(())
    }

    async fn assign_account(&self, role_id: &str, account: &AccountId) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.roles.contains_key(role_id) {
            return Err(StoreError::RoleNotFound);
        }
        inner
            .members
            .entry(role_id.to_string())
            .or_default()
            .insert(account.0.clone());
        Ok(())
    }

    async fn release_account(&self, role_id: &str, account: &AccountId) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if let Some(members) = inner.members.get_mut(role_id) {
            members.remove(&account.0);
        }
        Ok(())
    }
}

/// The resolver pulls permission sets straight from this store; scope is
/// clinic-wide for recognized roles and own-records otherwise.
#[async_trait]
impl PermissionSource for InMemoryAuthzStore {
    async fn permissions_for(&self, account: &Account) -> Result<PermissionGrant, PermissionError> {
        let Some(role_name) = account.effective_role() else {
            return Ok(PermissionGrant {
                privileges: HashSet::new(),
                scope: Scope::OwnRecords,
            });
        };
        let known = self
            .role_by_name(role_name)
            .await
            .map_err(|err| PermissionError::Unavailable(err.to_string()))?
            .is_some();
        let privileges = self
            .privileges_for_role(role_name)
            .await
            .map_err(|err| PermissionError::Unavailable(err.to_string()))?;
        Ok(PermissionGrant {
            privileges,
            scope: if known { Scope::Clinic } else { Scope::OwnRecords },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn aliased_role_names_resolve_to_seeded_grants() {
        let store = InMemoryAuthzStore::seeded();
        let direct = store.privileges_for_role("clinician").await.unwrap();
        let aliased = store.privileges_for_role("Physician").await.unwrap();
        assert!(!direct.is_empty());
        assert_eq!(direct, aliased);
    }

    #[tokio::test]
    async fn unknown_role_has_no_grants() {
        let store = InMemoryAuthzStore::seeded();
        let grants = store.privileges_for_role("Care Coordinator").await.unwrap();
        assert!(grants.is_empty());
    }

    #[tokio::test]
    async fn system_roles_are_protected_from_mutation() {
        let store = InMemoryAuthzStore::seeded();
        let role = store.role_by_name("clinician").await.unwrap().unwrap();

        assert_eq!(
            store
                .update_role(&role.id, Some("renamed"), None)
                .await
                .unwrap_err(),
            StoreError::SystemRoleProtected
        );
        assert_eq!(
            store.delete_role(&role.id).await.unwrap_err(),
            StoreError::SystemRoleProtected
        );
    }

    #[tokio::test]
    async fn delete_refuses_roles_with_members() {
        let store = InMemoryAuthzStore::seeded();
        let role = store
            .create_role("Scribe", Some("Dictation support"), false)
            .await
            .unwrap();
        let account = AccountId::new();
        store.assign_account(&role.id, &account).await.unwrap();

        assert_eq!(
            store.delete_role(&role.id).await.unwrap_err(),
            StoreError::RoleInUse
        );
        store.release_account(&role.id, &account).await.unwrap();
        store.delete_role(&role.id).await.unwrap();
    }

    #[tokio::test]
    async fn replace_privileges_is_a_single_swap() {
        let store = InMemoryAuthzStore::seeded();
        let role = store.create_role("Scribe", None, false).await.unwrap();
        store
            .assign_privilege(&role.id, "note:view")
            .await
            .unwrap();

        store
            .replace_privileges(
                &role.id,
                vec!["patient:view".to_string(), "note:create".to_string()],
            )
            .await
            .unwrap();

        let grants = store.privileges_for_role("Scribe").await.unwrap();
        assert_eq!(
            grants,
            HashSet::from(["patient:view".to_string(), "note:create".to_string()])
        );
    }
}
