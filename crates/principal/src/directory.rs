use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use chartgate_core_types::AccountId;

use crate::model::Account;

#[derive(Clone, Debug, Error)]
pub enum DirectoryError {
    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

/// Account lookup by token subject.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find(&self, id: &AccountId) -> Result<Option<Account>, DirectoryError>;
}

/// Reference directory for tests and the demo wiring.
#[derive(Default)]
pub struct InMemoryDirectory {
    accounts: DashMap<String, Account>,
}

impl InMemoryDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id.0.clone(), account);
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    async fn find(&self, id: &AccountId) -> Result<Option<Account>, DirectoryError> {
        Ok(self.accounts.get(&id.0).map(|entry| entry.clone()))
    }
}
