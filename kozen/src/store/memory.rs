//! In-memory credential store backend.

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

use super::{CredentialStore, Result, StoreError, StoredPassword, UserRecord};

/// Process-wide credential store keyed by username.
///
/// Records are lost on restart; use [`super::FileStore`] when persistence is
/// needed. All operations touch a single map entry, so concurrent requests
/// never observe a partially-applied mutation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, UserRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self.records.get(username).map(|entry| entry.value().clone()))
    }

    async fn create(&self, record: UserRecord) -> Result<UserRecord> {
        match self.records.entry(record.username.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateUsername {
                username: record.username,
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn update_password(&self, id: Uuid, password: StoredPassword) -> Result<()> {
        for mut entry in self.records.iter_mut() {
            if entry.value().id == id {
                entry.value_mut().password = password;
                return Ok(());
            }
        }
        Err(StoreError::NotFound)
    }
}
