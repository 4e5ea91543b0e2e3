//! File-backed credential store backend.

use anyhow::Context;
use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use std::path::PathBuf;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CredentialStore, Result, StoreError, StoredPassword, UserRecord};

/// Credential store persisted write-through to a JSON file.
///
/// Records are held in the same username-keyed map as [`super::MemoryStore`];
/// every successful mutation snapshots the map and rewrites the file. The
/// write lock serializes snapshot writers so a racing pair of mutations
/// cannot interleave partial file contents.
#[derive(Debug)]
pub struct FileStore {
    records: DashMap<String, UserRecord>,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store, loading any records previously persisted at `path`.
    pub async fn open(path: PathBuf) -> anyhow::Result<Self> {
        let records = DashMap::new();

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let loaded: Vec<UserRecord> =
                    serde_json::from_slice(&bytes).with_context(|| format!("parse user records from {}", path.display()))?;
                tracing::info!("Loaded {} user records from {}", loaded.len(), path.display());
                for record in loaded {
                    records.insert(record.username.clone(), record);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No existing user records at {}, starting empty", path.display());
            }
            Err(e) => {
                return Err(anyhow::Error::from(e).context(format!("read user records from {}", path.display())));
            }
        }

        Ok(Self {
            records,
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Rewrite the backing file from the current map contents.
    async fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut snapshot: Vec<UserRecord> = self.records.iter().map(|entry| entry.value().clone()).collect();
        snapshot.sort_by(|a, b| a.username.cmp(&b.username));

        let bytes = serde_json::to_vec_pretty(&snapshot)
            .context("serialize user records")
            .map_err(StoreError::Other)?;

        tokio::fs::write(&self.path, bytes)
            .await
            .with_context(|| format!("write user records to {}", self.path.display()))
            .map_err(StoreError::Other)?;

        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self.records.get(username).map(|entry| entry.value().clone()))
    }

    async fn create(&self, record: UserRecord) -> Result<UserRecord> {
        match self.records.entry(record.username.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::DuplicateUsername {
                    username: record.username,
                });
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record.clone());
            }
        }

        self.persist().await?;
        Ok(record)
    }

    async fn update_password(&self, id: Uuid, password: StoredPassword) -> Result<()> {
        let mut updated = false;
        for mut entry in self.records.iter_mut() {
            if entry.value().id == id {
                entry.value_mut().password = password;
                updated = true;
                break;
            }
        }

        if !updated {
            return Err(StoreError::NotFound);
        }

        self.persist().await
    }
}
