//! Credential store adapters.
//!
//! The store is a persistent key-value-by-username collection holding one
//! `{username, password}` record per user. Application code talks to it
//! through the [`CredentialStore`] trait; the backend is selected from
//! configuration via [`open`]. Two backends exist:
//!
//! - [`MemoryStore`]: records live in a process-wide map (default)
//! - [`FileStore`]: the same map, persisted write-through to a JSON file
//!
//! Both enforce username uniqueness at the store, and both expose only
//! atomic single-record operations - there are no multi-step transactions
//! visible to other requests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::StoreConfig;

pub mod errors;
mod file;
mod memory;

pub use errors::{Result, StoreError};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Stored credential material.
///
/// A record's password field holds either a recognized hash (a PHC string,
/// which embeds the algorithm tag and salt so verification needs no side
/// channel) or, transiently for legacy records, raw plaintext. The two
/// interpretations never apply to the same record at the same time: a legacy
/// record is upgraded in place the first time its owner logs in successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum StoredPassword {
    /// Legacy credential predating hash adoption, compared by direct equality
    Plaintext(String),
    /// Argon2 PHC string produced by [`crate::auth::password::hash_string`]
    Hashed(String),
}

impl StoredPassword {
    /// Classify raw credential material as found in the store.
    pub fn from_stored(raw: String) -> Self {
        if crate::auth::password::is_legacy_plaintext(&raw) {
            StoredPassword::Plaintext(raw)
        } else {
            StoredPassword::Hashed(raw)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StoredPassword::Plaintext(s) | StoredPassword::Hashed(s) => s,
        }
    }
}

impl From<String> for StoredPassword {
    fn from(raw: String) -> Self {
        StoredPassword::from_stored(raw)
    }
}

impl From<StoredPassword> for String {
    fn from(password: StoredPassword) -> Self {
        match password {
            StoredPassword::Plaintext(s) | StoredPassword::Hashed(s) => s,
        }
    }
}

/// A single user record, keyed by unique username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub password: StoredPassword,
}

impl UserRecord {
    pub fn new(username: String, password: StoredPassword) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            password,
        }
    }
}

/// Operations every credential store backend provides.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a record by its unique username.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Insert a new record, rejecting duplicates with
    /// [`StoreError::DuplicateUsername`].
    async fn create(&self, record: UserRecord) -> Result<UserRecord>;

    /// Replace the password field of an existing record, preserving the
    /// record identity. Used by signup-era admin tooling and by the
    /// migration write-back at login.
    async fn update_password(&self, id: Uuid, password: StoredPassword) -> Result<()>;
}

/// Shared handle to the configured store backend.
pub type SharedStore = Arc<dyn CredentialStore>;

/// Open the store backend selected by configuration.
///
/// This is the single point where we convert config into backend instances.
/// Adding a new backend requires adding a match arm here.
pub async fn open(config: &StoreConfig) -> anyhow::Result<SharedStore> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::File { path } => Ok(Arc::new(FileStore::open(path.clone()).await?)),
    }
}
