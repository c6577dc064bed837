//! Local profile cache.
//!
//! Defines the [`ProfileStore`] trait, a flat key-value store of serialized
//! profiles keyed by `key_prefix + user_id`, plus one scalar key holding the
//! active user's id for session resumption. No merge logic lives here.
//!
//! [`MemoryProfileStore`] keeps records for the life of the process;
//! [`FsProfileStore`](fs::FsProfileStore) keeps them as JSON files.

pub mod fs;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{AuraError, Result};
use crate::profile::UserProfile;

pub use fs::FsProfileStore;

/// Async key-value persistence of profile snapshots.
///
/// Single-key writes are atomic; there are no cross-key transactions.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load the profile stored for `user_id`.
    ///
    /// Returns [`AuraError::NotFound`] when there is no record.
    async fn get(&self, user_id: &str) -> Result<UserProfile>;

    /// Store (overwrite) the profile for `user_id`.
    async fn put(&self, user_id: &str, profile: &UserProfile) -> Result<()>;

    /// The id of the user whose session should be resumed, if any.
    async fn active_user_id(&self) -> Result<Option<String>>;

    async fn set_active_user_id(&self, user_id: &str) -> Result<()>;

    /// Forget the active user. `Ok(())` even if none was set.
    async fn clear_active_user_id(&self) -> Result<()>;
}

/// Key naming shared by every store implementation.
#[derive(Debug, Clone)]
pub struct StoreKeys {
    prefix: String,
    active_user_key: String,
}

impl StoreKeys {
    pub fn new(prefix: impl Into<String>, active_user_key: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            active_user_key: active_user_key.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.key_prefix.clone(), config.active_user_key.clone())
    }

    /// Namespaced key of a user's profile record.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Validation`] for ids that are empty or could
    /// escape the namespace (path separators, leading dot, NUL).
    pub fn profile_key(&self, user_id: &str) -> Result<String> {
        validate_user_id(user_id)?;
        Ok(format!("{}{user_id}", self.prefix))
    }

    pub fn active_user_key(&self) -> &str {
        &self.active_user_key
    }
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(AuraError::Validation("user id must not be blank".into()));
    }
    if user_id.starts_with('.') || user_id.contains(['/', '\\', '\0']) {
        return Err(AuraError::Validation(format!(
            "user id contains forbidden characters: {user_id:?}"
        )));
    }
    Ok(())
}

pub(crate) fn encode_profile(profile: &UserProfile) -> Result<String> {
    serde_json::to_string(profile)
        .map_err(|e| AuraError::Storage(format!("failed to serialize profile: {e}")))
}

pub(crate) fn decode_profile(raw: &str, key: &str) -> Result<UserProfile> {
    serde_json::from_str(raw)
        .map_err(|e| AuraError::Storage(format!("failed to parse profile record {key}: {e}")))
}

/// Open the store selected by config.
///
/// # Errors
///
/// Returns an error if the filesystem store's directory cannot be created.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn ProfileStore>> {
    let keys = StoreKeys::from_config(config);
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryProfileStore::with_keys(keys))),
        StorageBackend::Fs => Ok(Arc::new(FsProfileStore::new(&config.root_dir, keys)?)),
    }
}

/// In-memory profile store, scoped to the process.
///
/// Values are kept serialized, mirroring what the filesystem store writes.
/// Cheaply cloneable; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    keys: StoreKeys,
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(keys: StoreKeys) -> Self {
        Self {
            keys,
            entries: Arc::default(),
        }
    }

    /// Number of stored keys, including the active-user key.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, user_id: &str) -> Result<UserProfile> {
        let key = self.keys.profile_key(user_id)?;
        let entries = self.entries.read().await;
        let raw = entries
            .get(&key)
            .ok_or_else(|| AuraError::NotFound(format!("no local profile for {user_id}")))?;
        decode_profile(raw, &key)
    }

    async fn put(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        let key = self.keys.profile_key(user_id)?;
        let raw = encode_profile(profile)?;
        self.entries.write().await.insert(key, raw);
        debug!(user_id, "profile cached in memory");
        Ok(())
    }

    async fn active_user_id(&self) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(self.keys.active_user_key()).cloned())
    }

    async fn set_active_user_id(&self, user_id: &str) -> Result<()> {
        validate_user_id(user_id)?;
        self.entries
            .write()
            .await
            .insert(self.keys.active_user_key().to_owned(), user_id.to_owned());
        Ok(())
    }

    async fn clear_active_user_id(&self) -> Result<()> {
        self.entries.write().await.remove(self.keys.active_user_key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::ProfileDefaults;
    use chrono::Utc;

    fn profile(id: &str) -> UserProfile {
        UserProfile::new(id, "Jane", "jane@x.com", &ProfileDefaults::default(), Utc::now())
    }

    #[test]
    fn profile_key_is_namespaced() {
        let keys = StoreKeys::default();
        assert_eq!(keys.profile_key("user-1").unwrap(), "db_user_user-1");
        assert_eq!(keys.active_user_key(), "inclusive_travel_user_id");
    }

    #[test]
    fn profile_key_rejects_escaping_ids() {
        let keys = StoreKeys::default();
        for bad in ["", "  ", "../etc", "a/b", "a\\b", ".hidden"] {
            assert!(
                matches!(keys.profile_key(bad), Err(AuraError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn memory_store_put_and_get() {
        let store = MemoryProfileStore::new();
        let p = profile("user-1");
        store.put("user-1", &p).await.unwrap();
        let loaded = store.get("user-1").await.unwrap();
        assert_eq!(loaded, p);
    }

    #[tokio::test]
    async fn memory_store_get_missing_is_not_found() {
        let store = MemoryProfileStore::new();
        let err = store.get("nobody").await.unwrap_err();
        assert!(matches!(err, AuraError::NotFound(_)));
    }

    #[tokio::test]
    async fn memory_store_put_overwrites() {
        let store = MemoryProfileStore::new();
        let mut p = profile("user-1");
        store.put("user-1", &p).await.unwrap();
        p.basic_info.name = "Janet".into();
        store.put("user-1", &p).await.unwrap();
        assert_eq!(store.get("user-1").await.unwrap().basic_info.name, "Janet");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn memory_store_clones_share_entries() {
        let store = MemoryProfileStore::new();
        let clone = store.clone();
        store.put("user-1", &profile("user-1")).await.unwrap();
        assert!(clone.get("user-1").await.is_ok());
    }

    #[tokio::test]
    async fn memory_store_active_user_round_trip() {
        let store = MemoryProfileStore::new();
        assert_eq!(store.active_user_id().await.unwrap(), None);
        store.set_active_user_id("user-7").await.unwrap();
        assert_eq!(store.active_user_id().await.unwrap().as_deref(), Some("user-7"));
        store.clear_active_user_id().await.unwrap();
        assert_eq!(store.active_user_id().await.unwrap(), None);
        store.clear_active_user_id().await.unwrap();
    }

    #[tokio::test]
    async fn open_store_honours_backend_selection() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Fs,
            root_dir: dir.path().join("profiles"),
            ..StorageConfig::default()
        };
        let store = open_store(&config).unwrap();
        store.put("user-1", &profile("user-1")).await.unwrap();
        assert!(dir.path().join("profiles").join("db_user_user-1.json").exists());

        let memory = open_store(&StorageConfig::default()).unwrap();
        assert!(matches!(memory.get("user-1").await, Err(AuraError::NotFound(_))));
    }
}
