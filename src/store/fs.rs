//! Filesystem-backed profile store.
//!
//! Each key is stored as `{root_dir}/{key}.json`. Writes are atomic (temp
//! file + fsync + rename) so a crash never leaves a half-written record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{ProfileStore, StoreKeys, decode_profile, encode_profile, validate_user_id};
use crate::error::{AuraError, Result};
use crate::profile::UserProfile;

/// Filesystem-backed profile store.
#[derive(Debug, Clone)]
pub struct FsProfileStore {
    root_dir: PathBuf,
    keys: StoreKeys,
}

impl FsProfileStore {
    /// Create a store rooted at `root_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Storage`] if the directory cannot be created.
    pub fn new(root_dir: impl Into<PathBuf>, keys: StoreKeys) -> Result<Self> {
        let root_dir = root_dir.into();
        std::fs::create_dir_all(&root_dir).map_err(|e| {
            AuraError::Storage(format!(
                "failed to create profile directory {}: {e}",
                root_dir.display()
            ))
        })?;
        Ok(Self { root_dir, keys })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root_dir.join(format!("{key}.json"))
    }

    /// Read a key's raw value; `None` when the file does not exist.
    async fn read_key(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AuraError::Storage(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Atomically replace a key's value.
    ///
    /// Every write gets its own temp file, so concurrent writers to one key
    /// race only on the final rename and the last rename wins.
    async fn write_key(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key);
        let tmp_path = self
            .root_dir
            .join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4()));

        if let Err(e) = write_synced(&tmp_path, value.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(AuraError::Storage(format!(
                "failed to write temp file {}: {e}",
                tmp_path.display()
            )));
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(AuraError::Storage(format!(
                "failed to rename temp file to {}: {e}",
                path.display()
            )));
        }
        Ok(())
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[async_trait]
impl ProfileStore for FsProfileStore {
    async fn get(&self, user_id: &str) -> Result<UserProfile> {
        let key = self.keys.profile_key(user_id)?;
        let raw = self
            .read_key(&key)
            .await?
            .ok_or_else(|| AuraError::NotFound(format!("no local profile for {user_id}")))?;
        decode_profile(&raw, &key)
    }

    async fn put(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        let key = self.keys.profile_key(user_id)?;
        let raw = encode_profile(profile)?;
        self.write_key(&key, &raw).await?;
        debug!(user_id, path = %self.key_path(&key).display(), "profile cached on disk");
        Ok(())
    }

    async fn active_user_id(&self) -> Result<Option<String>> {
        let key = self.keys.active_user_key();
        let Some(raw) = self.read_key(key).await? else {
            return Ok(None);
        };
        serde_json::from_str::<String>(&raw)
            .map(Some)
            .map_err(|e| AuraError::Storage(format!("failed to parse {key}: {e}")))
    }

    async fn set_active_user_id(&self, user_id: &str) -> Result<()> {
        validate_user_id(user_id)?;
        let raw = serde_json::to_string(user_id)
            .map_err(|e| AuraError::Storage(format!("failed to serialize user id: {e}")))?;
        self.write_key(self.keys.active_user_key(), &raw).await
    }

    async fn clear_active_user_id(&self) -> Result<()> {
        let path = self.key_path(self.keys.active_user_key());
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuraError::Storage(format!(
                "failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::ProfileDefaults;
    use chrono::Utc;

    fn store() -> (tempfile::TempDir, FsProfileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsProfileStore::new(dir.path().join("profiles"), StoreKeys::default()).unwrap();
        (dir, store)
    }

    fn profile(id: &str) -> UserProfile {
        UserProfile::new(id, "Jane", "jane@x.com", &ProfileDefaults::default(), Utc::now())
    }

    fn leftover_temp_files(store: &FsProfileStore) -> Vec<PathBuf> {
        std::fs::read_dir(store.root_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "tmp"))
            .collect()
    }

    #[test]
    fn new_creates_root_dir() {
        let (dir, store) = store();
        assert!(store.root_dir().is_dir());
        assert!(store.root_dir().starts_with(dir.path()));
    }

    #[tokio::test]
    async fn put_and_get_round_trip() {
        let (_dir, store) = store();
        let p = profile("user-1");
        store.put("user-1", &p).await.unwrap();
        assert_eq!(store.get("user-1").await.unwrap(), p);
        assert!(store.root_dir().join("db_user_user-1.json").exists());
        assert!(leftover_temp_files(&store).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_to_one_key_all_succeed() {
        let (_dir, store) = store();
        let p = profile("user-1");

        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = store.clone();
            let p = p.clone();
            handles.push(tokio::spawn(async move { store.put("user-1", &p).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get("user-1").await.unwrap(), p);
        assert!(leftover_temp_files(&store).is_empty());
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(store.get("ghost").await, Err(AuraError::NotFound(_))));
    }

    #[tokio::test]
    async fn corrupt_record_is_storage_error() {
        let (_dir, store) = store();
        std::fs::write(store.root_dir().join("db_user_bad.json"), "{not json").unwrap();
        assert!(matches!(store.get("bad").await, Err(AuraError::Storage(_))));
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let (dir, store) = store();
        store.put("user-1", &profile("user-1")).await.unwrap();
        store.set_active_user_id("user-1").await.unwrap();

        let reopened = FsProfileStore::new(dir.path().join("profiles"), StoreKeys::default()).unwrap();
        assert!(reopened.get("user-1").await.is_ok());
        assert_eq!(
            reopened.active_user_id().await.unwrap().as_deref(),
            Some("user-1")
        );
    }

    #[tokio::test]
    async fn clear_active_user_is_idempotent() {
        let (_dir, store) = store();
        store.clear_active_user_id().await.unwrap();
        store.set_active_user_id("user-2").await.unwrap();
        store.clear_active_user_id().await.unwrap();
        assert_eq!(store.active_user_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn traversal_ids_are_rejected() {
        let (_dir, store) = store();
        let result = store.put("../escape", &profile("../escape")).await;
        assert!(matches!(result, Err(AuraError::Validation(_))));
    }
}
