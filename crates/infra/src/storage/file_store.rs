//! File-backed [`KeyValueStore`].
//!
//! One file per key under a directory. File names are the hex encoding of the
//! key, so any key is a valid name and no two keys collide. Writes go through
//! a temporary file and a rename, so readers never observe a torn entry.
//!
//! Each file starts with an 8-byte big-endian expiry (UNIX milliseconds,
//! derived from the TTL hint; `u64::MAX` for a zero hint). Opening a store
//! scans the directory and removes expired files, so entries written by an
//! earlier process are reclaimed even if no one reads their key again.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use oncovista_common::{KeyValueStore, StoreError};
use tracing::{debug, info, warn};
use uuid::Uuid;

const ENTRY_EXTENSION: &str = "entry";
const HEADER_LEN: usize = 8;
const NO_EXPIRY: u64 = u64::MAX;

#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `directory`, removing
    /// entries that expired while no process was running.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;
        let store = Self { directory };
        let removed = store.purge_expired().await?;
        debug!(directory = %store.directory.display(), removed, "file store opened");
        Ok(store)
    }

    /// Remove every entry whose recorded expiry has passed.
    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.purge_expired_before(now_millis()).await
    }

    async fn purge_expired_before(&self, cutoff_ms: u64) -> Result<usize, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let expired = match tokio::fs::read(&path).await {
                Ok(bytes) => decode(&bytes).map_or(true, |(expires_at, _)| expires_at <= cutoff_ms),
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Unreadable cache file skipped");
                    continue;
                }
            };
            if expired {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        if removed > 0 {
            info!(directory = %self.directory.display(), removed, "Reclaimed expired cache files");
        }
        Ok(removed)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.{ENTRY_EXTENSION}", hex::encode(key.as_bytes())))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => match decode(&bytes) {
                Some((_, payload)) => Ok(Some(payload.to_vec())),
                None => Err(StoreError::Backend(format!("truncated cache file for key {key}"))),
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_hint: Duration) -> Result<(), StoreError> {
        let target = self.path_for(key);
        let staging = self.directory.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&staging, encode(expiry_for(now_millis(), ttl_hint), &value)).await?;
        if let Err(err) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

fn expiry_for(now_ms: u64, ttl_hint: Duration) -> u64 {
    if ttl_hint.is_zero() {
        return NO_EXPIRY;
    }
    let ttl_ms = u64::try_from(ttl_hint.as_millis()).unwrap_or(NO_EXPIRY);
    now_ms.saturating_add(ttl_ms)
}

fn encode(expires_at: u64, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&expires_at.to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

fn decode(bytes: &[u8]) -> Option<(u64, &[u8])> {
    let (header, payload) = bytes.split_first_chunk::<HEADER_LEN>()?;
    Some((u64::from_be_bytes(*header), payload))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("cache")).await.unwrap();

        assert_eq!(store.get("recommendations:abc").await.unwrap(), None);
        store.set("recommendations:abc", b"{}".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("recommendations:abc").await.unwrap(), Some(b"{}".to_vec()));

        store.delete("recommendations:abc").await.unwrap();
        store.delete("recommendations:abc").await.unwrap();
        assert_eq!(store.get("recommendations:abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_with_separators_map_to_distinct_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.set("lkg:recommendations:1", b"a".to_vec(), Duration::ZERO).await.unwrap();
        store.set("lkg/recommendations/1", b"b".to_vec(), Duration::ZERO).await.unwrap();

        assert_eq!(store.get("lkg:recommendations:1").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.get("lkg/recommendations/1").await.unwrap(), Some(b"b".to_vec()));
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 2);
    }

    /// Validates that expired files are reclaimed without their key being read.
    ///
    /// # Test Steps
    /// 1. Write one entry with a 60s hint and one with no expiry
    /// 2. Purge as of two minutes from now
    /// 3. Reopen the store after planting an already-expired file
    ///
    /// Assertions:
    /// - Confirms only the expired entry is removed.
    /// - Confirms opening a store reclaims files left by an earlier process.
    #[tokio::test]
    async fn expired_files_are_reclaimed() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("recommendations:short", b"a".to_vec(), Duration::from_secs(60)).await.unwrap();
        store.set("lkg:recommendations:keep", b"b".to_vec(), Duration::ZERO).await.unwrap();

        let removed = store.purge_expired_before(now_millis() + 120_000).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.get("recommendations:short").await.unwrap(), None);
        assert_eq!(store.get("lkg:recommendations:keep").await.unwrap(), Some(b"b".to_vec()));

        let stale = store.path_for("recommendations:stale");
        std::fs::write(&stale, encode(now_millis().saturating_sub(1_000), b"old")).unwrap();
        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert!(!stale.exists());
        assert_eq!(reopened.get("lkg:recommendations:keep").await.unwrap(), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn truncated_file_is_a_backend_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        std::fs::write(store.path_for("recommendations:bad"), b"abc").unwrap();

        assert!(matches!(store.get("recommendations:bad").await, Err(StoreError::Backend(_))));
    }
}
