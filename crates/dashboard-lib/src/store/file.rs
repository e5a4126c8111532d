//! File-backed state store
//!
//! Layout: `<root>/<namespace>/<name>.json`. Each write goes to a unique
//! temp file, is synced, then renamed over the target so readers only ever
//! see a complete record.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{PauseRecord, StoreError, WorkloadId, WorkloadStateStore};

const RECORD_EXTENSION: &str = "json";

/// Pause records persisted as one JSON file per workload
#[derive(Debug)]
pub struct FileStateStore {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl FileStateStore {
    /// Create a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            temp_counter: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &WorkloadId) -> Result<PathBuf, StoreError> {
        validate_segment(&id.namespace, id)?;
        validate_segment(&id.name, id)?;
        Ok(self
            .root
            .join(&id.namespace)
            .join(format!("{}.{}", id.name, RECORD_EXTENSION)))
    }

    fn temp_path(&self, target: &Path) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let mut name = target.as_os_str().to_owned();
        name.push(format!(".{}.{}.tmp", std::process::id(), n));
        PathBuf::from(name)
    }
}

/// Namespace and object names are DNS labels/subdomains; anything that could
/// escape the store root is rejected.
fn validate_segment(segment: &str, id: &WorkloadId) -> Result<(), StoreError> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(id.key()))
    }
}

#[async_trait]
impl WorkloadStateStore for FileStateStore {
    async fn put(&self, id: &WorkloadId, record: &PauseRecord) -> Result<(), StoreError> {
        let path = self.record_path(id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(record)?;
        let temp_path = self.temp_path(&path);

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(workload = %id, path = %path.display(), "Pause record written");
        Ok(())
    }

    async fn get(&self, id: &WorkloadId) -> Result<Option<PauseRecord>, StoreError> {
        let path = self.record_path(id)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &WorkloadId) -> Result<(), StoreError> {
        let path = self.record_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(workload = %id, "Pause record removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<(WorkloadId, PauseRecord)>, StoreError> {
        let mut records = Vec::new();

        let mut namespaces = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };

        while let Some(ns_entry) = namespaces.next_entry().await? {
            if !ns_entry.file_type().await?.is_dir() {
                continue;
            }
            let namespace = ns_entry.file_name().to_string_lossy().into_owned();

            let mut files = fs::read_dir(ns_entry.path()).await?;
            while let Some(entry) = files.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                    continue;
                }
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };

                let id = WorkloadId::new(namespace.clone(), name);
                let data = fs::read(&path).await?;
                match serde_json::from_slice::<PauseRecord>(&data) {
                    Ok(record) => records.push((id, record)),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable pause record");
                    }
                }
            }
        }

        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{PauseMechanism, WorkloadKind};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        let id = WorkloadId::new("prod", "app");

        assert!(store.get(&id).await.unwrap().is_none());

        let record = PauseRecord::deployment(3, PauseMechanism::ScaledToZero);
        store.put(&id, &record).await.unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(dir.path().join("prod").join("app.json").exists());

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());

        // deleting twice is fine
        store.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_replaces_existing_record() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        let id = WorkloadId::new("prod", "app");

        store
            .put(&id, &PauseRecord::deployment(3, PauseMechanism::ScaledToZero))
            .await
            .unwrap();
        store
            .put(&id, &PauseRecord::deployment(5, PauseMechanism::ScaledToZero))
            .await
            .unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.original_replicas, 5);

        // no temp files are left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("prod"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_records_survive_new_store_instance() {
        let dir = TempDir::new().unwrap();
        let id = WorkloadId::new("default", "standalone-1");

        {
            let store = FileStateStore::new(dir.path());
            store
                .put(&id, &PauseRecord::pod(PauseMechanism::Deleted, Default::default()))
                .await
                .unwrap();
        }

        let reopened = FileStateStore::new(dir.path());
        let record = reopened.get(&id).await.unwrap().unwrap();
        assert_eq!(record.kind, WorkloadKind::Pod);
        assert_eq!(record.mechanism, PauseMechanism::Deleted);
    }

    #[tokio::test]
    async fn test_list_returns_sorted_records_and_skips_garbage() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());

        store
            .put(
                &WorkloadId::new("prod", "web"),
                &PauseRecord::deployment(2, PauseMechanism::ScaledToZero),
            )
            .await
            .unwrap();
        store
            .put(
                &WorkloadId::new("dev", "api"),
                &PauseRecord::deployment(1, PauseMechanism::ScaledToZero),
            )
            .await
            .unwrap();
        std::fs::write(dir.path().join("prod").join("broken.json"), b"{not json").unwrap();
        std::fs::write(dir.path().join("prod").join("notes.txt"), b"ignored").unwrap();

        let records = store.list().await.unwrap();
        let keys: Vec<String> = records.iter().map(|(id, _)| id.key()).collect();
        assert_eq!(keys, vec!["dev/api", "prod/web"]);
    }

    #[tokio::test]
    async fn test_list_on_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path().join("does-not-exist"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        let record = PauseRecord::deployment(1, PauseMechanism::ScaledToZero);

        for id in [
            WorkloadId::new("..", "app"),
            WorkloadId::new("prod", "../escape"),
            WorkloadId::new("", "app"),
        ] {
            let err = store.put(&id, &record).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey(_)));
        }
    }

    #[tokio::test]
    async fn test_corrupted_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("prod")).unwrap();
        std::fs::write(dir.path().join("prod").join("app.json"), b"garbage").unwrap();

        let err = store.get(&WorkloadId::new("prod", "app")).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
