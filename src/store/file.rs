//! File-backed deployment store: one file per key under a state directory

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::DeployStore;
use crate::error::{DeployerError, DeployerResult};

/// Stores each key as a file relative to a root directory.
///
/// Keys use `/` as a separator and map directly onto subdirectories,
/// e.g. `deployments/OPEN.json`. Writes go through a temporary file and a
/// rename so a crash mid-write never leaves a truncated value behind.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> DeployerResult<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|part| part.is_empty() || part == "..")
        {
            return Err(DeployerError::Persistence(format!(
                "invalid store key: {key:?}"
            )));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl DeployStore for FileStore {
    async fn read(&self, key: &str) -> DeployerResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DeployerError::Persistence(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> DeployerResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DeployerError::Persistence(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let tmp = tmp_path(&path);
        tokio::fs::write(&tmp, bytes).await.map_err(|e| {
            DeployerError::Persistence(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            DeployerError::Persistence(format!("failed to commit {}: {}", path.display(), e))
        })?;

        debug!(key, bytes = bytes.len(), "store write committed");
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}
