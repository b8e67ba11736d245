//! In-memory deployment store for tests and dry runs

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::DeployStore;
use crate::error::{DeployerError, DeployerResult};

/// A `DeployStore` that keeps everything in a process-local map.
///
/// Nothing survives the process; useful for dry runs against a fork and for
/// unit tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeployStore for MemoryStore {
    async fn read(&self, key: &str) -> DeployerResult<Option<Vec<u8>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| DeployerError::Persistence("store mutex poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> DeployerResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DeployerError::Persistence("store mutex poisoned".to_string()))?;
        entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}
