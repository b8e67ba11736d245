//! Durable key-value storage for deployment state
//!
//! Handles:
//! - The persisted nonce seed for restart recovery
//! - Deployment records written by the registry
//!
//! The store assumes single-writer access; concurrent runs against the same
//! state directory must be excluded externally (file lock or equivalent).

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::DeployerResult;

/// Byte-oriented key-value store backing the nonce manager and the registry.
#[async_trait]
pub trait DeployStore: Send + Sync {
    /// Read the bytes stored under `key`, or `None` if absent.
    async fn read(&self, key: &str) -> DeployerResult<Option<Vec<u8>>>;

    /// Durably write `bytes` under `key`, replacing any previous value.
    async fn write(&self, key: &str, bytes: &[u8]) -> DeployerResult<()>;
}
