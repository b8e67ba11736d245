//! Idempotent registry of deployment results
//!
//! The registry is the single source of truth for "has this step already
//! run to completion". It is consulted strictly before any nonce allocation
//! or submission, so a skipped step performs zero chain interaction.

use chrono::Utc;
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::{DeployerError, DeployerResult};
use crate::store::DeployStore;

/// Outcome of deploying one step. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub contract: String,
    pub address: Address,
    pub abi: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<H256>,
    /// Unix seconds at which the record was created.
    pub deployed_at: u64,
}

impl DeploymentRecord {
    pub fn new(
        contract: impl Into<String>,
        address: Address,
        abi: serde_json::Value,
    ) -> Self {
        Self {
            contract: contract.into(),
            address,
            abi,
            tx_hash: None,
            deployed_at: Utc::now().timestamp().max(0) as u64,
        }
    }

    pub fn with_tx_hash(mut self, tx_hash: H256) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }
}

/// Key-value registry of prior deployment results.
pub struct DeploymentRegistry {
    store: Arc<dyn DeployStore>,
}

impl DeploymentRegistry {
    pub fn new(store: Arc<dyn DeployStore>) -> Self {
        Self { store }
    }

    /// Fetch the record for `name`, if one exists.
    pub async fn get(&self, name: &str) -> DeployerResult<Option<DeploymentRecord>> {
        match self.store.read(&record_key(name)).await? {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes).map_err(|e| {
                    DeployerError::Persistence(format!("corrupt record for `{name}`: {e}"))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Record the result of deploying `name`.
    ///
    /// Overwriting is only legal when the address is unchanged; a differing
    /// address means the plan changed against a stale registry and the run
    /// must stop for operator intervention.
    pub async fn put(&self, name: &str, record: &DeploymentRecord) -> DeployerResult<()> {
        if let Some(existing) = self.get(name).await? {
            if existing.address != record.address {
                return Err(DeployerError::RegistryConflict {
                    name: name.to_string(),
                    recorded: existing.address,
                    attempted: record.address,
                });
            }
            debug!(name, address = %record.address, "re-recording identical deployment");
        }

        let bytes = serde_json::to_vec_pretty(record).map_err(|e| {
            DeployerError::Persistence(format!("failed to encode record for `{name}`: {e}"))
        })?;
        self.store.write(&record_key(name), &bytes).await
    }
}

fn record_key(name: &str) -> String {
    format!("deployments/{name}.json")
}
