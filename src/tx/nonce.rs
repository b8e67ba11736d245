//! Nonce management for crash-safe deployment runs
//!
//! Handles:
//! - Seeding the counter from the persisted value or the chain's reported
//!   transaction count
//! - Strictly increasing in-memory allocation
//! - Reconciliation against an externally advanced on-chain count

use ethers::types::Address;
use tracing::{debug, warn};

use crate::chain::ChainClient;
use crate::error::{DeployerError, DeployerResult};
use crate::store::DeployStore;

/// Owns the transaction-sequence counter for one deployer identity.
///
/// The counter is persisted exactly once, when it is first seeded from the
/// chain; after that, restart recovery relies on the registry skipping
/// completed steps and on the floor raising allocations past any
/// transactions submitted outside the recorded plan.
#[derive(Debug)]
pub struct NonceManager {
    identity: Address,
    /// Next nonce to hand out, before applying the floor.
    next: u64,
    /// On-chain transaction count observed for the identity; allocations
    /// never go below this.
    floor: u64,
}

impl NonceManager {
    /// Initialize the counter for `identity`.
    ///
    /// Reads the persisted seed if present; otherwise queries the chain's
    /// transaction count and persists it. The on-chain count is always
    /// observed and becomes the initial floor.
    pub async fn initialize(
        store: &dyn DeployStore,
        chain: &dyn ChainClient,
        identity: Address,
    ) -> DeployerResult<Self> {
        let key = nonce_key(identity);
        let observed = chain.transaction_count(identity).await?;

        let next = match store.read(&key).await? {
            Some(bytes) => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    DeployerError::Persistence(format!("corrupt nonce state at {key}: {e}"))
                })?;
                text.trim().parse::<u64>().map_err(|e| {
                    DeployerError::Persistence(format!("corrupt nonce state at {key}: {e}"))
                })?
            }
            None => {
                store.write(&key, observed.to_string().as_bytes()).await?;
                debug!(%identity, nonce = observed, "seeded nonce from chain");
                observed
            }
        };

        debug!(%identity, next, floor = observed, "nonce manager initialized");
        Ok(Self {
            identity,
            next,
            floor: observed,
        })
    }

    /// Allocate the next nonce.
    ///
    /// Returns `max(internal counter, observed chain count)`; every value is
    /// strictly greater than all previously returned ones.
    pub fn allocate(&mut self) -> u64 {
        let nonce = self.next.max(self.floor);
        self.next = nonce + 1;
        debug!(identity = %self.identity, nonce, "allocated nonce");
        nonce
    }

    /// Raise the floor to a freshly observed on-chain transaction count.
    ///
    /// Guards against external transactions (or a prior partial run that
    /// submitted without recording) having advanced the identity's count
    /// since initialization.
    pub fn reconcile(&mut self, observed_chain_count: u64) {
        if observed_chain_count > self.floor {
            warn!(
                identity = %self.identity,
                floor = self.floor,
                observed = observed_chain_count,
                "on-chain transaction count advanced externally"
            );
            self.floor = observed_chain_count;
        }
    }

    pub fn identity(&self) -> Address {
        self.identity
    }
}

fn nonce_key(identity: Address) -> String {
    format!("nonce/{identity:#x}")
}
