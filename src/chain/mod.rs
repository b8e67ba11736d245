//! Chain access layer
//!
//! This module provides:
//! - The `ChainClient` boundary consumed by the nonce manager, fee gate and
//!   orchestrator
//! - The production implementation over ethers HTTP providers with
//!   automatic failover

pub mod provider;

pub use provider::EthChainClient;

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};

use crate::deploy::ArgValue;
use crate::error::DeployerResult;

/// Network fee observation: cost-per-gas the chain currently charges for
/// inclusion in the next block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeMetric {
    pub base_fee: U256,
    pub priority_fee: U256,
}

/// Fee fields attached to a submitted transaction.
#[derive(Debug, Clone, Copy)]
pub struct FeeParams {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Outcome of a successful deployment submission.
#[derive(Debug, Clone)]
pub struct Deployed {
    pub address: Address,
    pub tx_hash: H256,
    /// ABI descriptor of the deployed contract, as found in its artifact.
    pub abi: serde_json::Value,
}

/// Everything the deployment core needs from the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The identity's current on-chain transaction count.
    async fn transaction_count(&self, identity: Address) -> DeployerResult<u64>;

    /// Sample the current network fee metric.
    async fn fee_metric(&self) -> DeployerResult<FeeMetric>;

    /// Submit a contract-creation transaction and wait for its receipt.
    async fn send_deployment(
        &self,
        contract: &str,
        args: &[ArgValue],
        nonce: u64,
        fees: &FeeParams,
    ) -> DeployerResult<Deployed>;
}
