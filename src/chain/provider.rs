//! Ethereum chain client over HTTP providers with automatic failover

use async_trait::async_trait;
use ethers::abi::Abi;
use ethers::prelude::*;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ChainClient, Deployed, FeeMetric, FeeParams};
use crate::config::ChainConfig;
use crate::deploy::ArgValue;
use crate::error::{DeployerError, DeployerResult};

/// Default priority fee reported when sampling (can be improved with fee
/// history): 2 gwei.
fn suggested_priority_fee() -> U256 {
    U256::from(2_000_000_000u64)
}

/// Production `ChainClient` backed by one or more HTTP RPC endpoints.
///
/// Read calls rotate to the next endpoint on failure, like a relayer would;
/// submission itself is attempted once per call since the orchestrator's
/// crash-recovery path already makes whole runs retryable.
pub struct EthChainClient {
    chain_id: u64,
    http_providers: Vec<Provider<Http>>,
    current_provider: AtomicUsize,
    wallet: LocalWallet,
    artifacts_dir: PathBuf,
}

impl EthChainClient {
    pub fn new(config: &ChainConfig, wallet: LocalWallet) -> DeployerResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    http_providers.push(provider);
                    debug!(chain_id = config.chain_id, url = %url, "added HTTP provider");
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "failed to create provider");
                }
            }
        }

        if http_providers.is_empty() {
            return Err(DeployerError::Chain(format!(
                "no valid RPC providers for chain {}",
                config.chain_id
            )));
        }

        Ok(Self {
            chain_id: config.chain_id,
            http_providers,
            current_provider: AtomicUsize::new(0),
            wallet: wallet.with_chain_id(config.chain_id),
            artifacts_dir: config.artifacts_dir.clone(),
        })
    }

    /// Get the active HTTP provider
    fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to the next available provider
    fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!(chain_id = self.chain_id, provider = next, "provider failover");
    }

    /// Load a prebuilt artifact (`{abi, bytecode}`) by contract name.
    async fn load_artifact(
        &self,
        contract: &str,
    ) -> DeployerResult<(Abi, Bytes, serde_json::Value)> {
        let path = self.artifacts_dir.join(format!("{contract}.json"));
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            DeployerError::Chain(format!("failed to read artifact {}: {}", path.display(), e))
        })?;
        let artifact: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            DeployerError::Chain(format!("invalid artifact {}: {}", path.display(), e))
        })?;

        let abi_json = artifact
            .get("abi")
            .cloned()
            .ok_or_else(|| DeployerError::Chain(format!("artifact {contract} has no abi")))?;
        let abi: Abi = serde_json::from_value(abi_json.clone())
            .map_err(|e| DeployerError::Chain(format!("artifact {contract} abi: {e}")))?;

        let bytecode: Bytes = artifact
            .get("bytecode")
            .and_then(|b| b.as_str())
            .ok_or_else(|| DeployerError::Chain(format!("artifact {contract} has no bytecode")))?
            .parse()
            .map_err(|e| DeployerError::Chain(format!("artifact {contract} bytecode: {e}")))?;

        Ok((abi, bytecode, abi_json))
    }
}

/// Prepend constructor arguments to the deployment bytecode.
fn constructor_data(abi: &Abi, bytecode: &Bytes, args: &[ArgValue]) -> DeployerResult<Bytes> {
    let tokens: Vec<_> = args.iter().map(ArgValue::to_token).collect();
    let data = match abi.constructor() {
        Some(ctor) => ctor
            .encode_input(bytecode.to_vec(), &tokens)
            .map_err(|e| DeployerError::Chain(format!("constructor encoding: {e}")))?,
        None if tokens.is_empty() => bytecode.to_vec(),
        None => {
            return Err(DeployerError::Chain(
                "constructor arguments supplied for a contract without a constructor".to_string(),
            ))
        }
    };
    Ok(data.into())
}

#[async_trait]
impl ChainClient for EthChainClient {
    async fn transaction_count(&self, identity: Address) -> DeployerResult<u64> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_transaction_count(identity, None).await {
                Ok(count) => return Ok(count.as_u64()),
                Err(e) => {
                    warn!(chain_id = self.chain_id, error = %e, "failed to get transaction count");
                    self.failover();
                }
            }
        }

        Err(DeployerError::Chain(format!(
            "all providers failed to get transaction count on chain {}",
            self.chain_id
        )))
    }

    async fn fee_metric(&self) -> DeployerResult<FeeMetric> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_block(BlockNumber::Latest).await {
                Ok(Some(block)) => {
                    let base_fee = match block.base_fee_per_gas {
                        Some(fee) => fee,
                        // Pre-1559 chains report gas price instead.
                        None => self.http().get_gas_price().await.map_err(|e| {
                            DeployerError::Chain(format!("failed to get gas price: {e}"))
                        })?,
                    };
                    return Ok(FeeMetric {
                        base_fee,
                        priority_fee: suggested_priority_fee(),
                    });
                }
                Ok(None) => {
                    warn!(chain_id = self.chain_id, "no latest block");
                    self.failover();
                }
                Err(e) => {
                    warn!(chain_id = self.chain_id, error = %e, "failed to sample fees");
                    self.failover();
                }
            }
        }

        Err(DeployerError::Chain(format!(
            "all providers failed to sample fees on chain {}",
            self.chain_id
        )))
    }

    async fn send_deployment(
        &self,
        contract: &str,
        args: &[ArgValue],
        nonce: u64,
        fees: &FeeParams,
    ) -> DeployerResult<Deployed> {
        let (abi, bytecode, abi_json) = self.load_artifact(contract).await?;
        let data = constructor_data(&abi, &bytecode, args)?;

        // Contract creation: no `to` field.
        let mut tx: TypedTransaction = Eip1559TransactionRequest::new()
            .from(self.wallet.address())
            .data(data)
            .nonce(nonce)
            .max_fee_per_gas(fees.max_fee_per_gas)
            .max_priority_fee_per_gas(fees.max_priority_fee_per_gas)
            .chain_id(self.chain_id)
            .into();

        let gas = self
            .http()
            .estimate_gas(&tx, None)
            .await
            .map_err(|e| DeployerError::Chain(format!("gas estimation for {contract}: {e}")))?;
        // 20% buffer over the estimate.
        tx.set_gas(gas * 120u64 / 100u64);

        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| DeployerError::Wallet(format!("failed to sign transaction: {e}")))?;

        let pending = self
            .http()
            .send_raw_transaction(tx.rlp_signed(&signature))
            .await
            .map_err(|e| DeployerError::Chain(format!("failed to send {contract}: {e}")))?;
        let tx_hash = pending.tx_hash();
        info!(contract, nonce, tx_hash = %format!("{tx_hash:#x}"), "deployment transaction sent");

        let receipt = pending
            .await
            .map_err(|e| DeployerError::Chain(format!("awaiting {tx_hash:#x}: {e}")))?
            .ok_or_else(|| DeployerError::Chain(format!("transaction {tx_hash:#x} dropped")))?;

        if receipt.status != Some(1u64.into()) {
            return Err(DeployerError::Chain(format!(
                "transaction {tx_hash:#x} reverted"
            )));
        }

        let address = receipt.contract_address.ok_or_else(|| {
            DeployerError::Chain(format!("receipt {tx_hash:#x} missing contract address"))
        })?;

        Ok(Deployed {
            address,
            tx_hash: receipt.transaction_hash,
            abi: abi_json,
        })
    }
}
