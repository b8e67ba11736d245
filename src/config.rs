//! Configuration management for the genesis deployer
//!
//! Loads configuration from TOML files with environment variable substitution.
//! All settings are passed explicitly into the components that need them;
//! nothing is read from process-wide state after startup.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use ethers::types::{Address, U256};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::chain::FeeParams;
use crate::tx::FeeCeiling;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub deployer: DeployerConfig,
    pub chain: ChainConfig,
    pub wallet: WalletConfig,
    pub fees: FeeConfig,
    pub launch: LaunchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployerConfig {
    /// Directory holding the durable nonce file and deployment records.
    pub state_dir: PathBuf,
    /// Fee gate polling interval.
    pub poll_interval_ms: u64,
    /// Consecutive fee-sample failures tolerated before aborting the run.
    pub max_fee_sample_failures: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_urls: Vec<String>,
    /// Whether this is a live network. Non-live networks get mock
    /// collaborator contracts seeded before the plan runs.
    pub live: bool,
    /// Directory of prebuilt artifact JSON files (`{abi, bytecode}`).
    pub artifacts_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Environment variable holding the deployer private key.
    pub private_key_env: Option<String>,
}

/// Fee ceilings and submission fee parameters, all in wei.
///
/// Integers only: fee arithmetic never touches floating point.
#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    /// Maximum base fee at which submission is admitted.
    pub max_base_fee_wei: u64,
    /// Optional cap on the sampled priority fee.
    pub max_priority_fee_wei: Option<u64>,
    /// `max_fee_per_gas` attached to deployment transactions.
    pub submit_max_fee_wei: u64,
    /// `max_priority_fee_per_gas` attached to deployment transactions.
    pub submit_priority_fee_wei: u64,
}

impl FeeConfig {
    pub fn ceiling(&self) -> FeeCeiling {
        FeeCeiling {
            max_base_fee: U256::from(self.max_base_fee_wei),
            max_priority_fee: self.max_priority_fee_wei.map(U256::from),
        }
    }

    pub fn params(&self) -> FeeParams {
        FeeParams {
            max_fee_per_gas: U256::from(self.submit_max_fee_wei),
            max_priority_fee_per_gas: U256::from(self.submit_priority_fee_wei),
        }
    }
}

/// Environment-specific constants for the launch plan.
///
/// Monetary quantities are integers in explicit sub-denominations
/// (whole tokens, milli-ether, gwei) and converted to wei when the
/// plan is built.
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchConfig {
    pub token_name: String,
    pub token_ticker: String,
    /// Maximum token supply in whole tokens (converted to wei).
    pub max_supply_tokens: u64,

    pub validator_pass_name: String,
    pub validator_pass_ticker: String,
    pub validator_pass_uri: String,

    /// Tokens granted per contributed ether, one rate per fundraising period.
    pub fundraiser_exchange_rates: Vec<u64>,
    /// Fundraising opens at UTC midnight on this date.
    pub fundraising_start: NaiveDate,
    /// Period end dates, same length and order as the exchange rates.
    pub fundraising_period_ends: Vec<NaiveDate>,
    pub fundraiser_min_contribution_milliether: u64,
    pub fundraiser_max_contribution_milliether: u64,

    pub withdraw_signer: Address,

    pub verified_contributor_name: String,
    pub verified_contributor_ticker: String,
    pub verified_contributor_uri: String,

    /// Staking emission rate in gwei-denominated token units per second.
    pub staking_tokens_per_second_gwei: u64,

    /// Pre-existing multisig address, required on live networks.
    pub multisig: Option<Address>,
    /// Pre-existing ENS reverse registrar, required on live networks.
    pub ens_reverse_registrar: Option<Address>,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("GENESIS_DEPLOYER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.chain.rpc_urls.is_empty() {
            anyhow::bail!("Chain {} has no RPC URLs configured", self.chain.name);
        }

        if self.deployer.poll_interval_ms == 0 {
            anyhow::bail!("Fee gate poll interval must be non-zero");
        }

        if self.launch.fundraiser_exchange_rates.len() != self.launch.fundraising_period_ends.len()
        {
            anyhow::bail!(
                "Fundraiser has {} exchange rates but {} period ends",
                self.launch.fundraiser_exchange_rates.len(),
                self.launch.fundraising_period_ends.len()
            );
        }

        // On live networks the multisig and ENS registrar must pre-exist;
        // on non-live networks they are seeded as mocks.
        if self.chain.live
            && (self.launch.multisig.is_none() || self.launch.ens_reverse_registrar.is_none())
        {
            anyhow::bail!(
                "Live network {} requires multisig and ens_reverse_registrar addresses",
                self.chain.name
            );
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
