//! Plan source: the genesis token-launch deployment plan
//!
//! Builds the ordered step list from environment-specific constants and
//! seeds the collaborator records (multisig, ENS reverse registrar) that
//! the plan references but does not deploy.

use chrono::{NaiveDate, NaiveTime};
use ethers::types::{Address, U256};
use serde_json::json;
use tracing::info;

use crate::config::LaunchConfig;
use crate::deploy::{
    ArgValue, DeploymentPlan, DeploymentRecord, DeploymentRegistry, DeploymentStep,
};
use crate::error::DeployerResult;

fn ether(tokens: u64) -> U256 {
    U256::from(tokens) * U256::exp10(18)
}

fn milliether(value: u64) -> U256 {
    U256::from(value) * U256::exp10(15)
}

fn gwei(value: u64) -> U256 {
    U256::from(value) * U256::exp10(9)
}

/// Unix timestamp of UTC midnight on `date`.
fn utc_midnight(date: NaiveDate) -> u64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp().max(0) as u64
}

/// Seed registry records for collaborators the plan depends on.
///
/// On non-live networks the deployer account stands in for the multisig,
/// and the ENS registrar is deployed as a mock plan step instead. On live
/// networks both addresses come from configuration; `put` rejects them if
/// they conflict with what a previous run recorded.
pub async fn seed_external_records(
    registry: &DeploymentRegistry,
    cfg: &LaunchConfig,
    live: bool,
    deployer: Address,
) -> DeployerResult<()> {
    if !live {
        registry
            .put(
                "multisig",
                &DeploymentRecord::new("Multisig", deployer, json!([])),
            )
            .await?;
        info!(%deployer, "non-live network: seeded deployer as multisig");
        return Ok(());
    }

    if let Some(address) = cfg.multisig {
        registry
            .put(
                "multisig",
                &DeploymentRecord::new("Multisig", address, json!([])),
            )
            .await?;
    }
    if let Some(address) = cfg.ens_reverse_registrar {
        registry
            .put(
                "ens",
                &DeploymentRecord::new("ReverseRegistrar", address, json!([])),
            )
            .await?;
    }

    Ok(())
}

/// Build the ordered launch plan.
pub fn launch_plan(cfg: &LaunchConfig, live: bool) -> DeploymentPlan {
    let mut plan = DeploymentPlan::new();

    if !live {
        plan.push(DeploymentStep::new("ens", "MockReverseRegistrar"));
    }

    plan.push(
        DeploymentStep::new("OPEN", "OPEN")
            .arg(ArgValue::Text(cfg.token_name.clone()))
            .arg(ArgValue::Text(cfg.token_ticker.clone()))
            .arg(ArgValue::Uint(ether(cfg.max_supply_tokens)))
            .dependency("multisig")
            .dependency("ens"),
    );

    plan.push(
        DeploymentStep::new("ValidatorPass", "ValidatorPass")
            .arg(ArgValue::Text(cfg.validator_pass_name.clone()))
            .arg(ArgValue::Text(cfg.validator_pass_ticker.clone()))
            .arg(ArgValue::Text(cfg.validator_pass_uri.clone()))
            .dependency("multisig")
            .dependency("ens"),
    );

    let exchange_rates = cfg
        .fundraiser_exchange_rates
        .iter()
        .map(|&rate| U256::from(rate))
        .collect();
    let period_ends = cfg
        .fundraising_period_ends
        .iter()
        .map(|&date| U256::from(utc_midnight(date)))
        .collect();
    plan.push(
        DeploymentStep::new("Fundraiser", "Fundraiser")
            .arg(ArgValue::UintArray(exchange_rates))
            .dependency("OPEN")
            .dependency("ValidatorPass")
            .dependency("multisig")
            .arg(ArgValue::Uint(U256::from(utc_midnight(
                cfg.fundraising_start,
            ))))
            .arg(ArgValue::UintArray(period_ends))
            .arg(ArgValue::Uint(milliether(
                cfg.fundraiser_min_contribution_milliether,
            )))
            .arg(ArgValue::Uint(milliether(
                cfg.fundraiser_max_contribution_milliether,
            )))
            .dependency("ens")
            .dependency("multisig"),
    );

    plan.push(
        DeploymentStep::new("OpenWithdrawing", "OpenWithdrawing")
            .dependency("OPEN")
            .arg(ArgValue::Address(cfg.withdraw_signer))
            .dependency("ens")
            .dependency("multisig"),
    );

    plan.push(
        DeploymentStep::new("VerifiedContributor", "VerifiedContributor")
            .arg(ArgValue::Text(cfg.verified_contributor_name.clone()))
            .arg(ArgValue::Text(cfg.verified_contributor_ticker.clone()))
            .arg(ArgValue::Text(cfg.verified_contributor_uri.clone()))
            .dependency("multisig")
            .dependency("ens"),
    );

    plan.push(
        DeploymentStep::new("VerifiedContributorStaking", "VerifiedContributorStaking")
            .dependency("OPEN")
            .dependency("VerifiedContributor")
            .arg(ArgValue::Uint(gwei(cfg.staking_tokens_per_second_gwei)))
            .dependency("multisig")
            .dependency("ens"),
    );

    plan
}
