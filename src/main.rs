//! Genesis deployer - one-shot, crash-safe contract deployment orchestration
//!
//! Deploys the fixed genesis contract set in dependency order, at most once
//! per contract across repeated runs. Nonces are allocated without gaps or
//! collisions even if the process is killed and restarted, and submission
//! is held back until the observed network fee drops below the configured
//! ceiling.

use anyhow::Result;
use ethers::signers::{LocalWallet, Signer};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

mod chain;
mod config;
mod deploy;
mod error;
mod launch;
mod store;
#[cfg(test)]
mod testutil;
mod tx;

use chain::{ChainClient, EthChainClient};
use config::{Settings, WalletConfig};
use deploy::{DeploymentRegistry, Orchestrator};
use error::{DeployerError, DeployerResult};
use store::{DeployStore, FileStore};
use tx::{FeeGate, NonceManager};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("starting genesis-deployer v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    let wallet = load_wallet(&settings.wallet)?;
    let identity = wallet.address();
    info!(
        %identity,
        chain = %settings.chain.name,
        live = settings.chain.live,
        "deployer identity loaded"
    );

    let store: Arc<dyn DeployStore> = Arc::new(FileStore::new(&settings.deployer.state_dir));
    let chain: Arc<dyn ChainClient> = Arc::new(EthChainClient::new(&settings.chain, wallet)?);

    let registry = DeploymentRegistry::new(store.clone());
    launch::seed_external_records(&registry, &settings.launch, settings.chain.live, identity)
        .await?;

    let nonce = NonceManager::initialize(store.as_ref(), chain.as_ref(), identity).await?;
    let fee_gate = FeeGate::new(
        Duration::from_millis(settings.deployer.poll_interval_ms),
        settings.deployer.max_fee_sample_failures,
    );

    let plan = launch::launch_plan(&settings.launch, settings.chain.live);
    info!(steps = plan.len(), "deployment plan constructed");

    let ceiling = settings.fees.ceiling();
    let mut orchestrator =
        Orchestrator::new(chain, registry, nonce, fee_gate, settings.fees.params());

    // The fee gate waits indefinitely by design; the shutdown signal is the
    // external cancellation path. An interrupted step is left un-submitted
    // and un-recorded, safe to retry on the next run.
    let records = tokio::select! {
        result = orchestrator.execute(plan, &ceiling) => result?,
        _ = shutdown_signal() => {
            warn!("interrupted; current step left un-submitted, safe to re-run");
            return Ok(());
        }
    };

    for (name, record) in &records {
        info!(step = %name, address = %record.address, "deployed contract");
    }
    info!("deployment complete: {} contracts", records.len());

    Ok(())
}

fn load_wallet(config: &WalletConfig) -> DeployerResult<LocalWallet> {
    let var = config
        .private_key_env
        .as_deref()
        .unwrap_or("DEPLOYER_PRIVATE_KEY");
    let key = std::env::var(var)
        .map_err(|_| DeployerError::Wallet(format!("environment variable {var} is not set")))?;
    key.parse::<LocalWallet>()
        .map_err(|e| DeployerError::Wallet(format!("invalid private key: {e}")))
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,genesis_deployer=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
