//! Error types for the genesis deployer

use ethers::types::Address;
use thiserror::Error;

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("chain error: {0}")]
    Chain(String),

    #[error("fee sampling failed after {attempts} consecutive errors: {message}")]
    FeeSampling { attempts: u32, message: String },

    #[error("unresolved dependency `{dependency}` in step `{step}`")]
    UnresolvedDependency { step: String, dependency: String },

    #[error("registry conflict for `{name}`: recorded {recorded}, attempted {attempted}")]
    RegistryConflict {
        name: String,
        recorded: Address,
        attempted: Address,
    },

    #[error("step `{name}` failed: {cause}")]
    StepFailed { name: String, cause: String },
}

impl DeployerError {
    /// Check if a failed run can be retried from the top.
    ///
    /// A failed step is safe to retry: completed steps are recorded in the
    /// registry and skipped on the next run. Everything else signals corrupt
    /// state or a changed plan and needs operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeployerError::StepFailed { .. })
    }
}

/// Result type for deployer operations
pub type DeployerResult<T> = Result<T, DeployerError>;
