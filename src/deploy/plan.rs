//! Deployment plans: ordered steps with explicit dependency references

use ethers::abi::Token;
use ethers::types::{Address, U256};

/// A constructor argument value.
///
/// All quantities are integers in the chain's smallest denomination; no
/// floating point is permitted anywhere in argument construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Address(Address),
    Uint(U256),
    UintArray(Vec<U256>),
    Text(String),
}

impl ArgValue {
    pub fn to_token(&self) -> Token {
        match self {
            ArgValue::Address(addr) => Token::Address(*addr),
            ArgValue::Uint(value) => Token::Uint(*value),
            ArgValue::UintArray(values) => {
                Token::Array(values.iter().map(|v| Token::Uint(*v)).collect())
            }
            ArgValue::Text(text) => Token::String(text.clone()),
        }
    }
}

/// A constructor argument: either a literal value or a reference to the
/// address produced by another step (or by a pre-seeded registry record).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructorArg {
    Literal(ArgValue),
    Dependency(String),
}

/// One contract to deploy. Immutable once the plan is built.
#[derive(Debug, Clone)]
pub struct DeploymentStep {
    /// Unique key for this step, used for registry records and references.
    pub name: String,
    /// Artifact name of the contract to deploy.
    pub contract: String,
    pub args: Vec<ConstructorArg>,
    /// Skip this step when the registry already holds a record for it.
    pub skip_if_deployed: bool,
}

impl DeploymentStep {
    pub fn new(name: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract: contract.into(),
            args: Vec::new(),
            skip_if_deployed: true,
        }
    }

    /// Append a literal constructor argument.
    pub fn arg(mut self, value: ArgValue) -> Self {
        self.args.push(ConstructorArg::Literal(value));
        self
    }

    /// Append a constructor argument resolved to another step's address.
    pub fn dependency(mut self, name: impl Into<String>) -> Self {
        self.args.push(ConstructorArg::Dependency(name.into()));
        self
    }

    /// Force redeployment even when a registry record exists. The registry
    /// will still reject a result whose address differs from the record.
    pub fn redeploy(mut self) -> Self {
        self.skip_if_deployed = false;
        self
    }

    /// Names of the steps this step's arguments reference.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            ConstructorArg::Dependency(name) => Some(name.as_str()),
            ConstructorArg::Literal(_) => None,
        })
    }
}

/// The ordered sequence of deployment steps for one execution.
#[derive(Debug, Clone, Default)]
pub struct DeploymentPlan {
    steps: Vec<DeploymentStep>,
}

impl DeploymentPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: DeploymentStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
