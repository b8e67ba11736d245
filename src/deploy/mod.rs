//! Deployment orchestration core
//!
//! The orchestrator:
//! 1. Validates the plan's dependency references up front
//! 2. Skips steps already recorded in the registry
//! 3. Substitutes dependency addresses into constructor arguments
//! 4. Allocates nonces and gates submission on the fee ceiling
//! 5. Records each deployment so a crashed run resumes where it stopped

pub mod orchestrator;
pub mod plan;
pub mod registry;

pub use orchestrator::Orchestrator;
pub use plan::{ArgValue, ConstructorArg, DeploymentPlan, DeploymentStep};
pub use registry::{DeploymentRecord, DeploymentRegistry};
