//! Dependency-ordered execution of a deployment plan

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::plan::{ArgValue, ConstructorArg, DeploymentPlan, DeploymentStep};
use super::registry::{DeploymentRecord, DeploymentRegistry};
use crate::chain::{ChainClient, FeeParams};
use crate::error::{DeployerError, DeployerResult};
use crate::tx::{FeeCeiling, FeeGate, NonceManager};

/// Executes a deployment plan strictly in order, one step at a time.
///
/// Steps never overlap: later steps consume addresses produced by earlier
/// ones, and nonce allocation must be strictly ordered for the identity.
/// The only suspension points are the fee gate's polling wait and the
/// submission call; both are cancellable from outside, leaving the current
/// step un-submitted and safe to retry.
pub struct Orchestrator {
    chain: Arc<dyn ChainClient>,
    registry: DeploymentRegistry,
    nonce: NonceManager,
    fee_gate: FeeGate,
    fee_params: FeeParams,
}

impl Orchestrator {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        registry: DeploymentRegistry,
        nonce: NonceManager,
        fee_gate: FeeGate,
        fee_params: FeeParams,
    ) -> Self {
        Self {
            chain,
            registry,
            nonce,
            fee_gate,
            fee_params,
        }
    }

    /// Execute every step of `plan`, returning the final name-to-record
    /// mapping (skipped steps included, unchanged).
    ///
    /// A submission failure aborts the remaining plan with `StepFailed`;
    /// steps recorded before the failure stay valid and are skipped when
    /// the same plan is executed again.
    pub async fn execute(
        &mut self,
        plan: DeploymentPlan,
        ceiling: &FeeCeiling,
    ) -> DeployerResult<BTreeMap<String, DeploymentRecord>> {
        self.validate(&plan).await?;

        // External transactions may have advanced the identity's count
        // since nonce initialization; never allocate below it.
        let observed = self
            .chain
            .transaction_count(self.nonce.identity())
            .await?;
        self.nonce.reconcile(observed);

        let mut results = BTreeMap::new();

        for step in plan.steps() {
            if let Some(existing) = self.registry.get(&step.name).await? {
                if step.skip_if_deployed {
                    info!(
                        step = %step.name,
                        address = %existing.address,
                        "already deployed, skipping"
                    );
                    results.insert(step.name.clone(), existing);
                    continue;
                }
            }

            let record = self.deploy_step(step, &results, ceiling).await?;
            results.insert(step.name.clone(), record);
        }

        Ok(results)
    }

    /// Validate every dependency reference over the whole plan before any
    /// chain interaction. The DAG property is static: a reference must name
    /// an earlier step or a record already in the registry.
    async fn validate(&self, plan: &DeploymentPlan) -> DeployerResult<()> {
        let mut earlier: HashSet<&str> = HashSet::new();

        for step in plan.steps() {
            if earlier.contains(step.name.as_str()) {
                return Err(DeployerError::Config(format!(
                    "duplicate step name `{}`",
                    step.name
                )));
            }

            for dep in step.dependencies() {
                if earlier.contains(dep) {
                    continue;
                }
                if self.registry.get(dep).await?.is_some() {
                    continue;
                }
                return Err(DeployerError::UnresolvedDependency {
                    step: step.name.clone(),
                    dependency: dep.to_string(),
                });
            }

            earlier.insert(&step.name);
        }

        debug!(steps = plan.len(), "plan dependencies validated");
        Ok(())
    }

    async fn deploy_step(
        &mut self,
        step: &DeploymentStep,
        results: &BTreeMap<String, DeploymentRecord>,
        ceiling: &FeeCeiling,
    ) -> DeployerResult<DeploymentRecord> {
        let args = self.resolve_args(step, results).await?;
        let nonce = self.nonce.allocate();

        let metric = self.fee_gate.await_admission(self.chain.as_ref(), ceiling).await?;
        debug!(
            step = %step.name,
            nonce,
            base_fee = %metric.base_fee,
            "admitted for submission"
        );

        let deployed = self
            .chain
            .send_deployment(&step.contract, &args, nonce, &self.fee_params)
            .await
            .map_err(|e| DeployerError::StepFailed {
                name: step.name.clone(),
                cause: e.to_string(),
            })?;

        let record = DeploymentRecord::new(step.contract.clone(), deployed.address, deployed.abi)
            .with_tx_hash(deployed.tx_hash);
        self.registry.put(&step.name, &record).await?;

        info!(
            step = %step.name,
            address = %record.address,
            nonce,
            "deployed"
        );
        Ok(record)
    }

    /// Substitute dependency references with the referenced step's recorded
    /// address, verbatim. Results from the current execution take priority;
    /// anything else must already be in the registry.
    async fn resolve_args(
        &self,
        step: &DeploymentStep,
        results: &BTreeMap<String, DeploymentRecord>,
    ) -> DeployerResult<Vec<ArgValue>> {
        let mut resolved = Vec::with_capacity(step.args.len());

        for arg in &step.args {
            match arg {
                ConstructorArg::Literal(value) => resolved.push(value.clone()),
                ConstructorArg::Dependency(dep) => {
                    let address = match results.get(dep) {
                        Some(record) => record.address,
                        None => {
                            self.registry
                                .get(dep)
                                .await?
                                .ok_or_else(|| DeployerError::UnresolvedDependency {
                                    step: step.name.clone(),
                                    dependency: dep.clone(),
                                })?
                                .address
                        }
                    };
                    resolved.push(ArgValue::Address(address));
                }
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testutil::{gwei, FakeChain};
    use ethers::types::{Address, U256};
    use serde_json::json;
    use std::time::Duration;

    fn identity() -> Address {
        Address::repeat_byte(0xAA)
    }

    fn high_ceiling() -> FeeCeiling {
        FeeCeiling {
            max_base_fee: gwei(1_000),
            max_priority_fee: None,
        }
    }

    fn fee_params() -> FeeParams {
        FeeParams {
            max_fee_per_gas: gwei(25),
            max_priority_fee_per_gas: gwei(1),
        }
    }

    async fn orchestrator(
        chain: Arc<FakeChain>,
        store: Arc<MemoryStore>,
    ) -> Orchestrator {
        let nonce = NonceManager::initialize(store.as_ref(), chain.as_ref(), identity())
            .await
            .unwrap();
        Orchestrator::new(
            chain,
            DeploymentRegistry::new(store),
            nonce,
            FeeGate::new(Duration::from_millis(1), 3),
            fee_params(),
        )
    }

    fn three_step_plan() -> DeploymentPlan {
        let mut plan = DeploymentPlan::new();
        plan.push(
            DeploymentStep::new("one", "TokenA").arg(ArgValue::Text("A".to_string())),
        );
        plan.push(DeploymentStep::new("two", "TokenB").dependency("one"));
        plan.push(
            DeploymentStep::new("three", "TokenC")
                .dependency("one")
                .dependency("two")
                .arg(ArgValue::Uint(U256::from(7u64))),
        );
        plan
    }

    #[tokio::test]
    async fn test_executes_in_plan_order_with_sequential_nonces() {
        let chain = Arc::new(FakeChain::with_tx_count(5));
        let store = Arc::new(MemoryStore::new());
        let mut orch = orchestrator(chain.clone(), store).await;

        let records = orch.execute(three_step_plan(), &high_ceiling()).await.unwrap();
        assert_eq!(records.len(), 3);

        let submitted = chain.submissions();
        let order: Vec<_> = submitted.iter().map(|s| s.contract.clone()).collect();
        assert_eq!(order, vec!["TokenA", "TokenB", "TokenC"]);
        let nonces: Vec<_> = submitted.iter().map(|s| s.nonce).collect();
        assert_eq!(nonces, vec![5, 6, 7]);
    }

    #[tokio::test]
    async fn test_dependency_addresses_substituted_verbatim() {
        let chain = Arc::new(FakeChain::with_tx_count(0));
        let store = Arc::new(MemoryStore::new());
        let mut orch = orchestrator(chain.clone(), store).await;

        let records = orch.execute(three_step_plan(), &high_ceiling()).await.unwrap();

        let one = records["one"].address;
        let two = records["two"].address;
        let submitted = chain.submissions();
        assert_eq!(submitted[1].args, vec![ArgValue::Address(one)]);
        assert_eq!(
            submitted[2].args,
            vec![
                ArgValue::Address(one),
                ArgValue::Address(two),
                ArgValue::Uint(U256::from(7u64)),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let chain = Arc::new(FakeChain::with_tx_count(0));
        let store = Arc::new(MemoryStore::new());

        let mut orch = orchestrator(chain.clone(), store.clone()).await;
        let first = orch.execute(three_step_plan(), &high_ceiling()).await.unwrap();
        assert_eq!(chain.submissions().len(), 3);

        let mut orch = orchestrator(chain.clone(), store).await;
        let second = orch.execute(three_step_plan(), &high_ceiling()).await.unwrap();

        assert_eq!(first, second);
        // No new transactions on the second run.
        assert_eq!(chain.submissions().len(), 3);
    }

    #[tokio::test]
    async fn test_partial_failure_recovery() {
        let chain = Arc::new(FakeChain::with_tx_count(7));
        chain.fail_contract("TokenB");
        let store = Arc::new(MemoryStore::new());

        let mut orch = orchestrator(chain.clone(), store.clone()).await;
        let err = orch
            .execute(three_step_plan(), &high_ceiling())
            .await
            .unwrap_err();
        match &err {
            DeployerError::StepFailed { name, .. } => assert_eq!(name, "two"),
            other => panic!("expected StepFailed, got {other:?}"),
        }
        assert!(err.is_retryable());
        // Step one was recorded before the failure.
        assert_eq!(chain.submissions().len(), 1);

        // Step one's transaction mined, so the chain count advanced.
        chain.set_tx_count(8);
        chain.clear_failures();

        let mut orch = orchestrator(chain.clone(), store).await;
        let records = orch.execute(three_step_plan(), &high_ceiling()).await.unwrap();
        assert_eq!(records.len(), 3);

        let submitted = chain.submissions();
        // Step one was not resubmitted; steps two and three picked up
        // nonces from the reconciled chain count.
        let replayed: Vec<_> = submitted[1..].iter().map(|s| s.contract.clone()).collect();
        assert_eq!(replayed, vec!["TokenB", "TokenC"]);
        assert_eq!(submitted[1].nonce, 8);
        assert_eq!(submitted[2].nonce, 9);
    }

    #[tokio::test]
    async fn test_unknown_dependency_fails_before_any_chain_interaction() {
        let chain = Arc::new(FakeChain::with_tx_count(0));
        let store = Arc::new(MemoryStore::new());
        let mut orch = orchestrator(chain.clone(), store).await;

        let mut plan = DeploymentPlan::new();
        plan.push(DeploymentStep::new("a", "TokenA").dependency("missing"));

        let err = orch.execute(plan, &high_ceiling()).await.unwrap_err();
        assert!(matches!(
            err,
            DeployerError::UnresolvedDependency { ref dependency, .. } if dependency == "missing"
        ));
        assert!(chain.submissions().is_empty());
        assert_eq!(chain.fee_samples_taken(), 0);
    }

    #[tokio::test]
    async fn test_forward_reference_is_rejected() {
        let chain = Arc::new(FakeChain::with_tx_count(0));
        let store = Arc::new(MemoryStore::new());
        let mut orch = orchestrator(chain.clone(), store).await;

        let mut plan = DeploymentPlan::new();
        plan.push(DeploymentStep::new("a", "TokenA").dependency("b"));
        plan.push(DeploymentStep::new("b", "TokenB"));

        let err = orch.execute(plan, &high_ceiling()).await.unwrap_err();
        assert!(matches!(
            err,
            DeployerError::UnresolvedDependency { ref step, .. } if step == "a"
        ));
        assert!(chain.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_pre_seeded_registry_record_satisfies_dependency() {
        let chain = Arc::new(FakeChain::with_tx_count(0));
        let store = Arc::new(MemoryStore::new());
        let registry = DeploymentRegistry::new(store.clone());
        let multisig = Address::repeat_byte(0x99);
        registry
            .put(
                "multisig",
                &DeploymentRecord::new("Multisig", multisig, json!([])),
            )
            .await
            .unwrap();

        let mut orch = orchestrator(chain.clone(), store).await;
        let mut plan = DeploymentPlan::new();
        plan.push(DeploymentStep::new("token", "TokenA").dependency("multisig"));

        let records = orch.execute(plan, &high_ceiling()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            chain.submissions()[0].args,
            vec![ArgValue::Address(multisig)]
        );
    }

    #[tokio::test]
    async fn test_recorded_step_is_returned_unchanged_without_submission() {
        let chain = Arc::new(FakeChain::with_tx_count(3));
        let store = Arc::new(MemoryStore::new());
        let registry = DeploymentRegistry::new(store.clone());
        let existing = DeploymentRecord::new("TokenA", Address::repeat_byte(0x42), json!([]));
        registry.put("one", &existing).await.unwrap();

        let mut orch = orchestrator(chain.clone(), store).await;
        let mut plan = DeploymentPlan::new();
        plan.push(DeploymentStep::new("one", "TokenA"));

        let records = orch.execute(plan, &high_ceiling()).await.unwrap();
        assert_eq!(records["one"], existing);
        assert!(chain.submissions().is_empty());
        // Skipped steps allocate no nonce: a later fresh step would still
        // get the first chain nonce.
        assert_eq!(chain.fee_samples_taken(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_step_names_are_rejected() {
        let chain = Arc::new(FakeChain::with_tx_count(0));
        let store = Arc::new(MemoryStore::new());
        let mut orch = orchestrator(chain.clone(), store).await;

        let mut plan = DeploymentPlan::new();
        plan.push(DeploymentStep::new("one", "TokenA"));
        plan.push(DeploymentStep::new("one", "TokenB"));

        let err = orch.execute(plan, &high_ceiling()).await.unwrap_err();
        assert!(matches!(err, DeployerError::Config(_)));
    }
}
