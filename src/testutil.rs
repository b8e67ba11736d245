//! Test doubles shared by the deployment core's unit tests

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::chain::{ChainClient, Deployed, FeeMetric, FeeParams};
use crate::deploy::ArgValue;
use crate::error::{DeployerError, DeployerResult};

pub fn gwei(value: u64) -> U256 {
    U256::from(value) * U256::exp10(9)
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub contract: String,
    pub args: Vec<ArgValue>,
    pub nonce: u64,
}

/// Scriptable in-memory chain.
///
/// Fee samples are served from a queue in the order they were scripted;
/// once the queue drains, the chain reports a quiet 1 gwei base fee.
pub struct FakeChain {
    tx_count: AtomicU64,
    fee_script: Mutex<VecDeque<Result<FeeMetric, String>>>,
    samples_taken: AtomicU32,
    submissions: Mutex<Vec<Submission>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeChain {
    pub fn with_tx_count(count: u64) -> Self {
        Self {
            tx_count: AtomicU64::new(count),
            fee_script: Mutex::new(VecDeque::new()),
            samples_taken: AtomicU32::new(0),
            submissions: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_tx_count(&self, count: u64) {
        self.tx_count.store(count, Ordering::SeqCst);
    }

    pub fn script_fees(&self, base_gwei: &[u64]) {
        let mut script = self.fee_script.lock().unwrap();
        for &base in base_gwei {
            script.push_back(Ok(FeeMetric {
                base_fee: gwei(base),
                priority_fee: gwei(1),
            }));
        }
    }

    pub fn script_fees_with_priority(&self, samples: &[(u64, u64)]) {
        let mut script = self.fee_script.lock().unwrap();
        for &(base, priority) in samples {
            script.push_back(Ok(FeeMetric {
                base_fee: gwei(base),
                priority_fee: gwei(priority),
            }));
        }
    }

    pub fn script_fee_errors(&self, messages: &[&str]) {
        let mut script = self.fee_script.lock().unwrap();
        for message in messages {
            script.push_back(Err(message.to_string()));
        }
    }

    pub fn fee_samples_taken(&self) -> u32 {
        self.samples_taken.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn fail_contract(&self, contract: &str) {
        self.failing.lock().unwrap().insert(contract.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn transaction_count(&self, _identity: Address) -> DeployerResult<u64> {
        Ok(self.tx_count.load(Ordering::SeqCst))
    }

    async fn fee_metric(&self) -> DeployerResult<FeeMetric> {
        self.samples_taken.fetch_add(1, Ordering::SeqCst);
        match self.fee_script.lock().unwrap().pop_front() {
            Some(Ok(metric)) => Ok(metric),
            Some(Err(message)) => Err(DeployerError::Chain(message)),
            None => Ok(FeeMetric {
                base_fee: gwei(1),
                priority_fee: gwei(1),
            }),
        }
    }

    async fn send_deployment(
        &self,
        contract: &str,
        args: &[ArgValue],
        nonce: u64,
        _fees: &FeeParams,
    ) -> DeployerResult<Deployed> {
        if self.failing.lock().unwrap().contains(contract) {
            return Err(DeployerError::Chain(format!(
                "transaction for {contract} rejected"
            )));
        }

        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(Submission {
            contract: contract.to_string(),
            args: args.to_vec(),
            nonce,
        });
        let sequence = submissions.len() as u64;

        Ok(Deployed {
            address: Address::from_low_u64_be(0xA000_0000 + sequence),
            tx_hash: H256::from_low_u64_be(sequence),
            abi: json!([]),
        })
    }
}
