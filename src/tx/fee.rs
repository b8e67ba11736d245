//! Fee-gated transaction admission
//!
//! Submission is deliberately held back until the observed network fee
//! drops below a configured ceiling. The wait is unbounded by design;
//! callers that need bounded waiting wrap `await_admission` in an external
//! cancellation signal (the binary uses `tokio::select!` with the shutdown
//! handler).

use ethers::types::U256;
use std::time::Duration;
use tracing::{debug, warn};

use crate::chain::{ChainClient, FeeMetric};
use crate::error::{DeployerError, DeployerResult};

/// Maximum acceptable fee metric at which a transaction may be submitted.
#[derive(Debug, Clone, Copy)]
pub struct FeeCeiling {
    pub max_base_fee: U256,
    /// Optional cap on the priority fee; `None` leaves it unbounded.
    pub max_priority_fee: Option<U256>,
}

impl FeeCeiling {
    pub fn admits(&self, metric: &FeeMetric) -> bool {
        metric.base_fee <= self.max_base_fee
            && self
                .max_priority_fee
                .map_or(true, |cap| metric.priority_fee <= cap)
    }
}

/// Admission-control gate polling the network fee metric.
pub struct FeeGate {
    poll_interval: Duration,
    /// Consecutive sampling failures tolerated before the run aborts.
    max_sample_failures: u32,
}

impl FeeGate {
    pub fn new(poll_interval: Duration, max_sample_failures: u32) -> Self {
        Self {
            poll_interval,
            max_sample_failures,
        }
    }

    /// Suspend until the sampled fee metric satisfies `ceiling`.
    ///
    /// Sampling errors are transient: they are retried on the same polling
    /// interval until `max_sample_failures` consecutive failures, after
    /// which the run aborts with `FeeSampling`. A successful sample resets
    /// the failure count. No side effects beyond sampling.
    pub async fn await_admission(
        &self,
        chain: &dyn ChainClient,
        ceiling: &FeeCeiling,
    ) -> DeployerResult<FeeMetric> {
        let mut failures = 0u32;

        loop {
            match chain.fee_metric().await {
                Ok(metric) => {
                    failures = 0;
                    if ceiling.admits(&metric) {
                        debug!(base_fee = %metric.base_fee, "fee ceiling satisfied, admitting");
                        return Ok(metric);
                    }
                    debug!(
                        base_fee = %metric.base_fee,
                        ceiling = %ceiling.max_base_fee,
                        "fee above ceiling, waiting"
                    );
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.max_sample_failures {
                        return Err(DeployerError::FeeSampling {
                            attempts: failures,
                            message: e.to_string(),
                        });
                    }
                    warn!(attempt = failures, error = %e, "fee sample failed, retrying");
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{gwei, FakeChain};

    fn ceiling(max_base_gwei: u64) -> FeeCeiling {
        FeeCeiling {
            max_base_fee: gwei(max_base_gwei),
            max_priority_fee: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_on_first_sample_at_or_below_ceiling() {
        let chain = FakeChain::with_tx_count(0);
        chain.script_fees(&[40, 35, 28, 20]);
        let gate = FeeGate::new(Duration::from_secs(10), 3);

        let metric = gate.await_admission(&chain, &ceiling(30)).await.unwrap();
        assert_eq!(metric.base_fee, gwei(28));
        assert_eq!(chain.fee_samples_taken(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_admits_above_ceiling() {
        let chain = FakeChain::with_tx_count(0);
        chain.script_fees(&[31, 30]);
        let gate = FeeGate::new(Duration::from_secs(10), 3);

        let metric = gate.await_admission(&chain, &ceiling(30)).await.unwrap();
        // 31 gwei was rejected; admission happened on the exact-ceiling sample.
        assert_eq!(metric.base_fee, gwei(30));
        assert_eq!(chain.fee_samples_taken(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_fee_cap_holds_admission() {
        let chain = FakeChain::with_tx_count(0);
        // Base fee is fine throughout; priority fee starts high.
        chain.script_fees_with_priority(&[(10, 5), (10, 1)]);
        let gate = FeeGate::new(Duration::from_secs(10), 3);

        let ceiling = FeeCeiling {
            max_base_fee: gwei(30),
            max_priority_fee: Some(gwei(2)),
        };
        let metric = gate.await_admission(&chain, &ceiling).await.unwrap();
        assert_eq!(metric.priority_fee, gwei(1));
        assert_eq!(chain.fee_samples_taken(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_sample_errors_are_retried() {
        let chain = FakeChain::with_tx_count(0);
        chain.script_fee_errors(&["rpc unreachable", "rpc unreachable"]);
        chain.script_fees(&[20]);
        let gate = FeeGate::new(Duration::from_secs(10), 3);

        let metric = gate.await_admission(&chain, &ceiling(30)).await.unwrap();
        assert_eq!(metric.base_fee, gwei(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_failures_exhaust_retries() {
        let chain = FakeChain::with_tx_count(0);
        chain.script_fee_errors(&["down", "down", "down"]);
        let gate = FeeGate::new(Duration::from_secs(10), 3);

        let err = gate.await_admission(&chain, &ceiling(30)).await.unwrap_err();
        assert!(matches!(
            err,
            DeployerError::FeeSampling { attempts: 3, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_sample_resets_failure_count() {
        let chain = FakeChain::with_tx_count(0);
        // failure, high sample, failure, failure, admit: never three in a row.
        chain.script_fee_errors(&["down"]);
        chain.script_fees(&[40]);
        chain.script_fee_errors(&["down", "down"]);
        chain.script_fees(&[20]);
        let gate = FeeGate::new(Duration::from_secs(10), 3);

        let metric = gate.await_admission(&chain, &ceiling(30)).await.unwrap();
        assert_eq!(metric.base_fee, gwei(20));
    }
}
