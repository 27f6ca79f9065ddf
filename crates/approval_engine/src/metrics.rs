//! Metrics recording abstraction for approval resets and policy evaluation.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

/// Abstraction for recording engine metrics.
///
/// Implementations must be thread-safe; one instance is shared by every
/// engine handle of a process.
pub trait ResetMetrics: Send + Sync {
    /// Records the outcome of one merge request (`retained`, `partially_reset`,
    /// `fully_reset`, `skipped`, `deferred`, or `failed`).
    fn record_outcome(&self, outcome: &str);

    /// Records approvals deleted by a reset.
    fn record_approvals_removed(&self, count: u64);

    /// Records one license policy evaluation.
    fn record_policy_evaluation(&self, violated: bool);
}

/// Prometheus metrics collector.
///
/// # Metrics
/// - `approval_reset_merge_requests_total{outcome}` (Counter)
/// - `approval_reset_approvals_removed_total` (Counter)
/// - `license_policy_evaluations_total{result}` (Counter)
pub struct PrometheusResetMetrics {
    outcomes: IntCounterVec,
    approvals_removed: IntCounter,
    policy_evaluations: IntCounterVec,
}

impl PrometheusResetMetrics {
    /// Creates the collectors and registers them with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name is already registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let outcomes = IntCounterVec::new(
            Opts::new(
                "approval_reset_merge_requests_total",
                "Merge requests processed by approval resets, by outcome",
            ),
            &["outcome"],
        )?;
        let approvals_removed = IntCounter::new(
            "approval_reset_approvals_removed_total",
            "Approvals deleted by approval resets",
        )?;
        let policy_evaluations = IntCounterVec::new(
            Opts::new(
                "license_policy_evaluations_total",
                "License policy evaluations, by result",
            ),
            &["result"],
        )?;

        registry.register(Box::new(outcomes.clone()))?;
        registry.register(Box::new(approvals_removed.clone()))?;
        registry.register(Box::new(policy_evaluations.clone()))?;

        Ok(Self {
            outcomes,
            approvals_removed,
            policy_evaluations,
        })
    }
}

impl ResetMetrics for PrometheusResetMetrics {
    fn record_outcome(&self, outcome: &str) {
        self.outcomes.with_label_values(&[outcome]).inc();
    }

    fn record_approvals_removed(&self, count: u64) {
        self.approvals_removed.inc_by(count);
    }

    fn record_policy_evaluation(&self, violated: bool) {
        let result = if violated { "violated" } else { "not_violated" };
        self.policy_evaluations.with_label_values(&[result]).inc();
    }
}

/// No-op metrics implementation for testing or when metrics are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpResetMetrics;

impl NoOpResetMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl ResetMetrics for NoOpResetMetrics {
    fn record_outcome(&self, _outcome: &str) {}
    fn record_approvals_removed(&self, _count: u64) {}
    fn record_policy_evaluation(&self, _violated: bool) {}
}
