//! License finding evaluation of scan result policies.
//!
//! A policy is evaluated against the license report of the merge request's
//! head pipeline (the *current* report) and the report of the target branch.
//!
//! Which licenses are checked depends on the policy's license states:
//!
//! | states                         | checked licenses                         |
//! |--------------------------------|------------------------------------------|
//! | only `newly_detected`          | added relative to the target branch      |
//! | `newly_detected` and `detected`| every license in the current report      |
//! | only `detected`                | every license in the target branch report|
//!
//! With `match_on_inclusion` the policy lists denied licenses; without it the
//! policy lists the only allowed ones. Independently, when `newly_detected` is
//! set, a dependency introduced by the merge request that carries a denied
//! license is always a violation. License names and ids compare
//! case-insensitively.

use std::collections::BTreeSet;

use policy_config::ScanResultPolicyRead;
use repository_client::{License, LicenseScanReport};
use tracing::{debug, warn};

use crate::ApprovalEngineError;

#[cfg(test)]
#[path = "license_evaluator_tests.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyEvaluation {
    Violated,
    NotViolated,
}

impl PolicyEvaluation {
    pub fn is_violated(&self) -> bool {
        matches!(self, PolicyEvaluation::Violated)
    }
}

/// Evaluates one scan result policy.
///
/// Invalid policies are skipped as `NotViolated` after logging.
pub fn evaluate_license_policy(
    policy: &ScanResultPolicyRead,
    current: &LicenseScanReport,
    target: &LicenseScanReport,
) -> PolicyEvaluation {
    if let Err(e) = policy.validate() {
        let err = ApprovalEngineError::InvalidPolicyConfiguration {
            policy_id: policy.id.value(),
            reason: e.to_string(),
        };
        warn!(policy_id = policy.id.value(), error = %err, "Skipping license policy");
        return PolicyEvaluation::NotViolated;
    }

    let checked = licenses_to_check(policy, current, target);
    let policy_licenses = lowercase(policy.license_names());

    let (denied, violates_license_policy) = if policy.match_on_inclusion {
        let violates = !checked.is_disjoint(&policy_licenses);
        (policy_licenses, violates)
    } else {
        let report_licenses = license_keys(current.licenses().iter());
        let denied: BTreeSet<String> =
            report_licenses.difference(&policy_licenses).cloned().collect();
        let violates = checked.difference(&policy_licenses).next().is_some();
        (denied, violates)
    };

    if policy.newly_detected() && new_dependency_with_denied_license(current, target, &denied) {
        debug!(policy_id = policy.id.value(), "New dependency carries a denied license");
        return PolicyEvaluation::Violated;
    }

    if violates_license_policy {
        PolicyEvaluation::Violated
    } else {
        PolicyEvaluation::NotViolated
    }
}

/// Lowercased ids and names of the licenses the policy's states select.
fn licenses_to_check(
    policy: &ScanResultPolicyRead,
    current: &LicenseScanReport,
    target: &LicenseScanReport,
) -> BTreeSet<String> {
    if policy.only_newly_detected() {
        let diff = target.diff_with(current);
        license_keys(diff.added.iter())
    } else if policy.newly_detected() {
        license_keys(current.licenses().iter())
    } else {
        license_keys(target.licenses().iter())
    }
}

fn new_dependency_with_denied_license(
    current: &LicenseScanReport,
    target: &LicenseScanReport,
    denied: &BTreeSet<String>,
) -> bool {
    let existing = target.dependency_names();

    current
        .licenses()
        .iter()
        .filter(|license| is_denied(license, denied))
        .flat_map(|license| license.dependencies.iter())
        .any(|dependency| !existing.contains(&dependency.name))
}

fn is_denied(license: &License, denied: &BTreeSet<String>) -> bool {
    denied.contains(&license.name.to_lowercase())
        || license
            .id
            .as_ref()
            .is_some_and(|id| denied.contains(&id.to_lowercase()))
}

fn license_keys<'a>(licenses: impl Iterator<Item = &'a License>) -> BTreeSet<String> {
    licenses
        .flat_map(|license| license.id.iter().chain(std::iter::once(&license.name)))
        .map(|key| key.to_lowercase())
        .collect()
}

fn lowercase(values: BTreeSet<String>) -> BTreeSet<String> {
    values.into_iter().map(|v| v.to_lowercase()).collect()
}
