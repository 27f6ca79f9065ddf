//! Scan result policy snapshots.
//!
//! A [`ScanResultPolicyRead`] is the materialized, queryable form of one
//! license-finding rule of a security policy. The approval engine only reads
//! these; they are refreshed whenever the policy configuration is synced.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ConfigurationError, ConfigurationResult};

#[cfg(test)]
#[path = "scan_result_policy_tests.rs"]
mod tests;

/// Identifier of a materialized scan result policy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScanResultPolicyId(u64);

impl ScanResultPolicyId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ScanResultPolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which license findings a rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseState {
    /// Licenses absent from the target branch baseline.
    NewlyDetected,

    /// Licenses already present on the target branch.
    Detected,
}

/// One license entry configured on a policy.
///
/// Entries may be identified by SPDX identifier, by display name, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareLicensePolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spdx_identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SoftwareLicensePolicy {
    /// Creates an entry identified by SPDX identifier only.
    pub fn spdx(identifier: impl Into<String>) -> Self {
        Self {
            spdx_identifier: Some(identifier.into()),
            name: None,
        }
    }

    /// Creates an entry identified by display name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            spdx_identifier: None,
            name: Some(name.into()),
        }
    }
}

/// Materialized license-finding rule of a scan result policy.
///
/// # Example TOML
///
/// ```toml
/// id = 7
/// license_states = ["newly_detected", "detected"]
/// match_on_inclusion = true
/// approvals_required = 2
///
/// [[license_policies]]
/// spdx_identifier = "GPL-3.0"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResultPolicyRead {
    pub id: ScanResultPolicyId,

    /// License states the rule applies to.
    #[serde(default)]
    pub license_states: Vec<LicenseState>,

    /// `true`: the configured licenses are denied.
    /// `false`: the configured licenses are the only ones allowed.
    #[serde(default = "default_match_on_inclusion")]
    pub match_on_inclusion: bool,

    /// Approvals the policy demands while violated.
    #[serde(default = "default_approvals_required")]
    pub approvals_required: u32,

    /// Licenses named by the policy.
    #[serde(default)]
    pub license_policies: Vec<SoftwareLicensePolicy>,
}

fn default_match_on_inclusion() -> bool {
    true
}

fn default_approvals_required() -> u32 {
    1
}

impl ScanResultPolicyRead {
    /// Whether `newly_detected` is among the license states.
    pub fn newly_detected(&self) -> bool {
        self.license_states.contains(&LicenseState::NewlyDetected)
    }

    /// Whether the rule is scoped to newly detected licenses and nothing else.
    pub fn only_newly_detected(&self) -> bool {
        !self.license_states.is_empty()
            && self
                .license_states
                .iter()
                .all(|state| *state == LicenseState::NewlyDetected)
    }

    /// SPDX identifiers and names configured on the policy, as one set.
    pub fn license_names(&self) -> BTreeSet<String> {
        self.license_policies
            .iter()
            .flat_map(|policy| {
                policy
                    .spdx_identifier
                    .iter()
                    .chain(policy.name.iter())
                    .cloned()
            })
            .collect()
    }

    /// Checks that the snapshot has everything evaluation needs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidConfiguration` when:
    /// - `license_states` is empty
    /// - `match_on_inclusion` is set but no licenses are configured
    /// - a license entry has neither SPDX identifier nor name
    pub fn validate(&self) -> ConfigurationResult<()> {
        if self.license_states.is_empty() {
            return Err(ConfigurationError::invalid(
                format!("scan_result_policies[{}].license_states", self.id),
                "at least one license state is required",
            ));
        }

        if self.match_on_inclusion && self.license_policies.is_empty() {
            return Err(ConfigurationError::invalid(
                format!("scan_result_policies[{}].license_policies", self.id),
                "a denied license list is required when match_on_inclusion is true",
            ));
        }

        if self
            .license_policies
            .iter()
            .any(|p| p.spdx_identifier.is_none() && p.name.is_none())
        {
            return Err(ConfigurationError::invalid(
                format!("scan_result_policies[{}].license_policies", self.id),
                "each license needs an spdx_identifier or a name",
            ));
        }

        Ok(())
    }
}
