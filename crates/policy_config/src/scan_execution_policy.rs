//! Scan execution policies.
//!
//! Scan execution policies force security scans to run in pipelines or on a
//! schedule. Evaluation is bounded: only the first [`POLICY_LIMIT`] enabled
//! policies of a project are ever considered, in the order they were defined.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "scan_execution_policy_tests.rs"]
mod tests;

/// Maximum number of active scan execution policies per project.
pub const POLICY_LIMIT: usize = 5;

/// Trigger type of a policy rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Pipeline,
    Schedule,
}

/// Branch category a rule can target instead of explicit branch names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchType {
    All,
    Protected,
    Default,
}

/// Security scan kinds a policy action can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Dast,
    SecretDetection,
    ClusterImageScanning,
    ContainerScanning,
    Sast,
    SastIac,
    DependencyScanning,
}

impl ScanType {
    pub const ALL: [ScanType; 7] = [
        ScanType::Dast,
        ScanType::SecretDetection,
        ScanType::ClusterImageScanning,
        ScanType::ContainerScanning,
        ScanType::Sast,
        ScanType::SastIac,
        ScanType::DependencyScanning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Dast => "dast",
            ScanType::SecretDetection => "secret_detection",
            ScanType::ClusterImageScanning => "cluster_image_scanning",
            ScanType::ContainerScanning => "container_scanning",
            ScanType::Sast => "sast",
            ScanType::SastIac => "sast_iac",
            ScanType::DependencyScanning => "dependency_scanning",
        }
    }

    /// Whether the scan can run as part of a pipeline.
    pub fn is_pipeline_scan(&self) -> bool {
        *self != ScanType::ClusterImageScanning
    }

    /// Whether the scan runs on demand against a deployed site.
    pub fn is_on_demand(&self) -> bool {
        *self == ScanType::Dast
    }
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `scan_type` names a known scan.
pub fn is_valid_scan_type(scan_type: &str) -> bool {
    ScanType::ALL.iter().any(|t| t.as_str() == scan_type)
}

/// A rule deciding when a policy applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    #[serde(rename = "type")]
    pub rule_type: RuleType,

    /// Branch names or wildcard patterns (`release/*`).
    #[serde(default)]
    pub branches: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_type: Option<BranchType>,

    /// Branch names excluded even when matched above.
    #[serde(default)]
    pub branch_exceptions: Vec<String>,

    /// Cron cadence for schedule rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence: Option<String>,
}

impl PolicyRule {
    /// A pipeline rule for explicit branch patterns.
    pub fn pipeline(branches: &[&str]) -> Self {
        Self {
            rule_type: RuleType::Pipeline,
            branches: branches.iter().map(|b| b.to_string()).collect(),
            branch_type: None,
            branch_exceptions: Vec::new(),
            cadence: None,
        }
    }

    /// A schedule rule running at `cadence` on explicit branches.
    pub fn schedule(cadence: &str, branches: &[&str]) -> Self {
        Self {
            rule_type: RuleType::Schedule,
            branches: branches.iter().map(|b| b.to_string()).collect(),
            branch_type: None,
            branch_exceptions: Vec::new(),
            cadence: Some(cadence.to_string()),
        }
    }
}

/// A scan requested by a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanAction {
    pub scan: ScanType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanner_profile: Option<String>,
}

impl ScanAction {
    pub fn new(scan: ScanType) -> Self {
        Self {
            scan,
            site_profile: None,
            scanner_profile: None,
        }
    }
}

/// A scan execution policy as configured in the policy project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanExecutionPolicy {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub rules: Vec<PolicyRule>,

    #[serde(default)]
    pub actions: Vec<ScanAction>,
}

impl ScanExecutionPolicy {
    /// Rules triggered by pipelines.
    pub fn pipeline_rules(&self) -> Vec<PolicyRule> {
        self.rules
            .iter()
            .filter(|rule| rule.rule_type == RuleType::Pipeline)
            .cloned()
            .collect()
    }

    pub fn has_pipeline_rule(&self) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.rule_type == RuleType::Pipeline)
    }
}

/// The scan execution policies of one project, in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanExecutionPolicySet {
    policies: Vec<ScanExecutionPolicy>,
}

impl ScanExecutionPolicySet {
    pub fn new(policies: Vec<ScanExecutionPolicy>) -> Self {
        Self { policies }
    }

    /// All configured policies, enabled or not.
    pub fn policies(&self) -> &[ScanExecutionPolicy] {
        &self.policies
    }

    /// Enabled policies, capped at [`POLICY_LIMIT`] in definition order.
    pub fn active_policies(&self) -> Vec<&ScanExecutionPolicy> {
        self.policies
            .iter()
            .filter(|policy| policy.enabled)
            .take(POLICY_LIMIT)
            .collect()
    }

    /// Active policies with at least one pipeline rule.
    pub fn active_policies_for_pipelines(&self) -> Vec<&ScanExecutionPolicy> {
        self.active_policies()
            .into_iter()
            .filter(|policy| policy.has_pipeline_rule())
            .collect()
    }

    /// Names of active policies whose on-demand scans use the DAST site profile.
    pub fn active_policy_names_with_dast_site_profile(&self, profile_name: &str) -> BTreeSet<String> {
        self.dast_profile_index()
            .site_profiles
            .remove(profile_name)
            .unwrap_or_default()
    }

    /// Names of active policies whose on-demand scans use the DAST scanner profile.
    pub fn active_policy_names_with_dast_scanner_profile(
        &self,
        profile_name: &str,
    ) -> BTreeSet<String> {
        self.dast_profile_index()
            .scanner_profiles
            .remove(profile_name)
            .unwrap_or_default()
    }

    fn dast_profile_index(&self) -> DastProfileIndex {
        let mut index = DastProfileIndex::default();

        for policy in self.active_policies() {
            for action in policy.actions.iter().filter(|a| a.scan.is_on_demand()) {
                if let Some(site_profile) = &action.site_profile {
                    index
                        .site_profiles
                        .entry(site_profile.clone())
                        .or_default()
                        .insert(policy.name.clone());
                }
                if let Some(scanner_profile) = action.scanner_profile.as_deref() {
                    if !scanner_profile.is_empty() {
                        index
                            .scanner_profiles
                            .entry(scanner_profile.to_string())
                            .or_default()
                            .insert(policy.name.clone());
                    }
                }
            }
        }

        index
    }
}

#[derive(Debug, Default)]
struct DastProfileIndex {
    site_profiles: BTreeMap<String, BTreeSet<String>>,
    scanner_profiles: BTreeMap<String, BTreeSet<String>>,
}
