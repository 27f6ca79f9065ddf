//! Security policy configuration for the approval engine.
//!
//! This crate holds the read-only policy inputs the approval engine evaluates
//! against, together with the engine's own runtime configuration:
//!
//! - [`ScanResultPolicyRead`] - materialized license policy snapshots
//! - [`ScanExecutionPolicySet`] - scan execution policies with the active-policy cap
//! - [`EvaluationConfig`] - feature toggles and limits passed into the engine
//! - [`PolicyDocument`] - TOML document describing the policies of many projects
//! - [`PolicyConfigurationStore`] - the provider trait the engine consumes
//!
//! Policy lifecycle (synchronisation from the policy project, editing, and so on)
//! lives outside this crate. Everything here is a snapshot.

use serde::{Deserialize, Serialize};

pub mod configuration_store;
pub mod errors;
pub mod evaluation_config;
pub mod policy_document;
pub mod scan_execution_policy;
pub mod scan_result_policy;

pub use configuration_store::PolicyConfigurationStore;
pub use errors::{ConfigurationError, ConfigurationResult};
pub use evaluation_config::EvaluationConfig;
pub use policy_document::{PolicyDocument, ProjectPolicies, StaticPolicyConfiguration};
pub use scan_execution_policy::{
    is_valid_scan_type, BranchType, PolicyRule, RuleType, ScanAction, ScanExecutionPolicy,
    ScanExecutionPolicySet, ScanType, POLICY_LIMIT,
};
pub use scan_result_policy::{
    LicenseState, ScanResultPolicyId, ScanResultPolicyRead, SoftwareLicensePolicy,
};

/// Identifier of a hosted project.
///
/// Projects own merge requests, approval settings, and policy configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProjectId(u64);

impl ProjectId {
    /// Create a project identifier from its numeric value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the numeric value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
