//! Policy configuration store trait definition
//!
//! Defines the abstract interface the approval engine uses to read policy
//! snapshots, following dependency injection principles.

use async_trait::async_trait;

use crate::{
    ConfigurationResult, ProjectId, ScanExecutionPolicySet, ScanResultPolicyId,
    ScanResultPolicyRead,
};

/// Read access to the policy configuration of projects.
///
/// Implementations are expected to be cheap to call repeatedly; the engine does
/// not cache results across branch update events.
#[async_trait]
pub trait PolicyConfigurationStore: Send + Sync {
    /// Get one scan result policy snapshot of a project.
    ///
    /// # Returns
    /// `Ok(None)` if the project has no policy with that id.
    async fn scan_result_policy(
        &self,
        project_id: ProjectId,
        policy_id: ScanResultPolicyId,
    ) -> ConfigurationResult<Option<ScanResultPolicyRead>>;

    /// List all scan result policy snapshots of a project.
    async fn scan_result_policies(
        &self,
        project_id: ProjectId,
    ) -> ConfigurationResult<Vec<ScanResultPolicyRead>>;

    /// Get the scan execution policies of a project, in definition order.
    async fn scan_execution_policies(
        &self,
        project_id: ProjectId,
    ) -> ConfigurationResult<ScanExecutionPolicySet>;
}
