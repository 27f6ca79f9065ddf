//! Scan execution policy lookup for pushed refs.

use std::sync::Arc;

use policy_config::{PolicyConfigurationStore, ProjectId, ScanAction, ScanExecutionPolicy};
use repository_client::{is_branch_ref, ref_name, BranchResolver};
use tracing::{debug, instrument};

use crate::EngineResult;

#[cfg(test)]
#[path = "scan_execution_tests.rs"]
mod tests;

/// Answers which scans the active scan execution policies demand for a ref.
pub struct ScanExecutionEvaluator {
    policies: Arc<dyn PolicyConfigurationStore>,
    branches: Arc<dyn BranchResolver>,
}

impl ScanExecutionEvaluator {
    pub fn new(
        policies: Arc<dyn PolicyConfigurationStore>,
        branches: Arc<dyn BranchResolver>,
    ) -> Self {
        Self { policies, branches }
    }

    /// Enabled policies of a project, capped at the active policy limit.
    pub async fn active_policies(&self, project: ProjectId) -> EngineResult<Vec<ScanExecutionPolicy>> {
        let set = self.policies.scan_execution_policies(project).await?;
        Ok(set.active_policies().into_iter().cloned().collect())
    }

    /// Scan actions of active policies whose pipeline rules cover the branch
    /// of `reference`. Tags and other non-branch refs never match.
    #[instrument(skip(self), fields(project_id = project.value()))]
    pub async fn active_scan_actions_for_ref(
        &self,
        project: ProjectId,
        reference: &str,
    ) -> EngineResult<Vec<ScanAction>> {
        if !is_branch_ref(reference) {
            debug!("Not a branch ref, no scan actions apply");
            return Ok(Vec::new());
        }
        let branch = ref_name(reference);

        let set = self.policies.scan_execution_policies(project).await?;
        let mut actions = Vec::new();
        for policy in set.active_policies_for_pipelines() {
            let branches = self
                .branches
                .scan_execution_branches(project, &policy.pipeline_rules())
                .await?;
            if branches.contains(branch) {
                debug!(policy = policy.name.as_str(), branch = branch, "Policy applies to branch");
                actions.extend(policy.actions.iter().cloned());
            }
        }

        Ok(actions)
    }
}
