//! TOML policy documents.
//!
//! A [`PolicyDocument`] describes the scan result and scan execution policies
//! of any number of projects. [`StaticPolicyConfiguration`] serves a loaded
//! document through the [`PolicyConfigurationStore`] trait.
//!
//! ```toml
//! [[projects]]
//! project_id = 1
//!
//! [[projects.scan_result_policies]]
//! id = 10
//! license_states = ["newly_detected"]
//! match_on_inclusion = true
//!
//! [[projects.scan_result_policies.license_policies]]
//! spdx_identifier = "GPL-3.0"
//!
//! [[projects.scan_execution_policies]]
//! name = "Enforce SAST"
//! enabled = true
//! rules = [{ type = "pipeline", branches = ["main"] }]
//! actions = [{ scan = "sast" }]
//! ```

use std::{collections::HashMap, fs, path::Path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    ConfigurationError, ConfigurationResult, PolicyConfigurationStore, ProjectId,
    ScanExecutionPolicy, ScanExecutionPolicySet, ScanResultPolicyId, ScanResultPolicyRead,
};

#[cfg(test)]
#[path = "policy_document_tests.rs"]
mod tests;

/// The policies configured for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPolicies {
    pub project_id: ProjectId,

    #[serde(default)]
    pub scan_result_policies: Vec<ScanResultPolicyRead>,

    #[serde(default)]
    pub scan_execution_policies: Vec<ScanExecutionPolicy>,
}

/// Policy configuration for a set of projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub projects: Vec<ProjectPolicies>,
}

impl PolicyDocument {
    /// Parses a policy document from TOML text.
    ///
    /// Structural problems (duplicate projects or duplicate policy ids within a
    /// project) are rejected. Individual scan result policies are not validated
    /// here: an incomplete policy is skipped at evaluation time so the rest of
    /// the project's rules keep working.
    pub fn from_toml_str(content: &str) -> ConfigurationResult<Self> {
        let document: PolicyDocument =
            toml::from_str(content).map_err(|e| ConfigurationError::ParseError {
                reason: e.to_string(),
            })?;
        document.validate()?;
        Ok(document)
    }

    /// Loads a policy document from a TOML file.
    pub fn load(path: &Path) -> ConfigurationResult<Self> {
        debug!("Loading policy document from {:?}", path);

        if !path.exists() {
            return Err(ConfigurationError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigurationError::FileAccessError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content)
    }

    fn validate(&self) -> ConfigurationResult<()> {
        let mut seen_projects = std::collections::HashSet::new();
        for project in &self.projects {
            if !seen_projects.insert(project.project_id) {
                return Err(ConfigurationError::invalid(
                    "projects",
                    format!("project {} is defined more than once", project.project_id),
                ));
            }

            let mut seen_policies = std::collections::HashSet::new();
            for policy in &project.scan_result_policies {
                if !seen_policies.insert(policy.id) {
                    return Err(ConfigurationError::invalid(
                        format!("projects[{}].scan_result_policies", project.project_id),
                        format!("policy id {} is defined more than once", policy.id),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// In-memory [`PolicyConfigurationStore`] backed by a [`PolicyDocument`].
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyConfiguration {
    projects: HashMap<ProjectId, ProjectPolicies>,
}

impl StaticPolicyConfiguration {
    pub fn new(document: PolicyDocument) -> Self {
        let projects = document
            .projects
            .into_iter()
            .map(|project| (project.project_id, project))
            .collect();
        Self { projects }
    }
}

impl From<PolicyDocument> for StaticPolicyConfiguration {
    fn from(document: PolicyDocument) -> Self {
        Self::new(document)
    }
}

#[async_trait]
impl PolicyConfigurationStore for StaticPolicyConfiguration {
    async fn scan_result_policy(
        &self,
        project_id: ProjectId,
        policy_id: ScanResultPolicyId,
    ) -> ConfigurationResult<Option<ScanResultPolicyRead>> {
        let policy = self.projects.get(&project_id).and_then(|project| {
            project
                .scan_result_policies
                .iter()
                .find(|policy| policy.id == policy_id)
                .cloned()
        });

        if policy.is_none() {
            warn!(
                project_id = %project_id,
                policy_id = %policy_id,
                "Scan result policy not found in policy document"
            );
        }

        Ok(policy)
    }

    async fn scan_result_policies(
        &self,
        project_id: ProjectId,
    ) -> ConfigurationResult<Vec<ScanResultPolicyRead>> {
        Ok(self
            .projects
            .get(&project_id)
            .map(|project| project.scan_result_policies.clone())
            .unwrap_or_default())
    }

    async fn scan_execution_policies(
        &self,
        project_id: ProjectId,
    ) -> ConfigurationResult<ScanExecutionPolicySet> {
        Ok(self
            .projects
            .get(&project_id)
            .map(|project| ScanExecutionPolicySet::new(project.scan_execution_policies.clone()))
            .unwrap_or_default())
    }
}
