//! Branch resolution for scan execution policy rules.
//!
//! [`StaticBranchResolver`] answers from a fixed [`BranchInventory`] per project.
//! Hosts with live repository access implement [`crate::BranchResolver`]
//! themselves; the matching rules below stay the same.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use glob::Pattern;
use policy_config::{BranchType, PolicyRule, ProjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{BranchResolver, Error};

#[cfg(test)]
#[path = "branches_tests.rs"]
mod tests;

/// The branches of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInventory {
    #[serde(default)]
    pub branches: BTreeSet<String>,

    /// Protected branch names or wildcard patterns.
    #[serde(default)]
    pub protected: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

impl BranchInventory {
    pub fn new<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            branches: branches.into_iter().map(Into::into).collect(),
            protected: BTreeSet::new(),
            default_branch: None,
        }
    }

    pub fn with_default_branch(mut self, name: &str) -> Self {
        self.branches.insert(name.to_string());
        self.default_branch = Some(name.to_string());
        self
    }

    pub fn with_protected(mut self, pattern: &str) -> Self {
        self.protected.insert(pattern.to_string());
        self
    }

    /// Branches a single rule applies to.
    pub fn branches_for_rule(&self, rule: &PolicyRule) -> BTreeSet<String> {
        let mut matched = if !rule.branches.is_empty() {
            self.matching_any(&rule.branches)
        } else {
            match rule.branch_type {
                Some(BranchType::All) => self.branches.clone(),
                Some(BranchType::Protected) => {
                    let patterns: Vec<String> = self.protected.iter().cloned().collect();
                    self.matching_any(&patterns)
                }
                Some(BranchType::Default) => self.default_branch.iter().cloned().collect(),
                None => BTreeSet::new(),
            }
        };

        if !rule.branch_exceptions.is_empty() {
            let exceptions = self.matching_any(&rule.branch_exceptions);
            matched.retain(|branch| !exceptions.contains(branch));
        }

        matched
    }

    /// Existing branches matching any pattern. Literal names are kept even
    /// when the branch does not exist yet.
    fn matching_any(&self, patterns: &[String]) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        for raw in patterns {
            if !is_wildcard(raw) {
                result.insert(raw.clone());
                continue;
            }
            match Pattern::new(raw) {
                Ok(pattern) => {
                    result.extend(
                        self.branches
                            .iter()
                            .filter(|branch| pattern.matches(branch))
                            .cloned(),
                    );
                }
                Err(e) => {
                    warn!(pattern = raw.as_str(), error = %e, "Ignoring invalid branch pattern");
                }
            }
        }
        result
    }
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// A [`BranchResolver`] over fixed branch inventories.
#[derive(Debug, Clone, Default)]
pub struct StaticBranchResolver {
    inventories: HashMap<ProjectId, BranchInventory>,
}

impl StaticBranchResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: ProjectId, inventory: BranchInventory) -> Self {
        self.inventories.insert(project, inventory);
        self
    }
}

#[async_trait]
impl BranchResolver for StaticBranchResolver {
    async fn scan_execution_branches(
        &self,
        project: ProjectId,
        rules: &[PolicyRule],
    ) -> Result<BTreeSet<String>, Error> {
        let Some(inventory) = self.inventories.get(&project) else {
            debug!(project_id = project.value(), "No branch inventory for project");
            return Ok(BTreeSet::new());
        };

        Ok(rules
            .iter()
            .flat_map(|rule| inventory.branches_for_rule(rule))
            .collect())
    }
}
