//! Code owners of the paths a push changed.

use std::collections::BTreeSet;
use std::sync::Arc;

use repository_client::{is_blank_sha, CodeOwnerEntry, CodeOwnersProvider, DiffProvider, UserId};
use tracing::{debug, instrument};

use crate::{ApprovalEngineError, EngineResult, MergeRequest};

#[cfg(test)]
#[path = "code_ownership_tests.rs"]
mod tests;

/// Resolves CODEOWNERS entries against the files changed in a merge request.
pub struct CodeOwnershipResolver {
    diff_provider: Arc<dyn DiffProvider>,
    code_owners: Arc<dyn CodeOwnersProvider>,
}

impl CodeOwnershipResolver {
    pub fn new(
        diff_provider: Arc<dyn DiffProvider>,
        code_owners: Arc<dyn CodeOwnersProvider>,
    ) -> Self {
        Self {
            diff_provider,
            code_owners,
        }
    }

    /// Users owning any path changed between `since_commit` and the head.
    pub async fn owners_for_changed_paths(
        &self,
        mr: &MergeRequest,
        since_commit: &str,
    ) -> EngineResult<BTreeSet<UserId>> {
        Ok(self
            .entries_since(mr, since_commit)
            .await?
            .into_iter()
            .flat_map(|entry| entry.approvers)
            .collect())
    }

    /// Patterns of the entries matching changed paths. Code owner approval
    /// rules carry these patterns as their names.
    pub async fn code_owner_rule_names(
        &self,
        mr: &MergeRequest,
        since_commit: &str,
    ) -> EngineResult<BTreeSet<String>> {
        Ok(self
            .entries_since(mr, since_commit)
            .await?
            .into_iter()
            .map(|entry| entry.pattern)
            .collect())
    }

    /// CODEOWNERS entries at the head matching a path changed since
    /// `since_commit`. A blank `since_commit` means the branch was just
    /// created, so the whole merge request diff is used.
    #[instrument(skip(self, mr), fields(merge_request_id = mr.id.value()))]
    async fn entries_since(
        &self,
        mr: &MergeRequest,
        since_commit: &str,
    ) -> EngineResult<Vec<CodeOwnerEntry>> {
        let entries = self.code_owners.owners_at(mr.project_id(), &mr.head_sha).await?;
        if entries.is_empty() {
            debug!("No CODEOWNERS entries at merge request head");
            return Ok(Vec::new());
        }

        let from = if is_blank_sha(since_commit) {
            mr.diff_base_sha
                .as_deref()
                .ok_or_else(|| ApprovalEngineError::DiffUnavailable {
                    merge_request_id: mr.id.value(),
                    reason: "merge request has no diff base".to_string(),
                })?
        } else {
            since_commit
        };

        let diff = self
            .diff_provider
            .compute_diff(mr.project_id(), from, &mr.head_sha)
            .await
            .map_err(|e| ApprovalEngineError::DiffUnavailable {
                merge_request_id: mr.id.value(),
                reason: e.to_string(),
            })?;

        let changed: BTreeSet<&str> = diff.iter().flat_map(|d| d.touched_paths()).collect();
        let matching: Vec<CodeOwnerEntry> = entries
            .into_iter()
            .filter(|entry| changed.iter().any(|path| entry.matches_path(path)))
            .collect();

        debug!(
            changed_paths = changed.len(),
            matching_entries = matching.len(),
            "Resolved code owner entries for changed paths"
        );
        Ok(matching)
    }
}
