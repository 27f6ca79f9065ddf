//! Patch identity of a merge request's current diff.

use std::sync::Arc;

use repository_client::{DiffProvider, PatchIdSha};
use tracing::{debug, warn};

use crate::{ApprovalEngineError, MergeRequest};

#[cfg(test)]
#[path = "patch_identity_tests.rs"]
mod tests;

/// Result of resolving a merge request's patch id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchIdentity {
    Available(PatchIdSha),
    /// The diff could not be computed. Treated as "content changed".
    Unavailable,
}

impl PatchIdentity {
    pub fn sha(&self) -> Option<&PatchIdSha> {
        match self {
            PatchIdentity::Available(sha) => Some(sha),
            PatchIdentity::Unavailable => None,
        }
    }
}

/// Computes patch ids through a [`DiffProvider`].
pub struct PatchIdentityResolver {
    diff_provider: Arc<dyn DiffProvider>,
}

impl PatchIdentityResolver {
    pub fn new(diff_provider: Arc<dyn DiffProvider>) -> Self {
        Self { diff_provider }
    }

    /// Patch id of the diff between the merge base and the head of `mr`.
    pub async fn compute_patch_id(&self, mr: &MergeRequest) -> PatchIdentity {
        let Some(base) = mr.diff_base_sha.as_deref() else {
            let err = ApprovalEngineError::DiffUnavailable {
                merge_request_id: mr.id.value(),
                reason: "merge request has no diff base".to_string(),
            };
            warn!(merge_request_id = mr.id.value(), error = %err, "Patch id unavailable");
            return PatchIdentity::Unavailable;
        };

        match self
            .diff_provider
            .compute_diff(mr.project_id(), base, &mr.head_sha)
            .await
        {
            Ok(diff) => {
                let sha = self.diff_provider.patch_id(&diff);
                debug!(
                    merge_request_id = mr.id.value(),
                    patch_id = %sha,
                    files = diff.len(),
                    "Computed merge request patch id"
                );
                PatchIdentity::Available(sha)
            }
            Err(e) => {
                let err = ApprovalEngineError::DiffUnavailable {
                    merge_request_id: mr.id.value(),
                    reason: e.to_string(),
                };
                warn!(merge_request_id = mr.id.value(), error = %err, "Patch id unavailable");
                PatchIdentity::Unavailable
            }
        }
    }
}
