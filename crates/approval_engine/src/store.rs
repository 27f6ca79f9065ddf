//! Persistence interfaces consumed by the engine.
//!
//! The engine never writes approval state piecemeal: a reset is described by an
//! [`ApprovalResetPlan`] and handed to the store in one call, which must apply
//! it atomically.

use std::collections::BTreeSet;

use async_trait::async_trait;
use policy_config::{ProjectId, ScanResultPolicyId};
use repository_client::{PatchIdSha, PipelineId, UserId};

use crate::{
    Approval, ApprovalId, ApprovalRule, ApprovalRuleId, MergeRequest, MergeRequestId,
    MergeRequestState, PersistenceError, PolicyViolation,
};

/// Changes applied to a merge request by one reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalResetPlan {
    /// Approvals to delete. Ids that no longer exist are ignored.
    pub delete_approval_ids: BTreeSet<ApprovalId>,

    /// Clear the merge request's temporary unapproval flag.
    pub clear_temporarily_unapproved: bool,
}

impl ApprovalResetPlan {
    pub fn is_empty(&self) -> bool {
        self.delete_approval_ids.is_empty() && !self.clear_temporarily_unapproved
    }
}

/// A new required-approvals count for one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredApprovalsUpdate {
    pub rule_id: ApprovalRuleId,
    pub approvals_required: u32,
}

/// Access to merge requests, their approvals, and approval rules.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Merge requests whose source branch is `branch` in `project`, limited to
    /// `states`.
    async fn merge_requests_for_source_branch(
        &self,
        project: ProjectId,
        branch: &str,
        states: &[MergeRequestState],
    ) -> Result<Vec<MergeRequest>, PersistenceError>;

    /// Merge requests whose head pipeline is `pipeline`.
    async fn merge_requests_for_head_pipeline(
        &self,
        project: ProjectId,
        pipeline: PipelineId,
    ) -> Result<Vec<MergeRequest>, PersistenceError>;

    async fn approvals(
        &self,
        merge_request: MergeRequestId,
    ) -> Result<Vec<Approval>, PersistenceError>;

    async fn approval_rules(
        &self,
        merge_request: MergeRequestId,
    ) -> Result<Vec<ApprovalRule>, PersistenceError>;

    /// Records an approval.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::DuplicateApproval` when the user already
    /// approved the merge request.
    async fn insert_approval(
        &self,
        merge_request: MergeRequestId,
        user: UserId,
        patch_id_sha: Option<PatchIdSha>,
    ) -> Result<Approval, PersistenceError>;

    /// Applies a reset plan atomically, returning the number of approvals
    /// actually deleted.
    async fn apply_approval_reset(
        &self,
        merge_request: MergeRequestId,
        plan: &ApprovalResetPlan,
    ) -> Result<usize, PersistenceError>;

    /// Sets the required approvals of several rules atomically.
    async fn update_required_approvals(
        &self,
        merge_request: MergeRequestId,
        updates: &[RequiredApprovalsUpdate],
    ) -> Result<(), PersistenceError>;
}

/// Access to per-policy violation state.
#[async_trait]
pub trait PolicyViolationStore: Send + Sync {
    /// Upserts one violation row per policy; repeated calls with the same input
    /// leave the same state.
    async fn upsert_violations(
        &self,
        merge_request: MergeRequestId,
        violated: &[ScanResultPolicyId],
        unviolated: &[ScanResultPolicyId],
    ) -> Result<(), PersistenceError>;

    async fn violations(
        &self,
        merge_request: MergeRequestId,
    ) -> Result<Vec<PolicyViolation>, PersistenceError>;
}
