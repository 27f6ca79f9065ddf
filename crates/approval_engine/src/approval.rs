//! Approvals, approval rules, and policy violations.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use policy_config::ScanResultPolicyId;
use repository_client::{PatchIdSha, UserId};
use serde::{Deserialize, Serialize};

use crate::MergeRequestId;

#[cfg(test)]
#[path = "approval_tests.rs"]
mod tests;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ApprovalId(u64);

impl ApprovalId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A user's approval of a merge request.
///
/// Approvals are created when a user approves and deleted by resets; they are
/// never modified in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub merge_request_id: MergeRequestId,
    pub user_id: UserId,

    /// Patch id of the merge request diff at approval time, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_id_sha: Option<PatchIdSha>,

    pub created_at: DateTime<Utc>,
}

impl Approval {
    /// Whether the approval was given for exactly `patch_id`.
    pub fn matches_patch_id(&self, patch_id: &PatchIdSha) -> bool {
        self.patch_id_sha.as_ref() == Some(patch_id)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ApprovalRuleId(u64);

impl ApprovalRuleId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Report a report-approver rule is driven by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    LicenseScanning,
    SecurityScan,
}

/// The closed set of approval rule kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "report", rename_all = "snake_case")]
pub enum ApprovalRuleKind {
    Regular,
    CodeOwner,
    AnyApprover,
    ReportApprover(ReportType),
}

/// An approval rule of a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub id: ApprovalRuleId,

    /// Rule name; code owner rules are named after their CODEOWNERS pattern.
    pub name: String,

    pub kind: ApprovalRuleKind,

    pub approvals_required: u32,

    /// Required count before any policy adjusted it.
    pub original_approvals_required: u32,

    /// Users eligible to approve for this rule.
    #[serde(default)]
    pub approvers: BTreeSet<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_result_policy_id: Option<ScanResultPolicyId>,
}

impl ApprovalRule {
    pub fn new(
        id: ApprovalRuleId,
        name: impl Into<String>,
        kind: ApprovalRuleKind,
        approvals_required: i64,
    ) -> Self {
        let required = clamp_required(approvals_required);
        Self {
            id,
            name: name.into(),
            kind,
            approvals_required: required,
            original_approvals_required: required,
            approvers: BTreeSet::new(),
            scan_result_policy_id: None,
        }
    }

    pub fn with_approvers(mut self, approvers: impl IntoIterator<Item = UserId>) -> Self {
        self.approvers = approvers.into_iter().collect();
        self
    }

    pub fn with_policy(mut self, policy_id: ScanResultPolicyId) -> Self {
        self.scan_result_policy_id = Some(policy_id);
        self
    }

    pub fn is_code_owner(&self) -> bool {
        matches!(self.kind, ApprovalRuleKind::CodeOwner)
    }

    /// License report-approver rule linked to a scan result policy.
    pub fn is_policy_license_rule(&self) -> bool {
        matches!(
            self.kind,
            ApprovalRuleKind::ReportApprover(ReportType::LicenseScanning)
        ) && self.scan_result_policy_id.is_some()
    }

    /// Eligible approvers of this rule who have approved.
    pub fn approved_approvers<'a>(
        &self,
        approvals: impl IntoIterator<Item = &'a Approval>,
    ) -> BTreeSet<UserId> {
        approvals
            .into_iter()
            .map(|approval| approval.user_id)
            .filter(|user| self.approvers.contains(user))
            .collect()
    }

    /// Required approvals once a policy evaluation is known.
    ///
    /// Violated rules need at least one approval; unviolated license rules
    /// need none.
    pub fn required_after_evaluation(&self, violated: bool) -> u32 {
        if violated {
            self.original_approvals_required.max(1)
        } else {
            0
        }
    }
}

/// Clamps a signed count into the valid `approvals_required` range.
pub fn clamp_required(count: i64) -> u32 {
    u32::try_from(count.max(0)).unwrap_or(u32::MAX)
}

/// Current violation state of one policy on one merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub merge_request_id: MergeRequestId,
    pub policy_id: ScanResultPolicyId,
    pub violated: bool,
    pub updated_at: DateTime<Utc>,
}
