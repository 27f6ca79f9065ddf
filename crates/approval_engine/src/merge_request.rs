//! Merge request domain types.
//!
//! A [`MergeRequest`] is the engine's snapshot of a merge request at the time
//! an event is processed. It carries the revisions and pipelines the resolvers
//! need and the approval settings of its target project.

use policy_config::ProjectId;
use repository_client::PipelineRef;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "merge_request_tests.rs"]
mod tests;

/// Global identifier of a merge request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MergeRequestId(u64);

impl MergeRequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MergeRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Project-scoped number of a merge request (`!42`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MergeRequestIid(u64);

impl MergeRequestIid {
    pub fn new(iid: u64) -> Self {
        Self(iid)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MergeRequestIid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!{}", self.0)
    }
}

/// Approval behaviour configured on a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectApprovalSettings {
    /// Remove all approvals when new commits are pushed.
    #[serde(default)]
    pub reset_approvals_on_push: bool,

    /// Remove only code owner approvals for files changed by the push.
    #[serde(default)]
    pub selective_code_owner_removals: bool,
}

impl ProjectApprovalSettings {
    /// Whether a push may remove approvals at all.
    pub fn resets_on_push(&self) -> bool {
        self.reset_approvals_on_push || self.selective_code_owner_removals
    }
}

/// The target project of a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,

    /// Namespace path, e.g. `group/subgroup/project`.
    pub full_path: String,

    #[serde(default)]
    pub settings: ProjectApprovalSettings,
}

impl Project {
    pub fn new(id: ProjectId, full_path: impl Into<String>) -> Self {
        Self {
            id,
            full_path: full_path.into(),
            settings: ProjectApprovalSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ProjectApprovalSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRequestState {
    Opened,
    Closed,
    Merged,
}

impl MergeRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeRequestState::Opened => "opened",
            MergeRequestState::Closed => "closed",
            MergeRequestState::Merged => "merged",
        }
    }
}

/// States whose approvals are reset by a push. Closed merge requests may be
/// reopened, so their approvals must not survive a push either.
pub const RESETTABLE_STATES: [MergeRequestState; 2] =
    [MergeRequestState::Opened, MergeRequestState::Closed];

/// Snapshot of a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: MergeRequestId,
    pub iid: MergeRequestIid,

    /// Project the source branch lives in (differs from the target for forks).
    pub source_project_id: ProjectId,
    pub source_branch: String,

    pub target_project: Project,
    pub target_branch: String,

    pub state: MergeRequestState,

    /// Current head commit of the source branch.
    pub head_sha: String,

    /// Merge base with the target branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_base_sha: Option<String>,

    /// Commit produced by the last server-side rebase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebase_commit_sha: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_pipeline: Option<PipelineRef>,

    /// Latest finished pipeline of the target branch, for report baselines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_branch_pipeline: Option<PipelineRef>,

    /// Set while approvals are being recalculated; cleared by every reset.
    #[serde(default)]
    pub temporarily_unapproved: bool,
}

impl MergeRequest {
    pub fn project_id(&self) -> ProjectId {
        self.target_project.id
    }

    pub fn settings(&self) -> ProjectApprovalSettings {
        self.target_project.settings
    }

    /// Whether `revision` is the commit written by the last rebase.
    pub fn is_rebase_commit(&self, revision: &str) -> bool {
        self.rebase_commit_sha.as_deref() == Some(revision)
    }
}
