//! Shared builders for engine unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use policy_config::ProjectId;
use repository_client::{PipelineId, PipelineRef, PipelineStatus};

use crate::notifications::{
    AuditLogEntry, AuditSink, EventNotifier, MergeRequestEvent, PolicyBotComment,
    PolicyBotNotifier,
};
use crate::{
    ApprovalEngineError, EngineResult, MergeRequest, MergeRequestId, MergeRequestIid,
    MergeRequestState, Project, ProjectApprovalSettings,
};

pub const PROJECT: u64 = 1;
pub const HEAD_SHA: &str = "1111111111111111111111111111111111111111";
pub const BASE_SHA: &str = "2222222222222222222222222222222222222222";
pub const OLD_SHA: &str = "3333333333333333333333333333333333333333";

pub fn project_id() -> ProjectId {
    ProjectId::new(PROJECT)
}

pub fn merge_request(id: u64, source_branch: &str) -> MergeRequest {
    MergeRequest {
        id: MergeRequestId::new(id),
        iid: MergeRequestIid::new(id + 100),
        source_project_id: project_id(),
        source_branch: source_branch.to_string(),
        target_project: Project::new(project_id(), "acme/widgets"),
        target_branch: "main".to_string(),
        state: MergeRequestState::Opened,
        head_sha: HEAD_SHA.to_string(),
        diff_base_sha: Some(BASE_SHA.to_string()),
        rebase_commit_sha: None,
        head_pipeline: None,
        target_branch_pipeline: None,
        temporarily_unapproved: false,
    }
}

pub fn with_settings(mut mr: MergeRequest, reset_on_push: bool, selective: bool) -> MergeRequest {
    mr.target_project.settings = ProjectApprovalSettings {
        reset_approvals_on_push: reset_on_push,
        selective_code_owner_removals: selective,
    };
    mr
}

pub fn pipeline(id: u64, status: &str) -> PipelineRef {
    PipelineRef {
        id: PipelineId::new(id),
        sha: HEAD_SHA.to_string(),
        status: PipelineStatus::Legacy(status.to_string()),
    }
}

// ============================================================================
// Recording collaborators
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<(MergeRequestId, MergeRequestEvent)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events_for(&self, mr: u64) -> Vec<MergeRequestEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == MergeRequestId::new(mr))
            .map(|(_, event)| *event)
            .collect()
    }

    pub fn total(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl EventNotifier for RecordingNotifier {
    async fn notify(&self, merge_request: MergeRequestId, event: MergeRequestEvent) -> EngineResult<()> {
        self.events.lock().unwrap().push((merge_request, event));
        if self.fail {
            return Err(ApprovalEngineError::notification("events", "subscriber offline"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAuditSink {
    pub entries: Mutex<Vec<AuditLogEntry>>,
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, entry: &AuditLogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

#[derive(Default)]
pub struct RecordingPolicyBot {
    pub comments: Mutex<Vec<PolicyBotComment>>,
    pub fail: bool,
}

impl RecordingPolicyBot {
    pub fn failing() -> Self {
        Self {
            comments: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl PolicyBotNotifier for RecordingPolicyBot {
    async fn enqueue(&self, comment: PolicyBotComment) -> EngineResult<()> {
        if self.fail {
            return Err(ApprovalEngineError::notification("policy_bot", "queue unavailable"));
        }
        self.comments.lock().unwrap().push(comment);
        Ok(())
    }
}
