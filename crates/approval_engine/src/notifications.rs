//! Outbound notifications: merge request events, policy bot comments, audit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use policy_config::ScanResultPolicyId;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{ApprovalRuleId, EngineResult, MergeRequestId, MergeRequestIid};

#[cfg(test)]
#[path = "notifications_tests.rs"]
mod tests;

/// Merge request events emitted after approval state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRequestEvent {
    MergeRequestMergeStatusUpdated,
    MergeRequestApprovalStateUpdated,
}

impl MergeRequestEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeRequestEvent::MergeRequestMergeStatusUpdated => {
                "merge_request_merge_status_updated"
            }
            MergeRequestEvent::MergeRequestApprovalStateUpdated => {
                "merge_request_approval_state_updated"
            }
        }
    }
}

/// Subscribers to merge request events (real-time UI updates and the like).
#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn notify(&self, merge_request: MergeRequestId, event: MergeRequestEvent) -> EngineResult<()>;
}

/// Report a policy bot comment is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReportType {
    LicenseScanning,
    Scan,
}

/// Request to create or update the policy bot comment of a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBotComment {
    pub merge_request_id: MergeRequestId,
    pub report_type: ViolationReportType,
    /// Policies currently violated; empty means the comment should report
    /// that all policies pass.
    pub violated_policy_ids: Vec<ScanResultPolicyId>,
}

impl PolicyBotComment {
    pub fn has_violations(&self) -> bool {
        !self.violated_policy_ids.is_empty()
    }
}

/// Queue for policy bot comments. Delivery happens asynchronously.
#[async_trait]
pub trait PolicyBotNotifier: Send + Sync {
    async fn enqueue(&self, comment: PolicyBotComment) -> EngineResult<()>;
}

/// Structured audit record of an approval rule change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub event: String,
    pub reason: String,
    pub approval_rule_id: ApprovalRuleId,
    pub approval_rule_name: String,
    pub merge_request_id: MergeRequestId,
    pub merge_request_iid: MergeRequestIid,
    pub project_path: String,
}

/// Event name of approval rule updates.
pub const UPDATE_APPROVALS_EVENT: &str = "update_approvals";

/// Reason recorded for violated license finding rules.
pub const LICENSE_RULE_VIOLATED_REASON: &str = "license_finding rule violated";

impl AuditLogEntry {
    /// Entry for a license finding rule that became violated.
    pub fn license_rule_violated(
        approval_rule_id: ApprovalRuleId,
        approval_rule_name: impl Into<String>,
        merge_request_id: MergeRequestId,
        merge_request_iid: MergeRequestIid,
        project_path: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            event: UPDATE_APPROVALS_EVENT.to_string(),
            reason: LICENSE_RULE_VIOLATED_REASON.to_string(),
            approval_rule_id,
            approval_rule_name: approval_rule_name.into(),
            merge_request_id,
            merge_request_iid,
            project_path: project_path.into(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditLogEntry);
}

/// Writes audit entries as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditLogEntry) {
        info!(
            audit_id = %entry.id,
            event = entry.event.as_str(),
            reason = entry.reason.as_str(),
            approval_rule_id = entry.approval_rule_id.value(),
            approval_rule_name = entry.approval_rule_name.as_str(),
            merge_request_id = entry.merge_request_id.value(),
            merge_request_iid = entry.merge_request_iid.value(),
            project_path = entry.project_path.as_str(),
            "Updating MR approval rule"
        );
    }
}

/// Event notifier that only logs. For hosts without real-time subscribers.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventNotifier;

#[async_trait]
impl EventNotifier for LoggingEventNotifier {
    async fn notify(&self, merge_request: MergeRequestId, event: MergeRequestEvent) -> EngineResult<()> {
        info!(
            merge_request_id = merge_request.value(),
            event = event.as_str(),
            "Merge request event"
        );
        Ok(())
    }
}
