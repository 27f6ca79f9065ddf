//! Persistence and reporting of policy evaluation results.

use std::collections::BTreeSet;
use std::sync::Arc;

use policy_config::{EvaluationConfig, ScanResultPolicyId};
use tracing::{debug, instrument, warn};

use crate::notifications::{
    AuditLogEntry, AuditSink, PolicyBotComment, PolicyBotNotifier, ViolationReportType,
};
use crate::store::PolicyViolationStore;
use crate::{ApprovalRule, EngineResult, MergeRequest};

#[cfg(test)]
#[path = "violation_recorder_tests.rs"]
mod tests;

/// Records the outcome of evaluating a merge request's policy rules.
pub struct ViolationRecorder {
    violations: Arc<dyn PolicyViolationStore>,
    audit: Arc<dyn AuditSink>,
    policy_bot: Arc<dyn PolicyBotNotifier>,
    policy_bot_comments: bool,
}

impl ViolationRecorder {
    pub fn new(
        violations: Arc<dyn PolicyViolationStore>,
        audit: Arc<dyn AuditSink>,
        policy_bot: Arc<dyn PolicyBotNotifier>,
    ) -> Self {
        Self {
            violations,
            audit,
            policy_bot,
            policy_bot_comments: true,
        }
    }

    /// Creates a recorder with the toggles of `config`.
    pub fn from_config(
        violations: Arc<dyn PolicyViolationStore>,
        audit: Arc<dyn AuditSink>,
        policy_bot: Arc<dyn PolicyBotNotifier>,
        config: &EvaluationConfig,
    ) -> Self {
        Self::new(violations, audit, policy_bot).with_policy_bot_comments(config.policy_bot_comments)
    }

    /// Enables or disables policy bot comments.
    pub fn with_policy_bot_comments(mut self, enabled: bool) -> Self {
        self.policy_bot_comments = enabled;
        self
    }

    /// Records violated and unviolated rules of one merge request.
    ///
    /// Upserts one violation row per linked policy, writes one audit entry per
    /// violated rule, and enqueues a policy bot comment when any rule was
    /// evaluated. Comment delivery failures are logged and do not fail the
    /// call.
    ///
    /// # Errors
    ///
    /// Returns `ApprovalEngineError::Persistence` if the violation upsert fails.
    #[instrument(skip_all, fields(merge_request_id = mr.id.value()))]
    pub async fn record(
        &self,
        mr: &MergeRequest,
        violated_rules: &[ApprovalRule],
        unviolated_rules: &[ApprovalRule],
    ) -> EngineResult<()> {
        let violated = policy_ids(violated_rules);
        let unviolated: Vec<ScanResultPolicyId> = policy_ids(unviolated_rules)
            .into_iter()
            .filter(|id| !violated.contains(id))
            .collect();
        let violated: Vec<ScanResultPolicyId> = violated.into_iter().collect();

        let evaluated = !violated_rules.is_empty() || !unviolated_rules.is_empty();
        if self.policy_bot_comments && evaluated {
            let comment = PolicyBotComment {
                merge_request_id: mr.id,
                report_type: ViolationReportType::LicenseScanning,
                violated_policy_ids: violated.clone(),
            };
            if let Err(e) = self.policy_bot.enqueue(comment).await {
                warn!(error = %e, "Policy bot comment delivery failed");
            }
        }

        for rule in violated_rules {
            self.audit.record(&AuditLogEntry::license_rule_violated(
                rule.id,
                rule.name.as_str(),
                mr.id,
                mr.iid,
                mr.target_project.full_path.as_str(),
            ));
        }

        self.violations
            .upsert_violations(mr.id, &violated, &unviolated)
            .await?;

        debug!(
            violated = violated.len(),
            unviolated = unviolated.len(),
            "Recorded policy violations"
        );
        Ok(())
    }
}

fn policy_ids(rules: &[ApprovalRule]) -> BTreeSet<ScanResultPolicyId> {
    rules.iter().filter_map(|rule| rule.scan_result_policy_id).collect()
}
