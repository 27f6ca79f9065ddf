//! Synchronisation of license approval rules with a pipeline's scan results.
//!
//! When a pipeline finishes, every merge request whose head pipeline it is gets
//! its license scan result policies re-evaluated. Violated rules require
//! approval again, satisfied rules require none, and the outcome is recorded
//! through the [`ViolationRecorder`].

use std::sync::Arc;

use policy_config::{PolicyConfigurationStore, ProjectId};
use repository_client::{LicenseScanReport, PipelineId, PipelineRef, ScanReportProvider};
use tracing::{debug, info, instrument, warn};

use crate::license_evaluator::evaluate_license_policy;
use crate::metrics::{NoOpResetMetrics, ResetMetrics};
use crate::report_cache::ReportCache;
use crate::store::{ApprovalStore, RequiredApprovalsUpdate};
use crate::violation_recorder::ViolationRecorder;
use crate::{ApprovalRule, ApprovalRuleId, EngineResult, MergeRequest, MergeRequestId};

#[cfg(test)]
#[path = "license_sync_tests.rs"]
mod tests;

/// Rules of one merge request after evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRequestRuleSync {
    pub violated: Vec<ApprovalRuleId>,
    pub unviolated: Vec<ApprovalRuleId>,

    /// Rules whose policy no longer exists.
    pub skipped: Vec<ApprovalRuleId>,
}

/// Result of syncing one pipeline.
#[derive(Debug)]
pub struct LicenseSyncReport {
    pub pipeline_id: PipelineId,

    /// The pipeline produced no license scanning results; nothing was synced.
    pub no_license_results: bool,

    pub merge_requests: Vec<(MergeRequestId, EngineResult<MergeRequestRuleSync>)>,
}

impl LicenseSyncReport {
    fn empty(pipeline_id: PipelineId, no_license_results: bool) -> Self {
        Self {
            pipeline_id,
            no_license_results,
            merge_requests: Vec::new(),
        }
    }

    pub fn merge_request(&self, id: MergeRequestId) -> Option<&EngineResult<MergeRequestRuleSync>> {
        self.merge_requests
            .iter()
            .find(|(mr, _)| *mr == id)
            .map(|(_, result)| result)
    }
}

/// Re-evaluates license approval rules when a pipeline finishes.
pub struct SyncLicenseScanningRulesService {
    store: Arc<dyn ApprovalStore>,
    reports: Arc<dyn ScanReportProvider>,
    policies: Arc<dyn PolicyConfigurationStore>,
    recorder: ViolationRecorder,
    metrics: Arc<dyn ResetMetrics>,
}

impl SyncLicenseScanningRulesService {
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        reports: Arc<dyn ScanReportProvider>,
        policies: Arc<dyn PolicyConfigurationStore>,
        recorder: ViolationRecorder,
    ) -> Self {
        Self {
            store,
            reports,
            policies,
            recorder,
            metrics: Arc::new(NoOpResetMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ResetMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Syncs the license rules of every merge request whose head pipeline is
    /// `pipeline`.
    ///
    /// A failure on one merge request is reported in its entry; the remaining
    /// merge requests are still processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline's report or its merge requests cannot
    /// be loaded.
    #[instrument(skip(self, pipeline), fields(project_id = project.value(), pipeline_id = pipeline.id.value()))]
    pub async fn execute(
        &self,
        project: ProjectId,
        pipeline: &PipelineRef,
    ) -> EngineResult<LicenseSyncReport> {
        let mut cache = ReportCache::new();
        let Some(current) = cache
            .license_report(self.reports.as_ref(), project, pipeline.id)
            .await?
        else {
            info!("Pipeline has no license scanning results, skipping sync");
            return Ok(LicenseSyncReport::empty(pipeline.id, true));
        };

        let merge_requests = self
            .store
            .merge_requests_for_head_pipeline(project, pipeline.id)
            .await?;
        debug!(merge_requests = merge_requests.len(), "Syncing license rules");

        let mut report = LicenseSyncReport::empty(pipeline.id, false);
        for mr in &merge_requests {
            let result = self.sync_merge_request(mr, &current, &mut cache).await;
            if let Err(e) = &result {
                warn!(merge_request_id = mr.id.value(), error = %e, "License rule sync failed");
            }
            report.merge_requests.push((mr.id, result));
        }

        Ok(report)
    }

    async fn sync_merge_request(
        &self,
        mr: &MergeRequest,
        current: &LicenseScanReport,
        cache: &mut ReportCache,
    ) -> EngineResult<MergeRequestRuleSync> {
        let rules: Vec<ApprovalRule> = self
            .store
            .approval_rules(mr.id)
            .await?
            .into_iter()
            .filter(ApprovalRule::is_policy_license_rule)
            .collect();
        if rules.is_empty() {
            return Ok(MergeRequestRuleSync::default());
        }

        let target = cache.target_branch_report(self.reports.as_ref(), mr).await?;

        let mut sync = MergeRequestRuleSync::default();
        let mut violated_rules = Vec::new();
        let mut unviolated_rules = Vec::new();
        for rule in rules {
            let Some(policy_id) = rule.scan_result_policy_id else {
                continue;
            };
            let Some(policy) = self
                .policies
                .scan_result_policy(mr.project_id(), policy_id)
                .await?
            else {
                warn!(
                    merge_request_id = mr.id.value(),
                    approval_rule_id = rule.id.value(),
                    policy_id = policy_id.value(),
                    "Scan result policy not found, skipping rule"
                );
                sync.skipped.push(rule.id);
                continue;
            };

            let violated = evaluate_license_policy(&policy, current, &target).is_violated();
            self.metrics.record_policy_evaluation(violated);
            if violated {
                info!(
                    merge_request_id = mr.id.value(),
                    approval_rule_id = rule.id.value(),
                    approval_rule_name = rule.name.as_str(),
                    "License rule violated"
                );
                sync.violated.push(rule.id);
                violated_rules.push(rule);
            } else {
                sync.unviolated.push(rule.id);
                unviolated_rules.push(rule);
            }
        }

        let updates: Vec<RequiredApprovalsUpdate> = violated_rules
            .iter()
            .map(|rule| (rule, true))
            .chain(unviolated_rules.iter().map(|rule| (rule, false)))
            .map(|(rule, violated)| RequiredApprovalsUpdate {
                rule_id: rule.id,
                approvals_required: rule.required_after_evaluation(violated),
            })
            .collect();
        if !updates.is_empty() {
            self.store.update_required_approvals(mr.id, &updates).await?;
        }

        self.recorder
            .record(mr, &violated_rules, &unviolated_rules)
            .await?;
        Ok(sync)
    }
}
