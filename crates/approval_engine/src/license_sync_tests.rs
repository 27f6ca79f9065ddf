use super::*;
use policy_config::{
    LicenseState, PolicyDocument, ProjectPolicies, ScanResultPolicyId, ScanResultPolicyRead,
    SoftwareLicensePolicy, StaticPolicyConfiguration,
};
use repository_client::UserId;
use test_utils::{report_with_ids, FakeScanReportProvider};
use tracing_test::traced_test;

use crate::memory_store::InMemoryStore;
use crate::notifications::{AuditSink, TracingAuditSink};
use crate::store::PolicyViolationStore;
use crate::test_fixtures::{merge_request, pipeline, project_id, RecordingAuditSink, RecordingPolicyBot};
use crate::{ApprovalRuleKind, ReportType};

const HEAD_PIPELINE: u64 = 10;
const TARGET_PIPELINE: u64 = 20;

fn deny_list(id: u64, licenses: &[&str]) -> ScanResultPolicyRead {
    ScanResultPolicyRead {
        id: ScanResultPolicyId::new(id),
        license_states: vec![LicenseState::NewlyDetected, LicenseState::Detected],
        match_on_inclusion: true,
        approvals_required: 2,
        license_policies: licenses.iter().map(|l| SoftwareLicensePolicy::spdx(*l)).collect(),
    }
}

fn allow_list(id: u64, licenses: &[&str]) -> ScanResultPolicyRead {
    ScanResultPolicyRead {
        match_on_inclusion: false,
        ..deny_list(id, licenses)
    }
}

fn policies(scan_result_policies: Vec<ScanResultPolicyRead>) -> Arc<StaticPolicyConfiguration> {
    Arc::new(StaticPolicyConfiguration::new(PolicyDocument {
        projects: vec![ProjectPolicies {
            project_id: project_id(),
            scan_result_policies,
            scan_execution_policies: Vec::new(),
        }],
    }))
}

fn license_rule(id: u64, policy: u64, required: i64) -> ApprovalRule {
    ApprovalRule::new(
        ApprovalRuleId::new(id),
        format!("License check {}", id),
        ApprovalRuleKind::ReportApprover(ReportType::LicenseScanning),
        required,
    )
    .with_approvers([UserId::new(5)])
    .with_policy(ScanResultPolicyId::new(policy))
}

fn pipeline_mr(id: u64) -> MergeRequest {
    let mut mr = merge_request(id, "feature");
    mr.head_pipeline = Some(pipeline(HEAD_PIPELINE, "success"));
    mr.target_branch_pipeline = Some(pipeline(TARGET_PIPELINE, "success"));
    mr
}

struct Harness {
    store: Arc<InMemoryStore>,
    audit: Arc<RecordingAuditSink>,
    bot: Arc<RecordingPolicyBot>,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            audit: Arc::new(RecordingAuditSink::default()),
            bot: Arc::new(RecordingPolicyBot::default()),
        }
    }

    fn add_merge_request(&self, mr: MergeRequest, rules: Vec<ApprovalRule>) {
        let id = mr.id;
        self.store.upsert_merge_request(mr).unwrap();
        for rule in rules {
            self.store.add_approval_rule(id, rule).unwrap();
        }
    }

    fn service_with_audit(
        &self,
        reports: Arc<FakeScanReportProvider>,
        policies: Arc<StaticPolicyConfiguration>,
        audit: Arc<dyn AuditSink>,
    ) -> SyncLicenseScanningRulesService {
        let recorder = ViolationRecorder::new(self.store.clone(), audit, self.bot.clone());
        SyncLicenseScanningRulesService::new(self.store.clone(), reports, policies, recorder)
    }

    fn service(
        &self,
        reports: Arc<FakeScanReportProvider>,
        policies: Arc<StaticPolicyConfiguration>,
    ) -> SyncLicenseScanningRulesService {
        self.service_with_audit(reports, policies, self.audit.clone())
    }

    async fn required(&self, mr: u64, rule: u64) -> u32 {
        self.store
            .approval_rules(MergeRequestId::new(mr))
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.id == ApprovalRuleId::new(rule))
            .map(|r| r.approvals_required)
            .unwrap()
    }

    async fn violated(&self, mr: u64, policy: u64) -> Option<bool> {
        self.store
            .violations(MergeRequestId::new(mr))
            .await
            .unwrap()
            .into_iter()
            .find(|v| v.policy_id == ScanResultPolicyId::new(policy))
            .map(|v| v.violated)
    }
}

fn reports(current: &[&str]) -> Arc<FakeScanReportProvider> {
    Arc::new(
        FakeScanReportProvider::new()
            .with_report(HEAD_PIPELINE, report_with_ids(current))
            .with_report(TARGET_PIPELINE, report_with_ids(&[])),
    )
}

// ============================================================================
// Deny and allow lists
// ============================================================================

#[tokio::test]
#[traced_test]
async fn test_denied_license_violates_rule() {
    let harness = Harness::new();
    harness.add_merge_request(pipeline_mr(1), vec![license_rule(1, 1, 0)]);

    let report = harness
        .service_with_audit(
            reports(&["GPL-3.0"]),
            policies(vec![deny_list(1, &["GPL-3.0"])]),
            Arc::new(TracingAuditSink),
        )
        .execute(project_id(), &pipeline(HEAD_PIPELINE, "success"))
        .await
        .unwrap();

    let sync = report.merge_request(MergeRequestId::new(1)).unwrap().as_ref().unwrap();
    assert_eq!(sync.violated, vec![ApprovalRuleId::new(1)]);
    assert_eq!(harness.required(1, 1).await, 1);
    assert_eq!(harness.violated(1, 1).await, Some(true));
    assert!(logs_contain("Updating MR approval rule"));
    assert!(logs_contain("License rule violated"));
}

#[tokio::test]
async fn test_license_outside_deny_list_satisfies_rule() {
    let harness = Harness::new();
    harness.add_merge_request(pipeline_mr(1), vec![license_rule(1, 1, 2)]);

    harness
        .service(reports(&["MIT"]), policies(vec![deny_list(1, &["GPL-3.0"])]))
        .execute(project_id(), &pipeline(HEAD_PIPELINE, "success"))
        .await
        .unwrap();

    assert_eq!(harness.required(1, 1).await, 0);
    assert_eq!(harness.violated(1, 1).await, Some(false));
    assert!(harness.audit.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_allow_list_violation_needs_unlisted_license() {
    let harness = Harness::new();
    harness.add_merge_request(pipeline_mr(1), vec![license_rule(1, 1, 2)]);
    let allow_mit = policies(vec![allow_list(1, &["MIT"])]);

    harness
        .service(reports(&["MIT"]), allow_mit.clone())
        .execute(project_id(), &pipeline(HEAD_PIPELINE, "success"))
        .await
        .unwrap();
    assert_eq!(harness.violated(1, 1).await, Some(false));
    assert_eq!(harness.required(1, 1).await, 0);

    harness
        .service(reports(&["MIT", "Apache-2.0"]), allow_mit)
        .execute(project_id(), &pipeline(HEAD_PIPELINE, "success"))
        .await
        .unwrap();
    assert_eq!(harness.violated(1, 1).await, Some(true));
    assert_eq!(harness.required(1, 1).await, 2);
}

// ============================================================================
// Rule selection and skipping
// ============================================================================

#[tokio::test]
async fn test_pipeline_without_license_results_is_skipped() {
    let harness = Harness::new();
    harness.add_merge_request(pipeline_mr(1), vec![license_rule(1, 1, 2)]);

    let report = harness
        .service(
            Arc::new(FakeScanReportProvider::new()),
            policies(vec![deny_list(1, &["GPL-3.0"])]),
        )
        .execute(project_id(), &pipeline(HEAD_PIPELINE, "success"))
        .await
        .unwrap();

    assert!(report.no_license_results);
    assert!(report.merge_requests.is_empty());
    assert_eq!(harness.required(1, 1).await, 2);
    assert_eq!(harness.violated(1, 1).await, None);
}

#[tokio::test]
async fn test_non_policy_rules_are_untouched() {
    let harness = Harness::new();
    let regular = ApprovalRule::new(ApprovalRuleId::new(2), "Backend", ApprovalRuleKind::Regular, 3);
    let unlinked = ApprovalRule::new(
        ApprovalRuleId::new(3),
        "License check",
        ApprovalRuleKind::ReportApprover(ReportType::LicenseScanning),
        3,
    );
    harness.add_merge_request(pipeline_mr(1), vec![license_rule(1, 1, 1), regular, unlinked]);

    let report = harness
        .service(reports(&["MIT"]), policies(vec![deny_list(1, &["GPL-3.0"])]))
        .execute(project_id(), &pipeline(HEAD_PIPELINE, "success"))
        .await
        .unwrap();

    let sync = report.merge_request(MergeRequestId::new(1)).unwrap().as_ref().unwrap();
    assert_eq!(sync.unviolated, vec![ApprovalRuleId::new(1)]);
    assert_eq!(harness.required(1, 2).await, 3);
    assert_eq!(harness.required(1, 3).await, 3);
}

#[tokio::test]
#[traced_test]
async fn test_rule_with_missing_policy_is_skipped() {
    let harness = Harness::new();
    harness.add_merge_request(
        pipeline_mr(1),
        vec![license_rule(1, 1, 1), license_rule(2, 99, 1)],
    );

    let report = harness
        .service(reports(&["GPL-3.0"]), policies(vec![deny_list(1, &["GPL-3.0"])]))
        .execute(project_id(), &pipeline(HEAD_PIPELINE, "success"))
        .await
        .unwrap();

    let sync = report.merge_request(MergeRequestId::new(1)).unwrap().as_ref().unwrap();
    assert_eq!(sync.skipped, vec![ApprovalRuleId::new(2)]);
    assert_eq!(harness.required(1, 2).await, 1);
    assert_eq!(harness.violated(1, 99).await, None);
    assert!(logs_contain("Scan result policy not found"));
}

#[tokio::test]
async fn test_license_already_on_target_branch_only_counts_when_detected() {
    let harness = Harness::new();
    harness.add_merge_request(pipeline_mr(1), vec![license_rule(1, 1, 1)]);
    let mut newly_only = deny_list(1, &["GPL-3.0"]);
    newly_only.license_states = vec![LicenseState::NewlyDetected];
    let reports = Arc::new(
        FakeScanReportProvider::new()
            .with_report(HEAD_PIPELINE, report_with_ids(&["GPL-3.0"]))
            .with_report(TARGET_PIPELINE, report_with_ids(&["GPL-3.0"])),
    );

    harness
        .service(reports, policies(vec![newly_only]))
        .execute(project_id(), &pipeline(HEAD_PIPELINE, "success"))
        .await
        .unwrap();

    assert_eq!(harness.violated(1, 1).await, Some(false));
}

// ============================================================================
// Batching
// ============================================================================

#[tokio::test]
async fn test_target_report_is_fetched_once_per_pipeline() {
    let harness = Harness::new();
    harness.add_merge_request(pipeline_mr(1), vec![license_rule(1, 1, 1)]);
    harness.add_merge_request(pipeline_mr(2), vec![license_rule(2, 1, 1)]);
    let reports = reports(&["GPL-3.0"]);

    let report = harness
        .service(reports.clone(), policies(vec![deny_list(1, &["GPL-3.0"])]))
        .execute(project_id(), &pipeline(HEAD_PIPELINE, "success"))
        .await
        .unwrap();

    assert_eq!(report.merge_requests.len(), 2);
    assert_eq!(reports.fetch_count(HEAD_PIPELINE), 1);
    assert_eq!(reports.fetch_count(TARGET_PIPELINE), 1);
    assert_eq!(harness.bot.comments.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_merge_requests_of_other_pipelines_are_ignored() {
    let harness = Harness::new();
    harness.add_merge_request(pipeline_mr(1), vec![license_rule(1, 1, 2)]);
    let mut other = pipeline_mr(2);
    other.head_pipeline = Some(pipeline(11, "success"));
    harness.add_merge_request(other, vec![license_rule(2, 1, 2)]);

    harness
        .service(reports(&["GPL-3.0"]), policies(vec![deny_list(1, &["GPL-3.0"])]))
        .execute(project_id(), &pipeline(HEAD_PIPELINE, "success"))
        .await
        .unwrap();

    assert_eq!(harness.violated(1, 1).await, Some(true));
    assert_eq!(harness.violated(2, 1).await, None);
}

#[tokio::test]
async fn test_no_bot_comment_when_every_rule_is_skipped() {
    let harness = Harness::new();
    harness.add_merge_request(pipeline_mr(1), vec![license_rule(1, 99, 1)]);

    harness
        .service(reports(&["GPL-3.0"]), policies(vec![deny_list(1, &["GPL-3.0"])]))
        .execute(project_id(), &pipeline(HEAD_PIPELINE, "success"))
        .await
        .unwrap();

    assert!(harness.bot.comments.lock().unwrap().is_empty());
}
