use super::*;
use crate::memory_store::InMemoryStore;
use crate::test_fixtures::{merge_request, RecordingAuditSink, RecordingPolicyBot};
use crate::{ApprovalRuleId, ApprovalRuleKind, ReportType};
use tracing_test::traced_test;

fn license_rule(id: u64, policy: u64) -> ApprovalRule {
    ApprovalRule::new(
        ApprovalRuleId::new(id),
        format!("License rule {}", id),
        ApprovalRuleKind::ReportApprover(ReportType::LicenseScanning),
        1,
    )
    .with_policy(ScanResultPolicyId::new(policy))
}

struct Harness {
    store: Arc<InMemoryStore>,
    audit: Arc<RecordingAuditSink>,
    bot: Arc<RecordingPolicyBot>,
}

impl Harness {
    fn new(bot: RecordingPolicyBot) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            audit: Arc::new(RecordingAuditSink::default()),
            bot: Arc::new(bot),
        }
    }

    fn recorder(&self) -> ViolationRecorder {
        ViolationRecorder::new(self.store.clone(), self.audit.clone(), self.bot.clone())
    }
}

#[tokio::test]
async fn test_record_upserts_audits_and_comments() {
    let harness = Harness::new(RecordingPolicyBot::default());
    let mr = merge_request(1, "feature");

    harness
        .recorder()
        .record(&mr, &[license_rule(10, 1)], &[license_rule(11, 2)])
        .await
        .unwrap();

    let violations = harness.store.violations(mr.id).await.unwrap();
    assert_eq!(violations.len(), 2);
    assert!(violations.iter().any(|v| v.policy_id == ScanResultPolicyId::new(1) && v.violated));
    assert!(violations.iter().any(|v| v.policy_id == ScanResultPolicyId::new(2) && !v.violated));

    let entries = harness.audit.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].approval_rule_id, ApprovalRuleId::new(10));
    assert_eq!(entries[0].merge_request_iid, mr.iid);
    assert_eq!(entries[0].project_path, "acme/widgets");

    let comments = harness.bot.comments.lock().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].violated_policy_ids, vec![ScanResultPolicyId::new(1)]);
}

#[tokio::test]
async fn test_record_is_idempotent() {
    let harness = Harness::new(RecordingPolicyBot::default());
    let mr = merge_request(1, "feature");
    let recorder = harness.recorder();

    for _ in 0..3 {
        recorder
            .record(&mr, &[license_rule(10, 1)], &[])
            .await
            .unwrap();
    }

    assert_eq!(harness.store.violations(mr.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_policy_shared_by_violated_and_unviolated_rules_is_violated() {
    let harness = Harness::new(RecordingPolicyBot::default());
    let mr = merge_request(1, "feature");

    harness
        .recorder()
        .record(&mr, &[license_rule(10, 1)], &[license_rule(11, 1)])
        .await
        .unwrap();

    let violations = harness.store.violations(mr.id).await.unwrap();
    assert_eq!(violations.len(), 1);
    assert!(violations[0].violated);
}

#[tokio::test]
#[traced_test]
async fn test_comment_delivery_failure_is_swallowed() {
    let harness = Harness::new(RecordingPolicyBot::failing());
    let mr = merge_request(1, "feature");

    let result = harness
        .recorder()
        .record(&mr, &[license_rule(10, 1)], &[])
        .await;

    assert!(result.is_ok());
    assert!(logs_contain("Policy bot comment delivery failed"));
    assert_eq!(harness.store.violations(mr.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_comments_can_be_disabled() {
    let harness = Harness::new(RecordingPolicyBot::default());
    let mr = merge_request(1, "feature");

    harness
        .recorder()
        .with_policy_bot_comments(false)
        .record(&mr, &[license_rule(10, 1)], &[])
        .await
        .unwrap();

    assert!(harness.bot.comments.lock().unwrap().is_empty());
    assert_eq!(harness.audit.entries.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_comments_follow_evaluation_config() {
    let harness = Harness::new(RecordingPolicyBot::default());
    let mr = merge_request(1, "feature");
    let config = EvaluationConfig::from_toml_str("policy_bot_comments = false").unwrap();

    ViolationRecorder::from_config(
        harness.store.clone(),
        harness.audit.clone(),
        harness.bot.clone(),
        &config,
    )
    .record(&mr, &[license_rule(10, 1)], &[])
    .await
    .unwrap();

    assert!(harness.bot.comments.lock().unwrap().is_empty());
    assert_eq!(harness.store.violations(mr.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_no_comment_without_evaluated_rules() {
    let harness = Harness::new(RecordingPolicyBot::default());
    let mr = merge_request(1, "feature");

    harness.recorder().record(&mr, &[], &[]).await.unwrap();

    assert!(harness.bot.comments.lock().unwrap().is_empty());
    assert!(harness.store.violations(mr.id).await.unwrap().is_empty());
}
