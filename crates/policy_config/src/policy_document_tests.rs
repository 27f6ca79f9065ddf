//! Tests for policy documents and the static configuration store.

use super::*;
use crate::{LicenseState, ScanType};
use std::io::Write;

const DOCUMENT: &str = r#"
[[projects]]
project_id = 1

[[projects.scan_result_policies]]
id = 10
license_states = ["newly_detected"]
match_on_inclusion = true

[[projects.scan_result_policies.license_policies]]
spdx_identifier = "GPL-3.0"

[[projects.scan_result_policies]]
id = 11
license_states = ["detected"]
match_on_inclusion = false
approvals_required = 2

[[projects.scan_result_policies.license_policies]]
spdx_identifier = "MIT"

[[projects.scan_execution_policies]]
name = "Enforce SAST"
enabled = true
rules = [{ type = "pipeline", branches = ["main"] }]
actions = [{ scan = "sast" }]

[[projects]]
project_id = 2
"#;

#[test]
fn test_parse_document() {
    let document = PolicyDocument::from_toml_str(DOCUMENT).unwrap();

    assert_eq!(document.projects.len(), 2);
    let first = &document.projects[0];
    assert_eq!(first.scan_result_policies.len(), 2);
    assert_eq!(
        first.scan_result_policies[0].license_states,
        vec![LicenseState::NewlyDetected]
    );
    assert_eq!(first.scan_result_policies[1].approvals_required, 2);
    assert_eq!(
        first.scan_execution_policies[0].actions[0].scan,
        ScanType::Sast
    );
    assert!(document.projects[1].scan_result_policies.is_empty());
}

#[test]
fn test_duplicate_projects_rejected() {
    let result = PolicyDocument::from_toml_str(
        r#"
[[projects]]
project_id = 1

[[projects]]
project_id = 1
"#,
    );

    assert!(matches!(
        result,
        Err(ConfigurationError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_duplicate_policy_ids_rejected() {
    let result = PolicyDocument::from_toml_str(
        r#"
[[projects]]
project_id = 1

[[projects.scan_result_policies]]
id = 3
license_states = ["detected"]
match_on_inclusion = false

[[projects.scan_result_policies]]
id = 3
license_states = ["detected"]
match_on_inclusion = false
"#,
    );

    match result {
        Err(ConfigurationError::InvalidConfiguration { reason, .. }) => {
            assert!(reason.contains("policy id 3"));
        }
        other => panic!("Expected InvalidConfiguration, got {:?}", other),
    }
}

#[test]
fn test_incomplete_policy_is_loaded_for_later_skipping() {
    let document = PolicyDocument::from_toml_str(
        r#"
[[projects]]
project_id = 1

[[projects.scan_result_policies]]
id = 3
license_states = ["detected"]
match_on_inclusion = true
"#,
    )
    .unwrap();

    assert!(document.projects[0].scan_result_policies[0]
        .validate()
        .is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(DOCUMENT.as_bytes()).unwrap();

    let document = PolicyDocument::load(file.path()).unwrap();

    assert_eq!(document.projects.len(), 2);
}

#[tokio::test]
async fn test_static_store_lookups() {
    let store = StaticPolicyConfiguration::from(PolicyDocument::from_toml_str(DOCUMENT).unwrap());
    let project = ProjectId::new(1);

    let policy = store
        .scan_result_policy(project, ScanResultPolicyId::new(11))
        .await
        .unwrap()
        .unwrap();
    assert!(!policy.match_on_inclusion);

    let all = store.scan_result_policies(project).await.unwrap();
    assert_eq!(all.len(), 2);

    let execution = store.scan_execution_policies(project).await.unwrap();
    assert_eq!(execution.active_policies().len(), 1);
}

#[tokio::test]
async fn test_static_store_unknown_project_is_empty() {
    let store = StaticPolicyConfiguration::default();
    let project = ProjectId::new(99);

    assert!(store
        .scan_result_policy(project, ScanResultPolicyId::new(1))
        .await
        .unwrap()
        .is_none());
    assert!(store.scan_result_policies(project).await.unwrap().is_empty());
    assert!(store
        .scan_execution_policies(project)
        .await
        .unwrap()
        .policies()
        .is_empty());
}
