use super::*;

fn report(licenses: Vec<License>) -> LicenseScanReport {
    LicenseScanReport::new(licenses)
}

#[test]
fn test_names_ids_and_dependencies() {
    let report = report(vec![
        License::new(Some("MIT"), "MIT License")
            .with_dependency("rails")
            .with_dependency("rack"),
        License::new(None, "Custom").with_dependency("internal-gem"),
    ]);

    assert_eq!(report.license_names(), vec!["MIT License", "Custom"]);
    assert_eq!(report.license_ids(), vec!["MIT"]);
    assert_eq!(
        report.dependency_names().into_iter().collect::<Vec<_>>(),
        vec!["internal-gem", "rack", "rails"]
    );
}

#[test]
fn test_canonical_key_prefers_id_and_ignores_case() {
    assert_eq!(License::new(Some("GPL-3.0"), "GNU GPL").canonical_key(), "gpl-3.0");
    assert_eq!(License::new(None, "Custom License").canonical_key(), "custom license");
    assert_eq!(License::new(Some(""), "Blank Id").canonical_key(), "blank id");
}

#[test]
fn test_diff_with_reports_added_and_removed() {
    let target = report(vec![
        License::new(Some("MIT"), "MIT License"),
        License::new(Some("BSD-3-Clause"), "BSD"),
    ]);
    let source = report(vec![
        License::new(Some("mit"), "MIT License"),
        License::new(Some("GPL-3.0"), "GNU GPL"),
    ]);

    let diff = target.diff_with(&source);

    assert_eq!(diff.added.len(), 1);
    assert_eq!(diff.added[0].id.as_deref(), Some("GPL-3.0"));
    assert_eq!(diff.removed.len(), 1);
    assert_eq!(diff.removed[0].id.as_deref(), Some("BSD-3-Clause"));
}

#[test]
fn test_diff_with_empty_baseline_adds_everything() {
    let source = report(vec![
        License::new(Some("MIT"), "MIT License"),
        License::new(Some("Apache-2.0"), "Apache"),
    ]);

    let diff = LicenseScanReport::empty().diff_with(&source);

    assert_eq!(diff.added.len(), 2);
    assert!(diff.removed.is_empty());
}

#[test]
fn test_report_deserializes_from_json() {
    let report: LicenseScanReport = serde_json::from_str(
        r#"{"licenses": [{"id": "MIT", "name": "MIT", "dependencies": [{"name": "foo", "version": "1.0"}]}]}"#,
    )
    .unwrap();

    assert_eq!(report.licenses().len(), 1);
    assert_eq!(report.licenses()[0].dependencies[0].version.as_deref(), Some("1.0"));
    assert!(!report.is_empty());
}
