use super::*;

fn inventory() -> BranchInventory {
    BranchInventory::new(["feature/login", "release/1.0", "release/2.0", "hotfix"])
        .with_default_branch("main")
        .with_protected("main")
        .with_protected("release/*")
}

fn names(set: BTreeSet<String>) -> Vec<String> {
    set.into_iter().collect()
}

#[test]
fn test_explicit_and_wildcard_branches() {
    let rule = PolicyRule::pipeline(&["main", "release/*"]);

    assert_eq!(
        names(inventory().branches_for_rule(&rule)),
        vec!["main", "release/1.0", "release/2.0"]
    );
}

#[test]
fn test_literal_branch_kept_even_if_missing() {
    let rule = PolicyRule::pipeline(&["staging"]);

    assert_eq!(names(inventory().branches_for_rule(&rule)), vec!["staging"]);
}

#[test]
fn test_branch_type_selection() {
    let mut rule = PolicyRule::pipeline(&[]);

    rule.branch_type = Some(BranchType::Default);
    assert_eq!(names(inventory().branches_for_rule(&rule)), vec!["main"]);

    rule.branch_type = Some(BranchType::Protected);
    assert_eq!(
        names(inventory().branches_for_rule(&rule)),
        vec!["main", "release/1.0", "release/2.0"]
    );

    rule.branch_type = Some(BranchType::All);
    assert_eq!(inventory().branches_for_rule(&rule).len(), 5);
}

#[test]
fn test_branch_exceptions_are_removed() {
    let mut rule = PolicyRule::pipeline(&["release/*"]);
    rule.branch_exceptions = vec!["release/1.*".to_string()];

    assert_eq!(names(inventory().branches_for_rule(&rule)), vec!["release/2.0"]);
}

#[test]
fn test_rule_without_branches_or_type_matches_nothing() {
    let rule = PolicyRule::pipeline(&[]);

    assert!(inventory().branches_for_rule(&rule).is_empty());
}

#[tokio::test]
async fn test_static_resolver_unions_rules() {
    let project = ProjectId::new(1);
    let resolver = StaticBranchResolver::new().with_project(project, inventory());

    let branches = resolver
        .scan_execution_branches(
            project,
            &[PolicyRule::pipeline(&["main"]), PolicyRule::pipeline(&["hotfix"])],
        )
        .await
        .expect("Resolution should succeed");

    assert_eq!(names(branches), vec!["hotfix", "main"]);
}

#[tokio::test]
async fn test_static_resolver_unknown_project_is_empty() {
    let resolver = StaticBranchResolver::new();

    let branches = resolver
        .scan_execution_branches(ProjectId::new(99), &[PolicyRule::pipeline(&["main"])])
        .await
        .expect("Resolution should succeed");

    assert!(branches.is_empty());
}
