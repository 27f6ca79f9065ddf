use super::*;
use crate::test_fixtures::merge_request;
use repository_client::compute_patch_id;
use test_utils::{modified_file, FakeDiffProvider};

#[tokio::test]
async fn test_identical_diffs_share_patch_identity() {
    let diff = vec![modified_file("app/models/user.rb", "old", "new")];
    let resolver = PatchIdentityResolver::new(Arc::new(FakeDiffProvider::new(diff.clone())));

    let first = resolver.compute_patch_id(&merge_request(1, "feature")).await;
    let second = resolver.compute_patch_id(&merge_request(2, "other")).await;

    assert_eq!(first, PatchIdentity::Available(compute_patch_id(&diff)));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_changed_content_changes_patch_identity() {
    let before = PatchIdentityResolver::new(Arc::new(FakeDiffProvider::new(vec![
        modified_file("a.rb", "x", "y"),
    ])));
    let after = PatchIdentityResolver::new(Arc::new(FakeDiffProvider::new(vec![
        modified_file("a.rb", "x", "z"),
    ])));
    let mr = merge_request(1, "feature");

    assert_ne!(
        before.compute_patch_id(&mr).await,
        after.compute_patch_id(&mr).await
    );
}

#[tokio::test]
async fn test_diff_failure_is_unavailable() {
    let resolver = PatchIdentityResolver::new(Arc::new(FakeDiffProvider::failing()));

    let identity = resolver.compute_patch_id(&merge_request(1, "feature")).await;

    assert_eq!(identity, PatchIdentity::Unavailable);
    assert!(identity.sha().is_none());
}

#[tokio::test]
async fn test_missing_diff_base_is_unavailable() {
    let provider = Arc::new(FakeDiffProvider::new(vec![modified_file("a.rb", "x", "y")]));
    let resolver = PatchIdentityResolver::new(provider.clone());
    let mut mr = merge_request(1, "feature");
    mr.diff_base_sha = None;

    assert_eq!(resolver.compute_patch_id(&mr).await, PatchIdentity::Unavailable);
    assert!(provider.calls().is_empty());
}
