//! Helpers for git references and revisions.

#[cfg(test)]
#[path = "git_ref_tests.rs"]
mod tests;

/// The all-zero SHA git uses for "no revision" (branch creation or deletion).
pub const BLANK_SHA: &str = "0000000000000000000000000000000000000000";

const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";

/// Short name of a reference: `refs/heads/main` becomes `main`.
///
/// Names that are not fully qualified are returned unchanged.
pub fn ref_name(reference: &str) -> &str {
    reference
        .strip_prefix(BRANCH_PREFIX)
        .or_else(|| reference.strip_prefix(TAG_PREFIX))
        .unwrap_or(reference)
}

pub fn is_branch_ref(reference: &str) -> bool {
    reference.starts_with(BRANCH_PREFIX)
}

pub fn is_tag_ref(reference: &str) -> bool {
    reference.starts_with(TAG_PREFIX)
}

/// Whether a revision is empty or the blank SHA.
pub fn is_blank_sha(revision: &str) -> bool {
    let trimmed = revision.trim();
    trimmed.is_empty() || trimmed.chars().all(|c| c == '0')
}
