//! Content-stable patch identifiers.
//!
//! A patch id identifies the *change* a diff makes rather than the commits it
//! was made in. Rebasing a branch or squashing its commits yields the same patch
//! id as long as the added and removed lines are unchanged, which lets the
//! engine keep approvals given for an identical diff.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::DiffEntry;

#[cfg(test)]
#[path = "patch_id_tests.rs"]
mod tests;

/// Hex-encoded patch id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchIdSha(String);

impl PatchIdSha {
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PatchIdSha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn hunk_header() -> Option<&'static Regex> {
    static HUNK_HEADER: OnceLock<Option<Regex>> = OnceLock::new();
    HUNK_HEADER
        .get_or_init(|| Regex::new(r"^@@ -\d+(,\d+)? \+\d+(,\d+)? @@").ok())
        .as_ref()
}

/// Computes the patch id of a diff.
///
/// The changed paths (both sides of a rename), their change types, and the
/// added and removed lines contribute. Hunk positions, context lines, file
/// headers, and trailing whitespace do not, so the id survives rebases onto a
/// moved base.
pub fn compute_patch_id(diff: &[DiffEntry]) -> PatchIdSha {
    let mut entries: Vec<&DiffEntry> = diff.iter().collect();
    entries.sort_by(|a, b| {
        a.new_path
            .cmp(&b.new_path)
            .then_with(|| a.old_path.cmp(&b.old_path))
    });

    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(entry.new_path.as_bytes());
        hasher.update([0u8]);
        if let Some(old_path) = entry.old_path.as_deref() {
            hasher.update(old_path.as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(entry.change_type.as_str().as_bytes());
        hasher.update([0u8]);

        // Header lines only occur before the first hunk of a file section.
        let mut in_hunk = false;
        for line in entry.patch.lines() {
            if is_hunk_header(line) {
                in_hunk = true;
                continue;
            }
            if line.starts_with("diff ") {
                in_hunk = false;
                continue;
            }
            if !in_hunk && is_file_header(line) {
                continue;
            }
            let (marker, body) = match line.chars().next() {
                Some(marker @ ('+' | '-')) => (marker, &line[1..]),
                _ => continue,
            };
            hasher.update([marker as u8]);
            hasher.update(body.trim_end().as_bytes());
            hasher.update([b'\n']);
        }
    }

    PatchIdSha(hex::encode(hasher.finalize()))
}

fn is_hunk_header(line: &str) -> bool {
    line.starts_with("@@") && hunk_header().map(|re| re.is_match(line)).unwrap_or(true)
}

fn is_file_header(line: &str) -> bool {
    line.starts_with("index ") || line.starts_with("--- ") || line.starts_with("+++ ")
}
