//! # Models
//!
//! Data exchanged with repository collaborators: user and pipeline identifiers,
//! diff entries, code owner entries, and pipeline status.
//!
//! These types are serializable so collaborator implementations can hand them
//! over from JSON payloads without intermediate structs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::codeowners::CodeOwnerPattern;

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

/// Identifier of a user account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a CI pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PipelineId(u64);

impl PipelineId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a file changed within a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
            ChangeType::Renamed => "renamed",
        }
    }
}

/// One file of a diff between two revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Path before the change; only differs from `new_path` for renames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,

    pub new_path: String,

    pub change_type: ChangeType,

    /// Unified diff text for this file.
    #[serde(default)]
    pub patch: String,
}

impl DiffEntry {
    pub fn new(path: impl Into<String>, change_type: ChangeType, patch: impl Into<String>) -> Self {
        Self {
            old_path: None,
            new_path: path.into(),
            change_type,
            patch: patch.into(),
        }
    }

    /// Paths touched by this entry (both sides of a rename).
    pub fn touched_paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.new_path.as_str()).chain(
            self.old_path
                .as_deref()
                .filter(|old| *old != self.new_path),
        )
    }
}

/// A CODEOWNERS entry as of one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeOwnerEntry {
    /// The pattern as written in the CODEOWNERS file; also the name of the
    /// code owner approval rule generated for it.
    pub pattern: String,

    /// Section the entry belongs to.
    #[serde(default = "default_section")]
    pub section: String,

    /// Users eligible to approve on behalf of this entry.
    #[serde(default)]
    pub approvers: BTreeSet<UserId>,
}

/// Name of the implicit section entries belong to before any header.
pub const DEFAULT_SECTION: &str = "codeowners";

fn default_section() -> String {
    DEFAULT_SECTION.to_string()
}

impl CodeOwnerEntry {
    pub fn new(pattern: impl Into<String>, approvers: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            pattern: pattern.into(),
            section: default_section(),
            approvers: approvers.into_iter().collect(),
        }
    }

    /// Whether the entry's pattern matches a repository path.
    pub fn matches_path(&self, path: &str) -> bool {
        CodeOwnerPattern::new(&self.pattern).matches(path)
    }
}

/// A CI/CD status in one of its two representations.
///
/// Older producers report a bare status string; newer ones send a detailed
/// status object. The representation is decided once at deserialization and
/// consumers only ever go through the accessors below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineStatus {
    Detailed(DetailedStatus),
    Legacy(String),
}

/// Presentation-ready status as produced by newer status producers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedStatus {
    pub text: String,
    pub group: String,
    pub label: String,
    pub icon: String,
}

const COMPLETE_GROUPS: [&str; 5] = [
    "success",
    "success-with-warnings",
    "failed",
    "canceled",
    "skipped",
];

impl PipelineStatus {
    /// Status group, e.g. `success` or `success-with-warnings`.
    pub fn group(&self) -> String {
        match self {
            PipelineStatus::Detailed(status) => status.group.clone(),
            PipelineStatus::Legacy(status) => status.replace('_', "-"),
        }
    }

    /// Human readable label.
    pub fn label(&self) -> String {
        match self {
            PipelineStatus::Detailed(status) => status.label.clone(),
            PipelineStatus::Legacy(status) => match status.as_str() {
                "success" => "passed".to_string(),
                "success-with-warnings" => "passed with warnings".to_string(),
                "manual" => "waiting for manual action".to_string(),
                "scheduled" => "waiting for delayed job".to_string(),
                other => other.to_string(),
            },
        }
    }

    /// Icon name for the status.
    pub fn icon(&self) -> String {
        match self {
            PipelineStatus::Detailed(status) => status.icon.clone(),
            PipelineStatus::Legacy(status) => match status.as_str() {
                "success" => "status_success",
                "success-with-warnings" => "status_warning",
                "failed" => "status_failed",
                "pending" | "waiting-for-resource" => "status_pending",
                "preparing" => "status_preparing",
                "running" => "status_running",
                "play" => "play",
                "created" => "status_created",
                "skipped" => "status_skipped",
                "manual" => "status_manual",
                "scheduled" => "status_scheduled",
                _ => "status_canceled",
            }
            .to_string(),
        }
    }

    /// Whether the pipeline has finished running.
    pub fn is_complete(&self) -> bool {
        let group = self.group();
        COMPLETE_GROUPS.contains(&group.as_str())
    }
}

/// A pipeline together with its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub id: PipelineId,
    pub sha: String,
    pub status: PipelineStatus,
}
