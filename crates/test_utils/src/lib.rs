//! Test utilities for approval engine tests.
//!
//! This crate provides fake repository collaborators with call recording and
//! failure injection, plus builders for license reports and revisions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use policy_config::ProjectId;
use repository_client::{
    ChangeType, CodeOwnerEntry, CodeOwnersFile, CodeOwnersProvider, DiffEntry, DiffProvider,
    Error, License, LicenseScanReport, PipelineId, ScanReportProvider, UserId,
};
use tracing::debug;
use uuid::Uuid;

/// Generate a random 40 character revision id.
///
/// # Examples
///
/// ```
/// use test_utils::random_sha;
///
/// let sha = random_sha();
/// assert_eq!(sha.len(), 40);
/// ```
pub fn random_sha() -> String {
    let mut sha = Uuid::new_v4().simple().to_string();
    sha.push_str(&Uuid::new_v4().simple().to_string()[..8]);
    sha
}

/// A modified-file diff entry adding `added` and removing `removed`.
pub fn modified_file(path: &str, removed: &str, added: &str) -> DiffEntry {
    DiffEntry::new(
        path,
        ChangeType::Modified,
        format!("@@ -1 +1 @@\n-{}\n+{}\n", removed, added),
    )
}

/// A license with an optional SPDX id carried by `dependencies`.
pub fn license(id: Option<&str>, name: &str, dependencies: &[&str]) -> License {
    dependencies
        .iter()
        .fold(License::new(id, name), |license, dep| license.with_dependency(*dep))
}

/// A report from SPDX ids, each carried by one dependency named after it.
pub fn report_with_ids(ids: &[&str]) -> LicenseScanReport {
    LicenseScanReport::new(
        ids.iter()
            .map(|&id| {
                let dependency = format!("{}-dep", id.to_lowercase());
                license(Some(id), id, &[dependency.as_str()])
            })
            .collect(),
    )
}

/// Fake [`DiffProvider`].
///
/// Diffs are looked up by `(from, to)`; unknown ranges return the default diff.
/// Calls are recorded so tests can assert which ranges were requested.
#[derive(Default, Clone)]
pub struct FakeDiffProvider {
    default_diff: Vec<DiffEntry>,
    ranges: HashMap<(String, String), Vec<DiffEntry>>,
    fail: bool,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeDiffProvider {
    pub fn new(default_diff: Vec<DiffEntry>) -> Self {
        Self {
            default_diff,
            ..Self::default()
        }
    }

    /// A provider whose every call fails with `RevisionNotFound`.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_range(mut self, from: &str, to: &str, diff: Vec<DiffEntry>) -> Self {
        self.ranges.insert((from.to_string(), to.to_string()), diff);
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DiffProvider for FakeDiffProvider {
    async fn compute_diff(
        &self,
        project: ProjectId,
        from: &str,
        to: &str,
    ) -> Result<Vec<DiffEntry>, Error> {
        debug!(project_id = project.value(), from = from, to = to, "Fake diff requested");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((from.to_string(), to.to_string()));
        }

        if self.fail {
            return Err(Error::RevisionNotFound {
                revision: from.to_string(),
            });
        }

        Ok(self
            .ranges
            .get(&(from.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_else(|| self.default_diff.clone()))
    }
}

/// Fake [`CodeOwnersProvider`] returning the same entries for every revision.
#[derive(Default, Clone)]
pub struct FakeCodeOwnersProvider {
    entries: Vec<CodeOwnerEntry>,
    fail: bool,
}

impl FakeCodeOwnersProvider {
    pub fn new(entries: Vec<CodeOwnerEntry>) -> Self {
        Self {
            entries,
            fail: false,
        }
    }

    /// Builds the entries by parsing CODEOWNERS `content`, resolving `@name`
    /// owners through `users`.
    pub fn from_codeowners(content: &str, users: &[(&str, u64)]) -> Result<Self> {
        let file = CodeOwnersFile::parse(content).context("Failed to parse CODEOWNERS fixture")?;
        let users: HashMap<String, UserId> = users
            .iter()
            .map(|(name, id)| (format!("@{}", name), UserId::new(*id)))
            .collect();

        Ok(Self::new(file.to_entries(|owner| users.get(owner).copied())))
    }

    pub fn failing() -> Self {
        Self {
            entries: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl CodeOwnersProvider for FakeCodeOwnersProvider {
    async fn owners_at(
        &self,
        project: ProjectId,
        revision: &str,
    ) -> Result<Vec<CodeOwnerEntry>, Error> {
        if self.fail {
            return Err(Error::RepositoryUnavailable {
                project_id: project.value(),
                reason: format!("CODEOWNERS unreadable at {}", revision),
            });
        }
        Ok(self.entries.clone())
    }
}

/// Fake [`ScanReportProvider`] keyed by pipeline.
#[derive(Default, Clone)]
pub struct FakeScanReportProvider {
    reports: HashMap<PipelineId, LicenseScanReport>,
    calls: Arc<Mutex<Vec<PipelineId>>>,
}

impl FakeScanReportProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(mut self, pipeline: u64, report: LicenseScanReport) -> Self {
        self.reports.insert(PipelineId::new(pipeline), report);
        self
    }

    /// Number of report fetches per pipeline.
    pub fn fetch_count(&self, pipeline: u64) -> usize {
        self.calls
            .lock()
            .map(|calls| {
                calls
                    .iter()
                    .filter(|p| **p == PipelineId::new(pipeline))
                    .count()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ScanReportProvider for FakeScanReportProvider {
    async fn license_report(
        &self,
        _project: ProjectId,
        pipeline: PipelineId,
    ) -> Result<Option<LicenseScanReport>, Error> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(pipeline);
        }
        Ok(self.reports.get(&pipeline).cloned())
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
