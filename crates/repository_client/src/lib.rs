//! Repository collaborators consumed by the approval engine.
//!
//! The engine never touches git storage, CI, or scanners directly. It reaches
//! them through the narrow traits defined here:
//!
//! - [`DiffProvider`] - diffs between two revisions, and the patch id of a diff
//! - [`CodeOwnersProvider`] - CODEOWNERS entries as of a revision
//! - [`ScanReportProvider`] - license scan reports of a pipeline
//! - [`BranchResolver`] - branches targeted by scan execution policy rules
//!
//! The crate also carries the data those traits exchange and the pure helpers
//! behind them (CODEOWNERS parsing, patch id hashing, ref names).

use std::collections::BTreeSet;

use async_trait::async_trait;
use policy_config::{PolicyRule, ProjectId};

pub mod branches;
pub mod codeowners;
pub mod errors;
pub mod git_ref;
pub mod license_report;
pub mod models;
pub mod patch_id;

pub use branches::{BranchInventory, StaticBranchResolver};
pub use codeowners::{CodeOwnerPattern, CodeOwnerRule, CodeOwnersFile};
pub use errors::Error;
pub use git_ref::{is_blank_sha, is_branch_ref, is_tag_ref, ref_name, BLANK_SHA};
pub use license_report::{Dependency, License, LicenseReportDiff, LicenseScanReport};
pub use models::{
    ChangeType, CodeOwnerEntry, DetailedStatus, DiffEntry, PipelineId, PipelineRef,
    PipelineStatus, UserId, DEFAULT_SECTION,
};
pub use patch_id::{compute_patch_id, PatchIdSha};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Access to repository diffs.
#[async_trait]
pub trait DiffProvider: Send + Sync {
    /// Computes the diff between two revisions of a project.
    ///
    /// # Errors
    ///
    /// Returns `Error::RevisionNotFound` when either revision cannot be
    /// resolved, or `Error::RepositoryUnavailable` when storage cannot be read.
    async fn compute_diff(
        &self,
        project: ProjectId,
        from: &str,
        to: &str,
    ) -> Result<Vec<DiffEntry>, Error>;

    /// Patch id of a diff. Implementations backed by git may override this
    /// with `git patch-id`; the result must stay content-only.
    fn patch_id(&self, diff: &[DiffEntry]) -> PatchIdSha {
        compute_patch_id(diff)
    }
}

/// Access to CODEOWNERS definitions.
#[async_trait]
pub trait CodeOwnersProvider: Send + Sync {
    /// Entries of the CODEOWNERS file at `revision`, empty when the project has
    /// no CODEOWNERS file.
    async fn owners_at(
        &self,
        project: ProjectId,
        revision: &str,
    ) -> Result<Vec<CodeOwnerEntry>, Error>;
}

/// Access to pipeline scan reports.
#[async_trait]
pub trait ScanReportProvider: Send + Sync {
    /// License scan report of a pipeline; `Ok(None)` when the pipeline produced
    /// no license results.
    async fn license_report(
        &self,
        project: ProjectId,
        pipeline: PipelineId,
    ) -> Result<Option<LicenseScanReport>, Error>;
}

/// Resolution of the branches a set of policy rules applies to.
#[async_trait]
pub trait BranchResolver: Send + Sync {
    async fn scan_execution_branches(
        &self,
        project: ProjectId,
        rules: &[PolicyRule],
    ) -> Result<BTreeSet<String>, Error>;
}
