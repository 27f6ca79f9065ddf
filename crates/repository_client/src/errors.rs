//! Error types for repository collaborator operations.
//!
//! This module defines the errors that diff, CODEOWNERS, scan report, and branch
//! providers report back to the approval engine. The engine decides per call site
//! whether an error degrades to a conservative default or fails the merge request.

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that can occur while talking to repository collaborators.
///
/// ## Examples
///
/// ```rust,ignore
/// use repository_client::Error;
///
/// match diff_provider.compute_diff(project, base, head).await {
///     Ok(diff) => println!("{} files changed", diff.len()),
///     Err(Error::RevisionNotFound { revision }) => eprintln!("missing {}", revision),
///     Err(err) => eprintln!("Other error: {}", err),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A revision could not be resolved in the repository.
    ///
    /// This occurs when a branch was force-pushed away, a commit was garbage
    /// collected, or the revision string was never valid.
    #[error("Revision not found: {revision}")]
    RevisionNotFound { revision: String },

    /// The repository storage could not be reached or read.
    #[error("Repository {project_id} unavailable: {reason}")]
    RepositoryUnavailable { project_id: u64, reason: String },

    /// A pipeline's scan report could not be fetched.
    ///
    /// A report that simply does not exist is not an error; providers return
    /// `Ok(None)` for that case.
    #[error("Scan report for pipeline {pipeline_id} unavailable: {reason}")]
    ReportUnavailable { pipeline_id: u64, reason: String },

    /// A CODEOWNERS definition could not be parsed.
    #[error("Invalid CODEOWNERS entry on line {line}: {reason}")]
    InvalidCodeOwners { line: usize, reason: String },

    /// A collaborator payload could not be deserialized.
    #[error("Failed to deserialize collaborator response: {0}")]
    Deserialization(#[from] serde_json::Error),
}
