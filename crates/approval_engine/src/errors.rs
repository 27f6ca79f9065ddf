//! Error types for the approval engine.
//!
//! The engine distinguishes errors that fail a single merge request
//! (persistence), errors that degrade to a conservative default (diffs, invalid
//! policies), and errors that are only logged (notification delivery).

use policy_config::ConfigurationError;
use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors raised while evaluating or applying approval changes.
#[derive(Error, Debug)]
pub enum ApprovalEngineError {
    /// The diff of a merge request could not be computed.
    ///
    /// Callers treat this as "content changed": no approval is retained on the
    /// strength of a patch id that could not be verified.
    #[error("Diff unavailable for merge request {merge_request_id}: {reason}")]
    DiffUnavailable { merge_request_id: u64, reason: String },

    /// A scan result policy cannot be evaluated as configured.
    #[error("Invalid policy configuration for policy {policy_id}: {reason}")]
    InvalidPolicyConfiguration { policy_id: u64, reason: String },

    /// Reading or writing approval state failed.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    /// A notification or comment could not be delivered.
    #[error("Notification delivery failed on {channel}: {reason}")]
    NotificationDelivery { channel: String, reason: String },

    /// Planning for a merge request exceeded its time budget.
    #[error("Evaluation of merge request {merge_request_id} deferred after {timeout_ms}ms")]
    EvaluationDeferred { merge_request_id: u64, timeout_ms: u64 },

    #[error("Repository collaborator error: {0}")]
    Repository(#[from] repository_client::Error),

    #[error("Policy configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl ApprovalEngineError {
    /// Creates a `NotificationDelivery` error.
    pub fn notification(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotificationDelivery {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    /// Whether redelivering the triggering event may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EvaluationDeferred { .. } => true,
            Self::Persistence(PersistenceError::Unavailable { .. }) => true,
            Self::Repository(repository_client::Error::RepositoryUnavailable { .. }) => true,
            Self::Repository(repository_client::Error::ReportUnavailable { .. }) => true,
            _ => false,
        }
    }
}

/// Errors raised by approval and violation stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The user already approved the merge request.
    #[error("User {user_id} already approved merge request {merge_request_id}")]
    DuplicateApproval { merge_request_id: u64, user_id: u64 },

    #[error("Merge request {merge_request_id} not found")]
    MergeRequestNotFound { merge_request_id: u64 },

    #[error("Approval rule {rule_id} not found")]
    ApprovalRuleNotFound { rule_id: u64 },

    /// The backing store could not be reached.
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl PersistenceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, ApprovalEngineError>;
