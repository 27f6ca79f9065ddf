//! Approval reset and policy violation engine.
//!
//! Two event handlers sit on top of a set of resolvers and stores:
//!
//! - [`ApprovalResetEngine`] reacts to a push on a branch and decides, per
//!   merge request using that branch as its source, which approvals survive.
//! - [`SyncLicenseScanningRulesService`] reacts to a finished pipeline and
//!   re-evaluates the license scan result policies of the merge requests whose
//!   head pipeline it is.
//!
//! Collaborators (diffs, CODEOWNERS, scan reports, branch resolution, policy
//! configuration, persistence, notifications) are injected as trait objects,
//! so both handlers are `Send + Sync` and hold no global state.

pub mod approval;
pub mod code_ownership;
pub mod errors;
pub mod license_evaluator;
pub mod license_sync;
pub mod locks;
pub mod memory_store;
pub mod merge_request;
pub mod metrics;
pub mod notifications;
pub mod patch_identity;
pub mod report_cache;
pub mod reset_engine;
pub mod scan_execution;
pub mod store;
pub mod violation_recorder;

#[cfg(test)]
mod test_fixtures;

pub use approval::{
    clamp_required, Approval, ApprovalId, ApprovalRule, ApprovalRuleId, ApprovalRuleKind,
    PolicyViolation, ReportType,
};
pub use code_ownership::CodeOwnershipResolver;
pub use errors::{ApprovalEngineError, EngineResult, PersistenceError};
pub use license_evaluator::{evaluate_license_policy, PolicyEvaluation};
pub use license_sync::{LicenseSyncReport, MergeRequestRuleSync, SyncLicenseScanningRulesService};
pub use locks::MergeRequestLocks;
pub use memory_store::InMemoryStore;
pub use merge_request::{
    MergeRequest, MergeRequestId, MergeRequestIid, MergeRequestState, Project,
    ProjectApprovalSettings, RESETTABLE_STATES,
};
pub use metrics::{NoOpResetMetrics, PrometheusResetMetrics, ResetMetrics};
pub use notifications::{
    AuditLogEntry, AuditSink, EventNotifier, LoggingEventNotifier, MergeRequestEvent,
    PolicyBotComment, PolicyBotNotifier, TracingAuditSink, ViolationReportType,
};
pub use patch_identity::{PatchIdentity, PatchIdentityResolver};
pub use report_cache::ReportCache;
pub use reset_engine::{
    ApprovalResetEngine, BranchUpdateEvent, BranchUpdateReport, MergeRequestOutcome,
    ResetTransition,
};
pub use scan_execution::ScanExecutionEvaluator;
pub use store::{ApprovalResetPlan, ApprovalStore, PolicyViolationStore, RequiredApprovalsUpdate};
pub use violation_recorder::ViolationRecorder;
