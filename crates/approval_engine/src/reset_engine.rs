//! Approval resets triggered by pushes.
//!
//! For every open or closed merge request whose source branch received the
//! push, the engine plans which approvals to delete and applies the plan in a
//! single store call:
//!
//! 1. `skip_reset_checks` deletes every approval unconditionally.
//! 2. A push of the merge request's own rebase commit changes nothing.
//! 3. Projects without reset-on-push or selective code owner removals keep
//!    their approvals.
//! 4. Approvals recorded for the current patch id survive (when patch id
//!    awareness is enabled).
//! 5. Reset-on-push deletes the remaining approvals; selective removal deletes
//!    only approvals given through code owner rules covering changed files.
//!
//! Every evaluated merge request then gets one merge status notification and
//! one approval state notification.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use policy_config::{EvaluationConfig, ProjectId};
use repository_client::{is_tag_ref, ref_name, PatchIdSha, UserId};
use tracing::{debug, error, info, instrument, warn};

use crate::code_ownership::CodeOwnershipResolver;
use crate::locks::MergeRequestLocks;
use crate::metrics::{NoOpResetMetrics, ResetMetrics};
use crate::notifications::{EventNotifier, MergeRequestEvent};
use crate::patch_identity::{PatchIdentity, PatchIdentityResolver};
use crate::store::{ApprovalResetPlan, ApprovalStore};
use crate::{
    Approval, ApprovalEngineError, ApprovalId, EngineResult, MergeRequest, MergeRequestId,
    RESETTABLE_STATES,
};

#[cfg(test)]
#[path = "reset_engine_tests.rs"]
mod tests;

/// A push to a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchUpdateEvent {
    pub project: ProjectId,

    /// Pushed reference, either fully qualified (`refs/heads/feature`) or a
    /// bare branch name.
    pub reference: String,

    /// Revision before the push; blank when the branch was created.
    pub old_revision: String,

    pub new_revision: String,

    /// Delete all approvals without evaluating patch ids or code owners.
    pub skip_reset_checks: bool,
}

impl BranchUpdateEvent {
    pub fn new(
        project: ProjectId,
        reference: impl Into<String>,
        old_revision: impl Into<String>,
        new_revision: impl Into<String>,
    ) -> Self {
        Self {
            project,
            reference: reference.into(),
            old_revision: old_revision.into(),
            new_revision: new_revision.into(),
            skip_reset_checks: false,
        }
    }

    pub fn with_skip_reset_checks(mut self, skip: bool) -> Self {
        self.skip_reset_checks = skip;
        self
    }

    pub fn branch(&self) -> &str {
        ref_name(&self.reference)
    }
}

/// What a reset did to a merge request's approvals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTransition {
    Retained,
    PartiallyReset,
    FullyReset,
}

impl ResetTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetTransition::Retained => "retained",
            ResetTransition::PartiallyReset => "partially_reset",
            ResetTransition::FullyReset => "fully_reset",
        }
    }
}

/// Result of handling one merge request.
#[derive(Debug)]
pub enum MergeRequestOutcome {
    /// The merge request does not use the pushed branch as its source.
    Skipped,

    Evaluated {
        transition: ResetTransition,
        /// Approvals actually deleted.
        removed: usize,
    },

    /// Planning exceeded the configured timeout; nothing was applied.
    Deferred(ApprovalEngineError),

    /// Loading or writing approval state failed; nothing was applied.
    Failed(ApprovalEngineError),
}

impl MergeRequestOutcome {
    fn label(&self) -> &'static str {
        match self {
            MergeRequestOutcome::Skipped => "skipped",
            MergeRequestOutcome::Evaluated { transition, .. } => transition.as_str(),
            MergeRequestOutcome::Deferred(_) => "deferred",
            MergeRequestOutcome::Failed(_) => "failed",
        }
    }
}

/// Per merge request outcomes of one branch update, in processing order.
#[derive(Debug, Default)]
pub struct BranchUpdateReport {
    pub outcomes: Vec<(MergeRequestId, MergeRequestOutcome)>,
}

impl BranchUpdateReport {
    pub fn outcome(&self, merge_request: MergeRequestId) -> Option<&MergeRequestOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == merge_request)
            .map(|(_, outcome)| outcome)
    }

    pub fn approvals_removed(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                MergeRequestOutcome::Evaluated { removed, .. } => *removed,
                _ => 0,
            })
            .sum()
    }

    /// Whether redelivering the event could make progress on some merge
    /// request.
    pub fn needs_retry(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| match outcome {
            MergeRequestOutcome::Deferred(e) | MergeRequestOutcome::Failed(e) => e.is_retryable(),
            _ => false,
        })
    }
}

/// Resets merge request approvals in response to pushes.
pub struct ApprovalResetEngine {
    store: Arc<dyn ApprovalStore>,
    patch_identity: PatchIdentityResolver,
    code_ownership: CodeOwnershipResolver,
    notifier: Arc<dyn EventNotifier>,
    metrics: Arc<dyn ResetMetrics>,
    locks: Arc<MergeRequestLocks>,
    config: EvaluationConfig,
}

impl ApprovalResetEngine {
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        patch_identity: PatchIdentityResolver,
        code_ownership: CodeOwnershipResolver,
        notifier: Arc<dyn EventNotifier>,
        config: EvaluationConfig,
    ) -> Self {
        Self {
            store,
            patch_identity,
            code_ownership,
            notifier,
            metrics: Arc::new(NoOpResetMetrics::new()),
            locks: Arc::new(MergeRequestLocks::new()),
            config,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ResetMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Shares merge request locks with other components granting approvals.
    pub fn with_locks(mut self, locks: Arc<MergeRequestLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Handles a push.
    ///
    /// Merge requests are processed one after another. A failure on one merge
    /// request is reported in its outcome and does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns `ApprovalEngineError::Persistence` if the affected merge
    /// requests cannot be loaded.
    #[instrument(
        skip(self, event),
        fields(project_id = event.project.value(), reference = event.reference.as_str())
    )]
    pub async fn execute(&self, event: &BranchUpdateEvent) -> EngineResult<BranchUpdateReport> {
        let mut report = BranchUpdateReport::default();
        if is_tag_ref(&event.reference) {
            debug!("Tag push, no approvals to reset");
            return Ok(report);
        }

        let branch = event.branch();
        let merge_requests = self
            .store
            .merge_requests_for_source_branch(event.project, branch, &RESETTABLE_STATES)
            .await?;

        info!(
            branch = branch,
            merge_requests = merge_requests.len(),
            skip_reset_checks = event.skip_reset_checks,
            "Resetting approvals for pushed branch"
        );

        for mr in &merge_requests {
            let outcome = self.process_merge_request(mr, event).await;
            self.metrics.record_outcome(outcome.label());
            report.outcomes.push((mr.id, outcome));
        }

        Ok(report)
    }

    /// Records a user's approval while holding the merge request's lock.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::DuplicateApproval` (wrapped) if the user has
    /// already approved.
    #[instrument(skip(self, mr, patch_id), fields(merge_request_id = mr.id.value(), user_id = user.value()))]
    pub async fn approve(
        &self,
        mr: &MergeRequest,
        user: UserId,
        patch_id: Option<PatchIdSha>,
    ) -> EngineResult<Approval> {
        let approval = {
            let _guard = self.locks.lock(mr.id).await;
            self.store.insert_approval(mr.id, user, patch_id).await?
        };

        info!(approval_id = approval.id.value(), "Merge request approved");
        self.notify(mr.id, MergeRequestEvent::MergeRequestApprovalStateUpdated)
            .await;
        Ok(approval)
    }

    async fn process_merge_request(
        &self,
        mr: &MergeRequest,
        event: &BranchUpdateEvent,
    ) -> MergeRequestOutcome {
        if mr.source_branch != event.branch() || mr.source_project_id != event.project {
            debug!(merge_request_id = mr.id.value(), "Merge request not sourced from pushed branch");
            return MergeRequestOutcome::Skipped;
        }

        let applied = {
            let _guard = self.locks.lock(mr.id).await;
            match self.plan_with_timeout(mr, event).await {
                Ok((transition, plan)) => self.apply(mr, transition, &plan).await,
                Err(e) => Err(e),
            }
        };

        match applied {
            Ok((transition, removed)) => {
                info!(
                    merge_request_id = mr.id.value(),
                    transition = transition.as_str(),
                    removed = removed,
                    "Approvals evaluated"
                );
                self.notify(mr.id, MergeRequestEvent::MergeRequestMergeStatusUpdated)
                    .await;
                self.notify(mr.id, MergeRequestEvent::MergeRequestApprovalStateUpdated)
                    .await;
                MergeRequestOutcome::Evaluated {
                    transition,
                    removed,
                }
            }
            Err(e @ ApprovalEngineError::EvaluationDeferred { .. }) => {
                warn!(merge_request_id = mr.id.value(), error = %e, "Approval reset deferred");
                MergeRequestOutcome::Deferred(e)
            }
            Err(e) => {
                error!(merge_request_id = mr.id.value(), error = %e, "Approval reset failed");
                MergeRequestOutcome::Failed(e)
            }
        }
    }

    async fn plan_with_timeout(
        &self,
        mr: &MergeRequest,
        event: &BranchUpdateEvent,
    ) -> EngineResult<(ResetTransition, ApprovalResetPlan)> {
        let Some(limit) = self.config.merge_request_timeout() else {
            return self.plan(mr, event).await;
        };

        match tokio::time::timeout(limit, self.plan(mr, event)).await {
            Ok(planned) => planned,
            Err(_) => Err(ApprovalEngineError::EvaluationDeferred {
                merge_request_id: mr.id.value(),
                timeout_ms: duration_ms(limit),
            }),
        }
    }

    async fn plan(
        &self,
        mr: &MergeRequest,
        event: &BranchUpdateEvent,
    ) -> EngineResult<(ResetTransition, ApprovalResetPlan)> {
        let approvals = self.store.approvals(mr.id).await?;

        if event.skip_reset_checks {
            return Ok((
                ResetTransition::FullyReset,
                ApprovalResetPlan {
                    delete_approval_ids: approvals.iter().map(|a| a.id).collect(),
                    clear_temporarily_unapproved: true,
                },
            ));
        }

        if mr.is_rebase_commit(&event.new_revision) {
            debug!(merge_request_id = mr.id.value(), "Push of rebase commit, approvals kept");
            return Ok((ResetTransition::Retained, ApprovalResetPlan::default()));
        }

        let settings = mr.settings();
        if !settings.resets_on_push() {
            return Ok((ResetTransition::Retained, ApprovalResetPlan::default()));
        }

        let survivors = self.patch_id_survivors(mr, &approvals).await;

        if settings.reset_approvals_on_push {
            let delete_approval_ids = approvals
                .iter()
                .map(|a| a.id)
                .filter(|id| !survivors.contains(id))
                .collect();
            return Ok((
                ResetTransition::FullyReset,
                ApprovalResetPlan {
                    delete_approval_ids,
                    clear_temporarily_unapproved: true,
                },
            ));
        }

        let code_owners = self
            .code_owner_approvers(mr, &event.old_revision, &approvals)
            .await?;
        let delete_approval_ids = approvals
            .iter()
            .filter(|a| code_owners.contains(&a.user_id) && !survivors.contains(&a.id))
            .map(|a| a.id)
            .collect();

        Ok((
            ResetTransition::PartiallyReset,
            ApprovalResetPlan {
                delete_approval_ids,
                clear_temporarily_unapproved: true,
            },
        ))
    }

    /// Approvals recorded for the merge request's current patch id.
    async fn patch_id_survivors(
        &self,
        mr: &MergeRequest,
        approvals: &[Approval],
    ) -> BTreeSet<ApprovalId> {
        if !self.config.patch_id_aware || approvals.iter().all(|a| a.patch_id_sha.is_none()) {
            return BTreeSet::new();
        }

        match self.patch_identity.compute_patch_id(mr).await {
            PatchIdentity::Available(sha) => approvals
                .iter()
                .filter(|a| a.matches_patch_id(&sha))
                .map(|a| a.id)
                .collect(),
            PatchIdentity::Unavailable => BTreeSet::new(),
        }
    }

    /// Users who approved through a code owner rule covering a path changed by
    /// the push.
    async fn code_owner_approvers(
        &self,
        mr: &MergeRequest,
        old_revision: &str,
        approvals: &[Approval],
    ) -> EngineResult<BTreeSet<UserId>> {
        let rule_names = match self.code_ownership.code_owner_rule_names(mr, old_revision).await {
            Ok(names) => names,
            Err(e) => {
                warn!(
                    merge_request_id = mr.id.value(),
                    error = %e,
                    "Code owners of changed paths unavailable, keeping code owner approvals"
                );
                return Ok(BTreeSet::new());
            }
        };
        if rule_names.is_empty() {
            return Ok(BTreeSet::new());
        }

        let rules = self.store.approval_rules(mr.id).await?;
        Ok(rules
            .iter()
            .filter(|rule| rule.is_code_owner() && rule_names.contains(&rule.name))
            .flat_map(|rule| rule.approved_approvers(approvals))
            .collect())
    }

    async fn apply(
        &self,
        mr: &MergeRequest,
        transition: ResetTransition,
        plan: &ApprovalResetPlan,
    ) -> EngineResult<(ResetTransition, usize)> {
        if plan.is_empty() {
            return Ok((transition, 0));
        }

        let removed = self.store.apply_approval_reset(mr.id, plan).await?;
        self.metrics.record_approvals_removed(removed as u64);
        Ok((transition, removed))
    }

    async fn notify(&self, merge_request: MergeRequestId, event: MergeRequestEvent) {
        if let Err(e) = self.notifier.notify(merge_request, event).await {
            warn!(
                merge_request_id = merge_request.value(),
                event = event.as_str(),
                error = %e,
                "Merge request notification failed"
            );
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
