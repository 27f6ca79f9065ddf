//! In-memory implementation of the engine's stores.
//!
//! Used by hosts that keep approval state in process and by tests. Every
//! operation takes one lock over the whole state, so multi-row operations such
//! as [`ApprovalStore::apply_approval_reset`] are atomic.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use policy_config::{ProjectId, ScanResultPolicyId};
use repository_client::{PatchIdSha, PipelineId, UserId};
use tracing::debug;

use crate::store::{ApprovalResetPlan, ApprovalStore, PolicyViolationStore, RequiredApprovalsUpdate};
use crate::{
    Approval, ApprovalId, ApprovalRule, MergeRequest, MergeRequestId, MergeRequestState,
    PersistenceError, PolicyViolation,
};

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;

#[derive(Debug, Default)]
struct StoreState {
    merge_requests: BTreeMap<MergeRequestId, MergeRequest>,
    approvals: BTreeMap<ApprovalId, Approval>,
    rules: BTreeMap<MergeRequestId, Vec<ApprovalRule>>,
    violations: BTreeMap<(MergeRequestId, ScanResultPolicyId), PolicyViolation>,
    next_approval_id: u64,
}

/// Approval and violation store backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>, PersistenceError> {
        self.state
            .lock()
            .map_err(|_| PersistenceError::unavailable("in-memory store lock poisoned"))
    }

    /// Adds or replaces a merge request.
    pub fn upsert_merge_request(&self, merge_request: MergeRequest) -> Result<(), PersistenceError> {
        self.state()?
            .merge_requests
            .insert(merge_request.id, merge_request);
        Ok(())
    }

    pub fn merge_request(&self, id: MergeRequestId) -> Result<Option<MergeRequest>, PersistenceError> {
        Ok(self.state()?.merge_requests.get(&id).cloned())
    }

    /// Adds an approval rule to a merge request.
    pub fn add_approval_rule(
        &self,
        merge_request: MergeRequestId,
        rule: ApprovalRule,
    ) -> Result<(), PersistenceError> {
        let mut state = self.state()?;
        if !state.merge_requests.contains_key(&merge_request) {
            return Err(PersistenceError::MergeRequestNotFound {
                merge_request_id: merge_request.value(),
            });
        }
        state.rules.entry(merge_request).or_default().push(rule);
        Ok(())
    }
}

#[async_trait]
impl ApprovalStore for InMemoryStore {
    async fn merge_requests_for_source_branch(
        &self,
        project: ProjectId,
        branch: &str,
        states: &[MergeRequestState],
    ) -> Result<Vec<MergeRequest>, PersistenceError> {
        Ok(self
            .state()?
            .merge_requests
            .values()
            .filter(|mr| {
                mr.source_project_id == project
                    && mr.source_branch == branch
                    && states.contains(&mr.state)
            })
            .cloned()
            .collect())
    }

    async fn merge_requests_for_head_pipeline(
        &self,
        project: ProjectId,
        pipeline: PipelineId,
    ) -> Result<Vec<MergeRequest>, PersistenceError> {
        Ok(self
            .state()?
            .merge_requests
            .values()
            .filter(|mr| {
                mr.source_project_id == project
                    && mr.head_pipeline.as_ref().map(|p| p.id) == Some(pipeline)
            })
            .cloned()
            .collect())
    }

    async fn approvals(
        &self,
        merge_request: MergeRequestId,
    ) -> Result<Vec<Approval>, PersistenceError> {
        Ok(self
            .state()?
            .approvals
            .values()
            .filter(|a| a.merge_request_id == merge_request)
            .cloned()
            .collect())
    }

    async fn approval_rules(
        &self,
        merge_request: MergeRequestId,
    ) -> Result<Vec<ApprovalRule>, PersistenceError> {
        Ok(self
            .state()?
            .rules
            .get(&merge_request)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_approval(
        &self,
        merge_request: MergeRequestId,
        user: UserId,
        patch_id_sha: Option<PatchIdSha>,
    ) -> Result<Approval, PersistenceError> {
        let mut state = self.state()?;
        if !state.merge_requests.contains_key(&merge_request) {
            return Err(PersistenceError::MergeRequestNotFound {
                merge_request_id: merge_request.value(),
            });
        }
        if state
            .approvals
            .values()
            .any(|a| a.merge_request_id == merge_request && a.user_id == user)
        {
            return Err(PersistenceError::DuplicateApproval {
                merge_request_id: merge_request.value(),
                user_id: user.value(),
            });
        }

        state.next_approval_id += 1;
        let approval = Approval {
            id: ApprovalId::new(state.next_approval_id),
            merge_request_id: merge_request,
            user_id: user,
            patch_id_sha,
            created_at: Utc::now(),
        };
        state.approvals.insert(approval.id, approval.clone());
        Ok(approval)
    }

    async fn apply_approval_reset(
        &self,
        merge_request: MergeRequestId,
        plan: &ApprovalResetPlan,
    ) -> Result<usize, PersistenceError> {
        let mut state = self.state()?;
        let Some(mr) = state.merge_requests.get_mut(&merge_request) else {
            return Err(PersistenceError::MergeRequestNotFound {
                merge_request_id: merge_request.value(),
            });
        };
        if plan.clear_temporarily_unapproved {
            mr.temporarily_unapproved = false;
        }

        let before = state.approvals.len();
        state.approvals.retain(|id, approval| {
            approval.merge_request_id != merge_request || !plan.delete_approval_ids.contains(id)
        });
        let deleted = before - state.approvals.len();

        debug!(
            merge_request_id = merge_request.value(),
            deleted = deleted,
            "Applied approval reset"
        );
        Ok(deleted)
    }

    async fn update_required_approvals(
        &self,
        merge_request: MergeRequestId,
        updates: &[RequiredApprovalsUpdate],
    ) -> Result<(), PersistenceError> {
        let mut state = self.state()?;
        let rules = state.rules.entry(merge_request).or_default();

        // Validate everything first so a bad id leaves no partial update.
        if let Some(missing) = updates
            .iter()
            .find(|u| !rules.iter().any(|rule| rule.id == u.rule_id))
        {
            return Err(PersistenceError::ApprovalRuleNotFound {
                rule_id: missing.rule_id.value(),
            });
        }

        for update in updates {
            for rule in rules.iter_mut().filter(|rule| rule.id == update.rule_id) {
                rule.approvals_required = update.approvals_required;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyViolationStore for InMemoryStore {
    async fn upsert_violations(
        &self,
        merge_request: MergeRequestId,
        violated: &[ScanResultPolicyId],
        unviolated: &[ScanResultPolicyId],
    ) -> Result<(), PersistenceError> {
        let mut state = self.state()?;
        let now = Utc::now();
        // A policy listed on both sides ends up violated.
        let rows = unviolated
            .iter()
            .map(|id| (*id, false))
            .chain(violated.iter().map(|id| (*id, true)));

        for (policy_id, is_violated) in rows {
            state.violations.insert(
                (merge_request, policy_id),
                PolicyViolation {
                    merge_request_id: merge_request,
                    policy_id,
                    violated: is_violated,
                    updated_at: now,
                },
            );
        }
        Ok(())
    }

    async fn violations(
        &self,
        merge_request: MergeRequestId,
    ) -> Result<Vec<PolicyViolation>, PersistenceError> {
        Ok(self
            .state()?
            .violations
            .range((merge_request, ScanResultPolicyId::new(0))..)
            .take_while(|((mr, _), _)| *mr == merge_request)
            .map(|(_, violation)| violation.clone())
            .collect())
    }
}
