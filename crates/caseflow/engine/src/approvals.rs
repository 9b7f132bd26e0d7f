//! Multi-level approval automation
//!
//! A run walks the case's approval chain one level at a time:
//!
//! ```text
//! AwaitingLevel(n) ──item──▶ Deciding(n) ──ok──▶ settle ──▶ AwaitingLevel(n+1)
//!        │                        │                 │
//!     timeout                  failure        case completed
//!        ▼                        ▼                 ▼
//!   NoMoreItems             ChainAborted       CaseCompleted
//! ```
//!
//! The run also stops at `max_levels` and when the overall budget runs
//! out. Rejection runs stop after the first successful rejection.

use crate::poll::Deadline;
use crate::{EngineError, EngineResult, WorkItemService, WorkflowController};
use caseflow_config::ApprovalConfig;
use caseflow_session::SessionManager;
use caseflow_types::{ApprovalDecision, CaseRef, ObjectKind, Owner, WorkItem, WorkItemId, WorkItemKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ── Policy ───────────────────────────────────────────────────────────

/// Bounds and comments for one automation run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalPolicy {
    /// How long to wait for each level's item
    pub per_level_timeout: Duration,
    pub max_levels: usize,
    /// Budget for the whole run; defaults to `max_levels × per_level_timeout`
    pub overall_budget: Option<Duration>,
    pub approve_comments: Option<String>,
    pub reject_comments: Option<String>,
}

impl ApprovalPolicy {
    pub fn new(per_level_timeout: Duration, max_levels: usize) -> Self {
        Self {
            per_level_timeout,
            max_levels,
            overall_budget: None,
            approve_comments: None,
            reject_comments: None,
        }
    }

    pub fn from_defaults(config: &ApprovalConfig) -> Self {
        Self {
            per_level_timeout: config.per_level_timeout(),
            max_levels: config.max_levels,
            overall_budget: config.overall_budget(),
            approve_comments: Some(config.approve_comments.clone()),
            reject_comments: Some(config.reject_comments.clone()),
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.overall_budget = Some(budget);
        self
    }

    pub fn with_comments(mut self, approve: impl Into<String>, reject: impl Into<String>) -> Self {
        self.approve_comments = Some(approve.into());
        self.reject_comments = Some(reject.into());
        self
    }

    /// Effective budget for a run
    pub fn budget(&self) -> Duration {
        self.overall_budget.unwrap_or_else(|| {
            let levels = u32::try_from(self.max_levels).unwrap_or(u32::MAX);
            self.per_level_timeout.saturating_mul(levels)
        })
    }

    fn comments(&self, decision: ApprovalDecision) -> Option<&str> {
        match decision {
            ApprovalDecision::Approved => self.approve_comments.as_deref(),
            ApprovalDecision::Rejected => self.reject_comments.as_deref(),
        }
    }
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self::from_defaults(&ApprovalConfig::default())
    }
}

// ── Results ──────────────────────────────────────────────────────────

/// Outcome of one approval level
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResult {
    pub level: usize,
    /// Resolved owner of the level's work item
    pub owner: Option<String>,
    pub work_item_id: WorkItemId,
    pub success: bool,
    pub error: Option<String>,
}

/// Why a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// No approval item appeared within the per-level wait
    NoMoreItems,
    /// The case reached a completion status
    CaseCompleted,
    /// `max_levels` levels were processed
    MaxLevels,
    /// The overall budget ran out
    BudgetExhausted,
    /// A rejection was recorded
    Rejected,
}

/// Summary of one automation run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRun {
    /// Levels decided successfully
    pub processed: usize,
    pub results: Vec<ApprovalResult>,
    pub stop: StopReason,
    /// A further approval item showed up after a rejection
    pub follow_up_pending: bool,
}

impl ApprovalRun {
    fn new() -> Self {
        Self {
            processed: 0,
            results: Vec::new(),
            stop: StopReason::NoMoreItems,
            follow_up_pending: false,
        }
    }

    fn record(&mut self, result: ApprovalResult) {
        if result.success {
            self.processed += 1;
        }
        self.results.push(result);
    }

    fn stopped(mut self, reason: StopReason) -> Self {
        self.stop = reason;
        self
    }
}

// ── Automation ───────────────────────────────────────────────────────

/// Drives approval chains to the end
pub struct ApprovalAutomation {
    session: Arc<SessionManager>,
    controller: Arc<WorkflowController>,
    work_items: Arc<WorkItemService>,
    settle: Duration,
}

impl ApprovalAutomation {
    pub fn new(
        session: Arc<SessionManager>,
        controller: Arc<WorkflowController>,
        work_items: Arc<WorkItemService>,
    ) -> Self {
        let settle = session.config().polling.level_settle();
        Self {
            session,
            controller,
            work_items,
            settle,
        }
    }

    /// Override the pause after each decision
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Approve level after level until no item appears, the case
    /// completes, `max_levels` is reached or the budget runs out.
    ///
    /// A failed approval aborts the run with [`EngineError::ChainAborted`].
    pub async fn handle_all_approvals(
        &self,
        case: &CaseRef,
        policy: &ApprovalPolicy,
    ) -> EngineResult<ApprovalRun> {
        let budget = Deadline::after(policy.budget());
        let mut run = ApprovalRun::new();
        tracing::info!(
            case = %case,
            max_levels = policy.max_levels,
            per_level_timeout_secs = policy.per_level_timeout.as_secs_f64(),
            budget_secs = policy.budget().as_secs_f64(),
            "Approving all levels"
        );

        for level in 1..=policy.max_levels {
            let Some(wait) = self.level_wait(case, level, &run, policy, &budget) else {
                return Ok(run.stopped(StopReason::BudgetExhausted));
            };

            let result = match self
                .decide_level(case, level, ApprovalDecision::Approved, policy, wait)
                .await
            {
                Ok(result) => result,
                Err(e) if e.is_timeout() => {
                    let reason = Self::timeout_reason(wait, policy);
                    tracing::info!(case = %case, level, processed = run.processed, stop = ?reason, "No further approval item");
                    return Ok(run.stopped(reason));
                }
                Err(e) => return Err(e),
            };

            if !result.success {
                return Err(EngineError::ChainAborted {
                    level,
                    processed: run.processed,
                    reason: result.error.unwrap_or_default(),
                });
            }
            run.record(result);

            if self.settle_and_check(case).await {
                tracing::info!(case = %case, processed = run.processed, "Case completed during approvals");
                return Ok(run.stopped(StopReason::CaseCompleted));
            }
        }

        tracing::info!(case = %case, processed = run.processed, "Maximum approval levels reached");
        Ok(run.stopped(StopReason::MaxLevels))
    }

    /// Reject the next approval item and stop.
    ///
    /// A rejection normally ends the chain. That is the engine's rule, not
    /// one enforced here: if another approval item shows up after the
    /// settle interval it is logged and flagged on the run.
    pub async fn handle_all_rejections(
        &self,
        case: &CaseRef,
        policy: &ApprovalPolicy,
    ) -> EngineResult<ApprovalRun> {
        let budget = Deadline::after(policy.budget());
        let mut run = ApprovalRun::new();
        let level = 1;

        let Some(wait) = self.level_wait(case, level, &run, policy, &budget) else {
            return Ok(run.stopped(StopReason::BudgetExhausted));
        };
        let result = match self
            .decide_level(case, level, ApprovalDecision::Rejected, policy, wait)
            .await
        {
            Ok(result) => result,
            Err(e) if e.is_timeout() => {
                tracing::info!(case = %case, "No approval item to reject");
                return Ok(run.stopped(Self::timeout_reason(wait, policy)));
            }
            Err(e) => return Err(e),
        };

        if !result.success {
            return Err(EngineError::ChainAborted {
                level,
                processed: 0,
                reason: result.error.unwrap_or_default(),
            });
        }
        run.record(result);

        tokio::time::sleep(self.settle).await;
        let follow_up = self.work_items.approval_items(case).await;
        if let Some(next) = follow_up.first() {
            tracing::warn!(
                case = %case,
                work_item = %next.id,
                owner = next.owner_name().unwrap_or("-"),
                "Approval item still pending after rejection"
            );
            run.follow_up_pending = true;
        }
        Ok(run.stopped(StopReason::Rejected))
    }

    /// Wait for and approve one level, returning its result.
    ///
    /// No item within the policy's per-level timeout is
    /// [`EngineError::TimedOut`].
    pub async fn approve_single_level(
        &self,
        case: &CaseRef,
        level: usize,
        policy: &ApprovalPolicy,
    ) -> EngineResult<ApprovalResult> {
        self.decide_level(
            case,
            level,
            ApprovalDecision::Approved,
            policy,
            policy.per_level_timeout,
        )
        .await
    }

    /// Per-level wait, clamped to what is left of the budget. `None` once
    /// the budget is spent.
    fn level_wait(
        &self,
        case: &CaseRef,
        level: usize,
        run: &ApprovalRun,
        policy: &ApprovalPolicy,
        budget: &Deadline,
    ) -> Option<Duration> {
        let remaining = budget.remaining();
        if remaining.is_zero() {
            tracing::warn!(
                case = %case,
                level,
                processed = run.processed,
                "Approval budget exhausted"
            );
            return None;
        }
        Some(policy.per_level_timeout.min(remaining))
    }

    fn timeout_reason(wait: Duration, policy: &ApprovalPolicy) -> StopReason {
        if wait < policy.per_level_timeout {
            StopReason::BudgetExhausted
        } else {
            StopReason::NoMoreItems
        }
    }

    /// Pause so the engine can surface the next level, then report
    /// whether the case has completed
    async fn settle_and_check(&self, case: &CaseRef) -> bool {
        tokio::time::sleep(self.settle).await;
        match self.controller.status(case).await {
            Ok(status) => status.is_some(),
            Err(e) => {
                tracing::warn!(case = %case, error = %e, "Case status check failed");
                false
            }
        }
    }

    async fn decide_level(
        &self,
        case: &CaseRef,
        level: usize,
        decision: ApprovalDecision,
        policy: &ApprovalPolicy,
        wait: Duration,
    ) -> EngineResult<ApprovalResult> {
        let item = self
            .work_items
            .wait_for(case, WorkItemKind::Approval, wait)
            .await?;
        let owner = self.resolve_owner(&item).await;
        tracing::info!(
            case = %case,
            level,
            work_item = %item.id,
            owner = owner.as_deref().unwrap_or("-"),
            decision = ?decision,
            "Processing approval level"
        );

        let comments = policy.comments(decision);
        let outcome = match decision {
            ApprovalDecision::Approved => self.work_items.approve(&item.id, comments).await,
            ApprovalDecision::Rejected => self.work_items.reject(&item.id, comments).await,
        };

        Ok(match outcome {
            Ok(_) => ApprovalResult {
                level,
                owner,
                work_item_id: item.id,
                success: true,
                error: None,
            },
            Err(e) => {
                tracing::error!(case = %case, level, work_item = %item.id, error = %e, "Approval level failed");
                ApprovalResult {
                    level,
                    owner,
                    work_item_id: item.id,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        })
    }

    /// Owner name as the directory knows it; falls back to the raw name
    async fn resolve_owner(&self, item: &WorkItem) -> Option<String> {
        match item.owner.as_ref()? {
            Owner::Identity(name) => {
                match self.session.resolve_cached(ObjectKind::Identity, name).await {
                    Ok(Some(identity)) => Some(identity.name.clone()),
                    Ok(None) => {
                        tracing::debug!(owner = %name, "Owner not found in directory");
                        Some(name.clone())
                    }
                    Err(e) => {
                        tracing::warn!(owner = %name, error = %e, "Owner lookup failed");
                        Some(name.clone())
                    }
                }
            }
            Owner::Group(name) => Some(name.clone()),
        }
    }
}
