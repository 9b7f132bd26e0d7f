//! Work item discovery and completion

use crate::poll::Deadline;
use crate::{EngineError, EngineResult};
use caseflow_config::ApprovalConfig;
use caseflow_session::{SessionError, SessionManager, TxMode};
use caseflow_types::{
    ApprovalDecision, CaseRef, PlatformError, PlatformResult, Variables, WorkItem, WorkItemId,
    WorkItemKind, WorkItemQuery, WorkItemState, WorkflowPlatform,
};
use std::sync::Arc;
use std::time::Duration;

/// Completion comments used when the caller supplies none
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionComments {
    pub form: String,
    pub approve: String,
    pub reject: String,
}

impl CompletionComments {
    pub fn from_config(config: &ApprovalConfig) -> Self {
        Self {
            form: config.form_comments.clone(),
            approve: config.approve_comments.clone(),
            reject: config.reject_comments.clone(),
        }
    }
}

impl Default for CompletionComments {
    fn default() -> Self {
        Self::from_config(&ApprovalConfig::default())
    }
}

/// Re-read the item inside the open transaction. Another writer may have
/// finished it after it was loaded.
async fn recheck_pending(
    platform: &dyn WorkflowPlatform,
    id: &WorkItemId,
    expected: WorkItemKind,
) -> PlatformResult<()> {
    match platform.work_item(id).await? {
        None => Err(PlatformError::Rejected(format!("unknown work item {id}"))),
        Some(item) if item.kind() != expected => Err(PlatformError::Rejected(format!(
            "work item {id} is a {} item, expected {expected}",
            item.kind()
        ))),
        Some(item) if item.is_pending() => Ok(()),
        Some(_) => Err(PlatformError::Conflict(format!(
            "work item {id} is already finished"
        ))),
    }
}

/// A write conflict on a work item means someone else finished it first
fn completion_error(id: &WorkItemId, error: SessionError) -> EngineError {
    match error.platform_error() {
        Some(PlatformError::Conflict(_)) => EngineError::AlreadyFinished(id.clone()),
        _ => EngineError::Session(error),
    }
}

/// Finds, waits for and completes work items
pub struct WorkItemService {
    session: Arc<SessionManager>,
    poll_interval: Duration,
    comments: CompletionComments,
}

impl WorkItemService {
    pub fn new(session: Arc<SessionManager>) -> Self {
        let poll_interval = session.config().polling.work_item_interval();
        let comments = CompletionComments::from_config(&session.config().approvals);
        Self {
            session,
            poll_interval,
            comments,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    // ── Discovery ────────────────────────────────────────────────────

    async fn query(&self, operation: &str, query: WorkItemQuery) -> Vec<WorkItem> {
        let filter = query.clone();
        match self
            .session
            .query(operation, move |h| async move { h.work_items(&filter).await })
            .await
        {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(operation, query = ?query, error = %e, "Work item query failed");
                Vec::new()
            }
        }
    }

    /// Pending items of a case, matched on case identifier or name.
    ///
    /// A failed query is logged and reads as no items.
    pub async fn find_by_case(&self, case: &CaseRef) -> Vec<WorkItem> {
        self.query("find_work_items_by_case", WorkItemQuery::pending_for_case(case))
            .await
    }

    /// Pending items assigned to an owner
    pub async fn find_by_owner(&self, owner: &str) -> Vec<WorkItem> {
        self.query("find_work_items_by_owner", WorkItemQuery::pending_for_owner(owner))
            .await
    }

    pub async fn form_items(&self, case: &CaseRef) -> Vec<WorkItem> {
        self.query(
            "find_form_items",
            WorkItemQuery::pending_for_case(case).with_kind(WorkItemKind::Form),
        )
        .await
    }

    pub async fn approval_items(&self, case: &CaseRef) -> Vec<WorkItem> {
        self.query(
            "find_approval_items",
            WorkItemQuery::pending_for_case(case).with_kind(WorkItemKind::Approval),
        )
        .await
    }

    pub async fn has_pending_approvals(&self, case: &CaseRef) -> bool {
        !self.approval_items(case).await.is_empty()
    }

    /// Approval items of the case that have been finished
    pub async fn completed_approval_count(&self, case: &CaseRef) -> usize {
        self.query(
            "count_completed_approvals",
            WorkItemQuery::for_case(case)
                .with_kind(WorkItemKind::Approval)
                .with_state(WorkItemState::Finished),
        )
        .await
        .len()
    }

    /// Fetch one work item by identifier
    pub async fn work_item(&self, id: &WorkItemId) -> EngineResult<WorkItem> {
        let key = id.clone();
        self.session
            .query("get_work_item", move |h| async move { h.work_item(&key).await })
            .await?
            .ok_or_else(|| EngineError::WorkItemNotFound(id.clone()))
    }

    /// Poll the case's pending items until one of `kind` appears.
    ///
    /// Polls once immediately, then every poll interval until `timeout`.
    pub async fn wait_for(
        &self,
        case: &CaseRef,
        kind: WorkItemKind,
        timeout: Duration,
    ) -> EngineResult<WorkItem> {
        let deadline = Deadline::after(timeout);
        tracing::debug!(case = %case, kind = %kind, timeout_secs = timeout.as_secs_f64(), "Waiting for work item");

        loop {
            if let Some(item) = self
                .find_by_case(case)
                .await
                .into_iter()
                .find(|item| item.kind() == kind)
            {
                tracing::info!(
                    case = %case,
                    work_item = %item.id,
                    kind = %kind,
                    owner = item.owner_name().unwrap_or("-"),
                    "Work item found"
                );
                return Ok(item);
            }
            if !deadline.pause(self.poll_interval).await {
                tracing::debug!(case = %case, kind = %kind, "No work item before timeout");
                return Err(EngineError::TimedOut {
                    waiting_for: format!("{kind} work item for case {case}"),
                    after: timeout,
                });
            }
        }
    }

    // ── Completion ───────────────────────────────────────────────────

    async fn load_pending(&self, id: &WorkItemId, expected: WorkItemKind) -> EngineResult<WorkItem> {
        let item = self.work_item(id).await?;
        if item.kind() != expected {
            return Err(EngineError::WrongItemKind {
                id: id.clone(),
                expected,
                actual: item.kind(),
            });
        }
        if !item.is_pending() {
            return Err(EngineError::AlreadyFinished(id.clone()));
        }
        Ok(item)
    }

    /// Fill in a form item, finish it, commit and resume the case.
    ///
    /// Finishing the item alone leaves the case stalled, so the resume
    /// signal goes out in the same transaction. Nothing is written when
    /// the item is not a pending form.
    pub async fn complete_form(&self, id: &WorkItemId, values: Variables) -> EngineResult<WorkItem> {
        let result = async {
            let mut item = self.load_pending(id, WorkItemKind::Form).await?;
            let fields = values.len();
            for (name, value) in values {
                item.set_field(name, value);
            }
            item.finish(self.comments.form.clone());

            let staged = item.clone();
            self.session
                .execute("complete_form", TxMode::Commit, move |h| async move {
                    recheck_pending(&*h, &staged.id, WorkItemKind::Form).await?;
                    h.save_work_item(&staged).await?;
                    h.resume_work_item(&staged).await
                })
                .await
                .map_err(|e| completion_error(id, e))?;

            tracing::info!(work_item = %id, case = %item.case_name, fields, "Form completed");
            Ok::<_, EngineError>(item)
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!(work_item = %id, error = %e, "Form completion failed");
        })
    }

    /// Complete the first pending form item of a case
    pub async fn complete_form_for_case(
        &self,
        case: &CaseRef,
        values: Variables,
    ) -> EngineResult<WorkItem> {
        let form = self
            .form_items(case)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::NoPendingItem {
                case: case.to_string(),
                kind: WorkItemKind::Form,
            })?;
        self.complete_form(&form.id, values).await
    }

    /// Approve every line of an approval item and finish it
    pub async fn approve(&self, id: &WorkItemId, comments: Option<&str>) -> EngineResult<WorkItem> {
        let comments = comments.unwrap_or(&self.comments.approve).to_string();
        self.decide(id, ApprovalDecision::Approved, comments).await
    }

    /// Reject every line of an approval item and finish it
    pub async fn reject(&self, id: &WorkItemId, comments: Option<&str>) -> EngineResult<WorkItem> {
        let comments = comments.unwrap_or(&self.comments.reject).to_string();
        self.decide(id, ApprovalDecision::Rejected, comments).await
    }

    /// The engine notices finished approvals on its own, so no resume here
    async fn decide(
        &self,
        id: &WorkItemId,
        decision: ApprovalDecision,
        comments: String,
    ) -> EngineResult<WorkItem> {
        let operation = match decision {
            ApprovalDecision::Approved => "approve_work_item",
            ApprovalDecision::Rejected => "reject_work_item",
        };

        let result = async {
            let mut item = self.load_pending(id, WorkItemKind::Approval).await?;
            item.decide_all(decision);
            item.finish(comments);

            let staged = item.clone();
            self.session
                .execute(operation, TxMode::Commit, move |h| async move {
                    recheck_pending(&*h, &staged.id, WorkItemKind::Approval).await?;
                    h.save_work_item(&staged).await
                })
                .await
                .map_err(|e| completion_error(id, e))?;

            tracing::info!(
                work_item = %id,
                case = %item.case_name,
                decision = ?decision,
                lines = item.approval_set().map_or(0, |set| set.lines.len()),
                "Approval decided"
            );
            Ok::<_, EngineError>(item)
        }
        .await;

        result.inspect_err(|e| {
            tracing::error!(work_item = %id, operation, error = %e, "Approval decision failed");
        })
    }
}
