//! Workflow controller: launch, wait, look up, cancel

use crate::poll::Deadline;
use crate::{EngineError, EngineResult};
use caseflow_session::{SessionManager, TxMode};
use caseflow_types::{CaseId, CaseRef, CompletionStatus, LaunchRequest, Variables, WorkflowCase};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Last case-name suffix handed out in this process
static LAST_SUFFIX: AtomicI64 = AtomicI64::new(0);

/// Strictly increasing millisecond timestamp, unique within the process
fn next_suffix() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_SUFFIX.load(Ordering::SeqCst);
    loop {
        let next = now.max(last + 1);
        match LAST_SUFFIX.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

/// A case the engine accepted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchedCase {
    pub name: String,
    /// Absent when the engine has not populated the identifier yet
    pub id: Option<CaseId>,
    pub workflow_name: String,
    /// Completion status right after launch; normally absent
    pub initial_status: Option<CompletionStatus>,
}

impl LaunchedCase {
    /// Reference for follow-up calls, preferring the identifier
    pub fn reference(&self) -> CaseRef {
        match &self.id {
            Some(id) => CaseRef::from(id),
            None => CaseRef::new(self.name.clone()),
        }
    }

    /// Reference by name, valid even before the identifier exists
    pub fn name_reference(&self) -> CaseRef {
        CaseRef::new(self.name.clone())
    }
}

/// Launches cases and follows them to completion
pub struct WorkflowController {
    session: Arc<SessionManager>,
    poll_interval: Duration,
}

impl WorkflowController {
    pub fn new(session: Arc<SessionManager>) -> Self {
        let poll_interval = session.config().polling.case_interval();
        Self {
            session,
            poll_interval,
        }
    }

    /// Override the completion poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start `workflow_name` as `launcher` with the given variables.
    ///
    /// The case is named `<launcher> - <millis>`. A refused launch, or one
    /// where the engine hands back no case, is [`EngineError::LaunchRejected`].
    pub async fn launch(
        &self,
        workflow_name: &str,
        launcher: &str,
        variables: Variables,
    ) -> EngineResult<LaunchedCase> {
        let request = LaunchRequest {
            workflow_name: workflow_name.to_string(),
            launcher: launcher.to_string(),
            case_name: format!("{} - {}", launcher, next_suffix()),
            variables,
        };
        tracing::info!(
            workflow = workflow_name,
            launcher,
            case = %request.case_name,
            variables = request.variables.len(),
            "Launching workflow"
        );

        let outcome = self
            .session
            .execute("launch_workflow", TxMode::Commit, move |h| async move {
                h.launch(&request).await
            })
            .await
            .inspect_err(|e| {
                tracing::error!(workflow = workflow_name, error = %e, "Workflow launch failed");
            })?;

        let Some(case) = outcome.case else {
            let reason = if outcome.messages.is_empty() {
                "engine returned no case".to_string()
            } else {
                outcome.messages.join("; ")
            };
            tracing::error!(workflow = workflow_name, reason = %reason, "Workflow launch rejected");
            return Err(EngineError::LaunchRejected {
                workflow: workflow_name.to_string(),
                reason,
            });
        };

        let launched = LaunchedCase {
            name: case.name.clone(),
            id: case.id.clone(),
            workflow_name: case.workflow_name.clone(),
            initial_status: case.completion_status(),
        };

        tracing::info!(
            case = %launched.name,
            case_id = ?launched.id.as_ref().map(CaseId::as_str),
            "Workflow launched"
        );
        if let Some(status) = launched.initial_status {
            tracing::warn!(
                case = %launched.name,
                status = %status,
                "Case completed immediately after launch"
            );
        }
        Ok(launched)
    }

    /// Launch as the configured administrator account
    pub async fn launch_as_admin(
        &self,
        workflow_name: &str,
        variables: Variables,
    ) -> EngineResult<LaunchedCase> {
        let admin = self.session.config().connection.username.clone();
        self.launch(workflow_name, &admin, variables).await
    }

    async fn fetch(&self, case: &CaseRef) -> EngineResult<Option<WorkflowCase>> {
        let key = case.as_str().to_string();
        let found = self
            .session
            .query("get_case", move |h| async move {
                match h.case_by_id(&key).await? {
                    Some(case) => Ok(Some(case)),
                    None => h.case_by_name(&key).await,
                }
            })
            .await?;
        Ok(found)
    }

    /// Look a case up by identifier, then by name
    pub async fn get_case(&self, case: &CaseRef) -> EngineResult<WorkflowCase> {
        self.fetch(case)
            .await?
            .ok_or_else(|| EngineError::CaseNotFound(case.to_string()))
    }

    /// Current completion status; `None` while the case is running
    pub async fn status(&self, case: &CaseRef) -> EngineResult<Option<CompletionStatus>> {
        Ok(self.get_case(case).await?.completion_status())
    }

    /// Poll until the case has a completion status or `timeout` elapses.
    ///
    /// A timeout is not an error: the last observed case comes back and
    /// its completion status is still absent. With a zero timeout this
    /// reads the case once and returns.
    pub async fn wait_for_completion(
        &self,
        case: &CaseRef,
        timeout: Duration,
    ) -> EngineResult<WorkflowCase> {
        let deadline = Deadline::after(timeout);
        let mut polls = 0u32;

        loop {
            self.session.refresh().await?;
            let current = self.get_case(case).await?;
            polls += 1;

            if let Some(status) = current.completion_status() {
                tracing::info!(case = %current.name, status = %status, polls, "Case completed");
                return Ok(current);
            }
            if !deadline.pause(self.poll_interval).await {
                tracing::warn!(
                    case = %current.name,
                    timeout_secs = timeout.as_secs_f64(),
                    polls,
                    "Case still running at timeout"
                );
                return Ok(current);
            }
        }
    }

    /// [`Self::wait_for_completion`] with the environment's default timeout
    pub async fn wait_for_completion_default(&self, case: &CaseRef) -> EngineResult<WorkflowCase> {
        let timeout = self.session.config().default_timeout();
        self.wait_for_completion(case, timeout).await
    }

    /// Force the case to `Terminated` and commit.
    ///
    /// Cancelling a terminal case writes the same status again.
    pub async fn cancel(&self, case: &CaseRef) -> EngineResult<WorkflowCase> {
        let key = case.as_str().to_string();
        let cancelled = self
            .session
            .execute("cancel_workflow", TxMode::Commit, move |h| async move {
                let found = match h.case_by_id(&key).await? {
                    Some(found) => Some(found),
                    None => h.case_by_name(&key).await?,
                };
                let Some(mut found) = found else {
                    return Ok(None);
                };
                found.terminate();
                h.save_case(&found).await?;
                Ok(Some(found))
            })
            .await
            .inspect_err(|e| tracing::error!(case = %case, error = %e, "Cancel failed"))?;

        let cancelled = cancelled.ok_or_else(|| EngineError::CaseNotFound(case.to_string()))?;
        tracing::info!(case = %cancelled.name, "Case terminated");
        Ok(cancelled)
    }
}
