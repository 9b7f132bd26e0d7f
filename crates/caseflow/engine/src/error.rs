//! Engine errors

use caseflow_session::SessionError;
use caseflow_types::{WorkItemId, WorkItemKind};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Case not found: {0}")]
    CaseNotFound(String),

    #[error("Work item not found: {0}")]
    WorkItemNotFound(WorkItemId),

    #[error("No pending {kind} work item for case {case}")]
    NoPendingItem { case: String, kind: WorkItemKind },

    #[error("Work item {0} is already finished")]
    AlreadyFinished(WorkItemId),

    #[error("Timed out after {after:?} waiting for {waiting_for}")]
    TimedOut { waiting_for: String, after: Duration },

    #[error("Work item {id} is a {actual} item, expected {expected}")]
    WrongItemKind {
        id: WorkItemId,
        expected: WorkItemKind,
        actual: WorkItemKind,
    },

    #[error("Launch of workflow '{workflow}' rejected: {reason}")]
    LaunchRejected { workflow: String, reason: String },

    #[error("Approval chain aborted at level {level} after {processed} levels: {reason}")]
    ChainAborted {
        level: usize,
        processed: usize,
        reason: String,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl EngineError {
    /// The addressed case or work item does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::CaseNotFound(_)
                | EngineError::WorkItemNotFound(_)
                | EngineError::NoPendingItem { .. }
        )
    }

    /// A wait ran out of time before the awaited state appeared
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::TimedOut { .. })
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
