//! Caseflow engine
//!
//! Drives workflows on the external platform to completion:
//!
//! - [`WorkflowController`]: launches cases under a unique time-suffixed
//!   name, polls them to a terminal status, looks them up and cancels them.
//! - [`WorkItemService`]: finds pending work items by case or owner, waits
//!   for items to appear, completes forms (save, commit, resume) and
//!   approves or rejects approval items.
//! - [`ApprovalAutomation`]: walks a multi-level approval chain with a
//!   per-level wait and an overall budget, recording one
//!   [`ApprovalResult`] per level.
//!
//! Every component talks to the platform through the shared
//! [`SessionManager`](caseflow_session::SessionManager). Poll loops sleep
//! without holding the session lock, so other callers can complete work
//! while a wait is in progress.
//!
//! ```ignore
//! let engine = CaseflowEngine::new(session);
//! let case = engine.controller().launch("Identity Activation", "spadmin", vars).await?;
//! let form = engine.work_items().wait_for(&case.reference(), WorkItemKind::Form, timeout).await?;
//! engine.work_items().complete_form(&form.id, values).await?;
//! let run = engine.approvals().handle_all_approvals(&case.reference(), &policy).await?;
//! ```

#![deny(unsafe_code)]

mod approvals;
mod controller;
mod error;
mod poll;
mod work_items;

pub use approvals::{ApprovalAutomation, ApprovalPolicy, ApprovalResult, ApprovalRun, StopReason};
pub use controller::{LaunchedCase, WorkflowController};
pub use error::{EngineError, EngineResult};
pub use work_items::{CompletionComments, WorkItemService};

use caseflow_session::SessionManager;
use std::sync::Arc;

/// The three engine components wired to one session
#[derive(Clone)]
pub struct CaseflowEngine {
    session: Arc<SessionManager>,
    controller: Arc<WorkflowController>,
    work_items: Arc<WorkItemService>,
    approvals: Arc<ApprovalAutomation>,
}

impl CaseflowEngine {
    pub fn new(session: Arc<SessionManager>) -> Self {
        let controller = Arc::new(WorkflowController::new(Arc::clone(&session)));
        let work_items = Arc::new(WorkItemService::new(Arc::clone(&session)));
        let approvals = Arc::new(ApprovalAutomation::new(
            Arc::clone(&session),
            Arc::clone(&controller),
            Arc::clone(&work_items),
        ));
        Self {
            session,
            controller,
            work_items,
            approvals,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn controller(&self) -> &WorkflowController {
        &self.controller
    }

    pub fn work_items(&self) -> &WorkItemService {
        &self.work_items
    }

    pub fn approvals(&self) -> &ApprovalAutomation {
        &self.approvals
    }
}
