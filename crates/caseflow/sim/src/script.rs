//! Workflow scripts

use caseflow_types::{ApprovalLine, ApprovalSet, FormField, FormPayload, Owner, WorkItemPayload};
use std::time::Duration;

/// One step of a scripted workflow
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptStep {
    Form { owner: Owner, fields: Vec<FormField> },
    Approval { owner: Owner, lines: Vec<ApprovalLine> },
}

impl ScriptStep {
    pub fn owner(&self) -> &Owner {
        match self {
            ScriptStep::Form { owner, .. } | ScriptStep::Approval { owner, .. } => owner,
        }
    }

    pub(crate) fn payload(&self) -> WorkItemPayload {
        match self {
            ScriptStep::Form { fields, .. } => WorkItemPayload::Form(FormPayload {
                fields: fields.clone(),
                ..Default::default()
            }),
            ScriptStep::Approval { lines, .. } => {
                WorkItemPayload::Approval(ApprovalSet::new(lines.clone()))
            }
        }
    }
}

/// A named workflow the simulated engine knows how to run
#[derive(Clone, Debug)]
pub struct WorkflowScript {
    pub name: String,
    pub steps: Vec<ScriptStep>,
    /// A rejected approval completes the case instead of moving on
    pub reject_terminates: bool,
    /// Delay before each emitted work item becomes visible
    pub materialize_delay: Duration,
    /// Case reads before the case identifier is populated
    pub id_lag_reads: u32,
}

impl WorkflowScript {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            reject_terminates: true,
            materialize_delay: Duration::ZERO,
            id_lag_reads: 0,
        }
    }

    pub fn form<I, S>(mut self, owner: Owner, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps.push(ScriptStep::Form {
            owner,
            fields: fields.into_iter().map(FormField::new).collect(),
        });
        self
    }

    pub fn approval(mut self, owner: Owner, lines: Vec<ApprovalLine>) -> Self {
        self.steps.push(ScriptStep::Approval { owner, lines });
        self
    }

    /// Append `levels` sequential approval steps owned by `approver-1`,
    /// `approver-2`, ...
    pub fn approval_levels(mut self, levels: usize, application: &str) -> Self {
        for level in 1..=levels {
            self = self.approval(
                Owner::Identity(format!("approver-{level}")),
                vec![ApprovalLine::new(application, "Enable")],
            );
        }
        self
    }

    pub fn reject_terminates(mut self, terminates: bool) -> Self {
        self.reject_terminates = terminates;
        self
    }

    pub fn materialize_delay(mut self, delay: Duration) -> Self {
        self.materialize_delay = delay;
        self
    }

    pub fn id_lag_reads(mut self, reads: u32) -> Self {
        self.id_lag_reads = reads;
        self
    }

    pub fn approval_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, ScriptStep::Approval { .. }))
            .count()
    }
}
