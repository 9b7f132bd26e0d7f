//! Workflow cases: instances of external workflows
//!
//! A case is created by a launch and then mutated only by the external
//! engine, or by an explicit cancel. Caseflow never deletes cases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form variable bag passed to and carried by a case
pub type Variables = HashMap<String, serde_json::Value>;

// ── Case Identifiers ─────────────────────────────────────────────────

/// Opaque case identifier assigned by the external engine
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseId(pub String);

impl CaseId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A caller-side reference to a case: either its identifier or its name.
///
/// The engine may not have populated a case's identifier yet right after
/// launch, so callers that only know the human-readable name must still
/// be able to address the case. Lookups try the reference as an
/// identifier first, then as a name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseRef(pub String);

impl CaseRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Does this reference address the given case (by id or by name)?
    pub fn matches(&self, id: Option<&CaseId>, name: &str) -> bool {
        id.is_some_and(|id| id.0 == self.0) || name == self.0
    }
}

impl std::fmt::Display for CaseRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CaseRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CaseRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&CaseId> for CaseRef {
    fn from(value: &CaseId) -> Self {
        Self(value.0.clone())
    }
}

// ── Completion Status ────────────────────────────────────────────────

/// Terminal outcome of a case, defined by the external engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionStatus {
    Success,
    Warning,
    Error,
    Terminated,
}

impl CompletionStatus {
    /// Did the case finish without an error or a forced termination?
    pub fn is_successful(&self) -> bool {
        matches!(self, CompletionStatus::Success | CompletionStatus::Warning)
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CompletionStatus::Success => "Success",
            CompletionStatus::Warning => "Warning",
            CompletionStatus::Error => "Error",
            CompletionStatus::Terminated => "Terminated",
        };
        f.write_str(label)
    }
}

// ── Workflow Case ────────────────────────────────────────────────────

/// One in-flight or completed workflow instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowCase {
    /// Engine-assigned identifier; may be absent shortly after launch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<CaseId>,
    /// Globally unique, time-suffixed case name
    pub name: String,
    /// Name of the workflow this case runs
    pub workflow_name: String,
    /// Identity the case was launched as
    pub launcher: String,
    /// Absent while running, set once the case is terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    completion_status: Option<CompletionStatus>,
    /// Case variables
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: Variables,
    /// Messages the engine attached to the case
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    /// When the case was launched
    pub launched_at: DateTime<Utc>,
    /// When the case reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowCase {
    /// Create a running case
    pub fn new(
        name: impl Into<String>,
        workflow_name: impl Into<String>,
        launcher: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            workflow_name: workflow_name.into(),
            launcher: launcher.into(),
            completion_status: None,
            variables: Variables::new(),
            messages: Vec::new(),
            launched_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_id(mut self, id: CaseId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Current completion status, `None` while the case is running
    pub fn completion_status(&self) -> Option<CompletionStatus> {
        self.completion_status
    }

    /// Has the case reached a terminal status?
    pub fn is_complete(&self) -> bool {
        self.completion_status.is_some()
    }

    /// Set the terminal status.
    ///
    /// A terminal case never reverts to running. Completing it again
    /// overwrites the status but keeps the first completion time.
    pub fn complete(&mut self, status: CompletionStatus) {
        self.completion_status = Some(status);
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Force the case to the terminated status
    pub fn terminate(&mut self) {
        self.complete(CompletionStatus::Terminated);
    }

    /// A reference that addresses this case, preferring the identifier
    pub fn reference(&self) -> CaseRef {
        match &self.id {
            Some(id) => CaseRef::from(id),
            None => CaseRef::new(self.name.clone()),
        }
    }

    /// Record a message from the engine
    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_case_is_running() {
        let case = WorkflowCase::new("alice - 1", "Identity Activation", "alice");
        assert!(!case.is_complete());
        assert!(case.completion_status().is_none());
        assert!(case.id.is_none());
    }

    #[test]
    fn test_completion_is_sticky() {
        let mut case = WorkflowCase::new("alice - 1", "Identity Activation", "alice");
        case.complete(CompletionStatus::Success);
        let first_completed_at = case.completed_at;

        case.terminate();
        assert_eq!(case.completion_status(), Some(CompletionStatus::Terminated));
        assert_eq!(case.completed_at, first_completed_at);
        assert!(case.is_complete());
    }

    #[test]
    fn test_case_ref_matches_id_or_name() {
        let id = CaseId::new("abc123");
        let by_id = CaseRef::new("abc123");
        let by_name = CaseRef::new("alice - 1");
        let other = CaseRef::new("bob - 2");

        assert!(by_id.matches(Some(&id), "alice - 1"));
        assert!(by_name.matches(Some(&id), "alice - 1"));
        assert!(by_name.matches(None, "alice - 1"));
        assert!(!by_id.matches(None, "alice - 1"));
        assert!(!other.matches(Some(&id), "alice - 1"));
    }

    #[test]
    fn test_reference_prefers_id() {
        let case = WorkflowCase::new("alice - 1", "wf", "alice");
        assert_eq!(case.reference(), CaseRef::new("alice - 1"));

        let case = case.with_id(CaseId::new("abc"));
        assert_eq!(case.reference(), CaseRef::new("abc"));
    }

    #[test]
    fn test_status_serialization_skips_running() {
        let case = WorkflowCase::new("alice - 1", "wf", "alice");
        let json = serde_json::to_value(&case).unwrap();
        assert!(json.get("completion_status").is_none());

        let mut case = case;
        case.complete(CompletionStatus::Error);
        let json = serde_json::to_value(&case).unwrap();
        assert_eq!(json["completion_status"], "Error");
    }

    #[test]
    fn test_successful_statuses() {
        assert!(CompletionStatus::Success.is_successful());
        assert!(CompletionStatus::Warning.is_successful());
        assert!(!CompletionStatus::Error.is_successful());
        assert!(!CompletionStatus::Terminated.is_successful());
    }
}
