//! Work items: human work generated by running cases
//!
//! The external engine creates work items as a side effect of workflow
//! execution. Caseflow only transitions them from pending to finished.

use crate::{CaseId, CaseRef, Variables};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Work Item Identifier ─────────────────────────────────────────────

/// Engine-assigned work item identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkItemId(pub String);

impl WorkItemId {
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

impl std::fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Kind, State, Owner ───────────────────────────────────────────────

/// What sort of human work an item asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkItemKind {
    /// Field data must be supplied before the case can resume
    Form,
    /// One or more line entries to approve or reject
    Approval,
}

impl std::fmt::Display for WorkItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkItemKind::Form => f.write_str("Form"),
            WorkItemKind::Approval => f.write_str("Approval"),
        }
    }
}

/// Work item lifecycle: pending → finished, one way
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkItemState {
    Pending,
    Finished,
}

/// Who a work item is assigned to
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "lowercase")]
pub enum Owner {
    Identity(String),
    Group(String),
}

impl Owner {
    pub fn name(&self) -> &str {
        match self {
            Owner::Identity(name) | Owner::Group(name) => name,
        }
    }
}

// ── Payloads ─────────────────────────────────────────────────────────

/// A field declared by a form item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
}

impl FormField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }

    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }
}

/// Form schema plus the values entered so far
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormPayload {
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub values: Variables,
}

/// Decision recorded on an approval line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// One individually approvable entry of an approval item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalLine {
    /// Target system the change applies to
    pub application: String,
    /// Requested operation (e.g. "Enable", "Disable")
    pub operation: String,
    /// Attribute value or entitlement being requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<ApprovalDecision>,
    pub state: WorkItemState,
}

impl ApprovalLine {
    pub fn new(application: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            operation: operation.into(),
            value: None,
            decision: None,
            state: WorkItemState::Pending,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// The set of lines carried by an approval item
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovalSet {
    pub lines: Vec<ApprovalLine>,
}

impl ApprovalSet {
    pub fn new(lines: Vec<ApprovalLine>) -> Self {
        Self { lines }
    }

    /// Record the same decision on every line and finish it
    pub fn decide_all(&mut self, decision: ApprovalDecision) {
        for line in &mut self.lines {
            line.decision = Some(decision);
            line.state = WorkItemState::Finished;
        }
    }

    /// Was any line rejected?
    pub fn has_rejection(&self) -> bool {
        self.lines
            .iter()
            .any(|l| l.decision == Some(ApprovalDecision::Rejected))
    }
}

/// Kind-specific content of a work item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WorkItemPayload {
    Form(FormPayload),
    Approval(ApprovalSet),
}

impl WorkItemPayload {
    pub fn kind(&self) -> WorkItemKind {
        match self {
            WorkItemPayload::Form(_) => WorkItemKind::Form,
            WorkItemPayload::Approval(_) => WorkItemKind::Approval,
        }
    }
}

// ── Work Item ────────────────────────────────────────────────────────

/// A unit of human work generated by a running case
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub state: WorkItemState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    /// Parent case identifier, if the engine has populated it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,
    /// Parent case name
    pub case_name: String,
    pub payload: WorkItemPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    /// Create a pending work item for a case
    pub fn new(
        case_id: Option<CaseId>,
        case_name: impl Into<String>,
        owner: Option<Owner>,
        payload: WorkItemPayload,
    ) -> Self {
        Self {
            id: WorkItemId::generate(),
            state: WorkItemState::Pending,
            owner,
            case_id,
            case_name: case_name.into(),
            payload,
            completion_comments: None,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> WorkItemKind {
        self.payload.kind()
    }

    pub fn is_pending(&self) -> bool {
        self.state == WorkItemState::Pending
    }

    /// Does this item belong to the referenced case?
    pub fn belongs_to(&self, case: &CaseRef) -> bool {
        case.matches(self.case_id.as_ref(), &self.case_name)
    }

    /// Owner name, if the item is assigned
    pub fn owner_name(&self) -> Option<&str> {
        self.owner.as_ref().map(Owner::name)
    }

    /// Write a value into the form payload. No-op on non-form items.
    pub fn set_field(&mut self, name: impl Into<String>, value: serde_json::Value) {
        if let WorkItemPayload::Form(form) = &mut self.payload {
            form.values.insert(name.into(), value);
        }
    }

    /// Record a decision on every approval line. No-op on form items.
    pub fn decide_all(&mut self, decision: ApprovalDecision) {
        if let WorkItemPayload::Approval(set) = &mut self.payload {
            set.decide_all(decision);
        }
    }

    /// The approval set, if this is an approval item
    pub fn approval_set(&self) -> Option<&ApprovalSet> {
        match &self.payload {
            WorkItemPayload::Approval(set) => Some(set),
            WorkItemPayload::Form(_) => None,
        }
    }

    /// Mark the item finished with completion comments
    pub fn finish(&mut self, comments: impl Into<String>) {
        self.state = WorkItemState::Finished;
        self.completion_comments = Some(comments.into());
    }
}

// ── Queries ──────────────────────────────────────────────────────────

/// Filter for work item queries against the platform.
///
/// Unset fields match everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkItemQuery {
    pub case: Option<CaseRef>,
    pub owner: Option<String>,
    pub kind: Option<WorkItemKind>,
    pub state: Option<WorkItemState>,
}

impl WorkItemQuery {
    /// Pending items of a case
    pub fn pending_for_case(case: &CaseRef) -> Self {
        Self {
            case: Some(case.clone()),
            state: Some(WorkItemState::Pending),
            ..Default::default()
        }
    }

    /// Pending items assigned to an owner
    pub fn pending_for_owner(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            state: Some(WorkItemState::Pending),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: WorkItemKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_state(mut self, state: WorkItemState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn for_case(case: &CaseRef) -> Self {
        Self {
            case: Some(case.clone()),
            ..Default::default()
        }
    }

    /// Does an item satisfy every set filter?
    pub fn matches(&self, item: &WorkItem) -> bool {
        self.case.as_ref().map_or(true, |c| item.belongs_to(c))
            && self
                .owner
                .as_deref()
                .map_or(true, |o| item.owner_name() == Some(o))
            && self.kind.map_or(true, |k| item.kind() == k)
            && self.state.map_or(true, |s| item.state == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approval_item(case_id: Option<CaseId>, case_name: &str) -> WorkItem {
        WorkItem::new(
            case_id,
            case_name,
            Some(Owner::Identity("manager".into())),
            WorkItemPayload::Approval(ApprovalSet::new(vec![
                ApprovalLine::new("Directory", "Enable"),
                ApprovalLine::new("HR", "Enable").with_value("active"),
            ])),
        )
    }

    #[test]
    fn test_decide_all_finishes_every_line() {
        let mut item = approval_item(None, "alice - 1");
        item.decide_all(ApprovalDecision::Rejected);

        let set = item.approval_set().unwrap();
        assert!(set.has_rejection());
        assert!(set
            .lines
            .iter()
            .all(|l| l.state == WorkItemState::Finished
                && l.decision == Some(ApprovalDecision::Rejected)));
        // The item itself is only finished explicitly
        assert!(item.is_pending());
    }

    #[test]
    fn test_set_field_ignored_on_approval() {
        let mut item = approval_item(None, "alice - 1");
        let before = item.clone();
        item.set_field("reason", serde_json::json!("x"));
        assert_eq!(item, before);
    }

    #[test]
    fn test_form_fields_and_finish() {
        let mut item = WorkItem::new(
            None,
            "alice - 1",
            Some(Owner::Group("Helpdesk".into())),
            WorkItemPayload::Form(FormPayload {
                fields: vec![FormField::required("justification")],
                values: Variables::new(),
            }),
        );
        item.set_field("justification", serde_json::json!("rehire"));
        item.finish("done");

        assert_eq!(item.kind(), WorkItemKind::Form);
        assert_eq!(item.owner_name(), Some("Helpdesk"));
        assert_eq!(item.state, WorkItemState::Finished);
        match &item.payload {
            WorkItemPayload::Form(form) => {
                assert_eq!(form.values["justification"], "rehire");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_query_filters() {
        let item = approval_item(Some(CaseId::new("c1")), "alice - 1");

        assert!(WorkItemQuery::pending_for_case(&CaseRef::new("c1")).matches(&item));
        assert!(WorkItemQuery::pending_for_case(&CaseRef::new("alice - 1")).matches(&item));
        assert!(WorkItemQuery::pending_for_owner("manager").matches(&item));
        assert!(!WorkItemQuery::pending_for_owner("someone").matches(&item));
        assert!(!WorkItemQuery::pending_for_case(&CaseRef::new("c1"))
            .with_kind(WorkItemKind::Form)
            .matches(&item));
        assert!(!WorkItemQuery::for_case(&CaseRef::new("c1"))
            .with_state(WorkItemState::Finished)
            .matches(&item));
    }

    #[test]
    fn test_owner_serialization() {
        let owner = Owner::Group("Helpdesk".into());
        let json = serde_json::to_value(&owner).unwrap();
        assert_eq!(json["type"], "group");
        assert_eq!(json["name"], "Helpdesk");
    }

    proptest! {
        #[test]
        fn prop_item_matches_its_own_case(id in "[a-f0-9]{8}", name in "[a-z]{1,8} - [0-9]{1,13}") {
            let item = approval_item(Some(CaseId::new(id.clone())), &name);
            prop_assert!(item.belongs_to(&CaseRef::new(id)));
            prop_assert!(item.belongs_to(&CaseRef::new(name)));
        }
    }
}
