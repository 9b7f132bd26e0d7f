//! The external workflow platform interface
//!
//! Everything caseflow observes about cases and work items comes through
//! [`WorkflowPlatform`]. The platform's workflow interpreter, persistence
//! and security model stay opaque.

use crate::{PlatformResult, Variables, WorkItem, WorkItemId, WorkItemQuery, WorkflowCase};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Launch ───────────────────────────────────────────────────────────

/// Everything the engine needs to start a case
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub workflow_name: String,
    /// Identity the case runs as
    pub launcher: String,
    /// Unique name for the new case
    pub case_name: String,
    #[serde(default)]
    pub variables: Variables,
}

/// What the engine answered to a launch
#[derive(Clone, Debug, Default)]
pub struct LaunchOutcome {
    /// The created case; absent when the engine refused or failed to start it
    pub case: Option<WorkflowCase>,
    /// Diagnostic messages from the engine's launch result
    pub messages: Vec<String>,
}

impl LaunchOutcome {
    pub fn launched(case: WorkflowCase) -> Self {
        Self {
            case: Some(case),
            messages: Vec::new(),
        }
    }

    pub fn refused(messages: Vec<String>) -> Self {
        Self {
            case: None,
            messages,
        }
    }
}

// ── Directory Objects ────────────────────────────────────────────────

/// Kinds of named objects that can be resolved through the platform
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Identity,
    Application,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ObjectKind::Identity => "Identity",
            ObjectKind::Application => "Application",
        };
        f.write_str(label)
    }
}

/// A named object resolved from the platform's directory
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlatformObject {
    pub kind: ObjectKind,
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

impl PlatformObject {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

// ── Platform Trait ───────────────────────────────────────────────────

/// A live handle to the external workflow platform.
///
/// Implementations are not expected to tolerate concurrent transactions
/// on one handle; callers serialize access (see the session manager).
/// Writes made between `begin_transaction` and `commit` become visible
/// to the engine only on commit.
#[async_trait]
pub trait WorkflowPlatform: Send + Sync {
    /// Open a transaction on the handle
    async fn begin_transaction(&self) -> PlatformResult<()>;

    /// Commit the open transaction
    async fn commit(&self) -> PlatformResult<()>;

    /// Discard the open transaction
    async fn rollback(&self) -> PlatformResult<()>;

    /// Ask the engine to start a case
    async fn launch(&self, request: &LaunchRequest) -> PlatformResult<LaunchOutcome>;

    /// Fetch a case by engine identifier
    async fn case_by_id(&self, id: &str) -> PlatformResult<Option<WorkflowCase>>;

    /// Fetch a case by name
    async fn case_by_name(&self, name: &str) -> PlatformResult<Option<WorkflowCase>>;

    /// Persist a modified case
    async fn save_case(&self, case: &WorkflowCase) -> PlatformResult<()>;

    /// Query work items
    async fn work_items(&self, query: &WorkItemQuery) -> PlatformResult<Vec<WorkItem>>;

    /// Fetch a work item by identifier
    async fn work_item(&self, id: &WorkItemId) -> PlatformResult<Option<WorkItem>>;

    /// Persist a modified work item
    async fn save_work_item(&self, item: &WorkItem) -> PlatformResult<()>;

    /// Signal the engine to resume processing of a completed work item.
    ///
    /// Finishing a form item alone does not advance its case.
    async fn resume_work_item(&self, item: &WorkItem) -> PlatformResult<()>;

    /// Resolve a named directory object
    async fn lookup(&self, kind: ObjectKind, name: &str) -> PlatformResult<Option<PlatformObject>>;

    /// Count directory objects of a kind
    async fn count(&self, kind: ObjectKind) -> PlatformResult<usize>;

    /// Discard in-process representations fetched through this handle
    async fn decache(&self) -> PlatformResult<()>;

    /// Release the handle
    async fn close(&self) -> PlatformResult<()>;
}
