//! The simulated platform

use crate::WorkflowScript;
use async_trait::async_trait;
use caseflow_types::{
    CaseId, CompletionStatus, LaunchOutcome, LaunchRequest, ObjectKind, PlatformError,
    PlatformObject, PlatformResult, WorkItem, WorkItemId, WorkItemKind, WorkItemQuery,
    WorkItemState, WorkflowCase, WorkflowPlatform,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;

/// Transaction journal entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TxEvent {
    Begin,
    Commit,
    CommitFailed,
    Rollback,
}

struct SimCase {
    /// Committed state as the platform exposes it
    case: WorkflowCase,
    /// Engine identifier, exposed once `id_reads_remaining` reaches zero
    id: CaseId,
    script: WorkflowScript,
    next_step: usize,
    id_reads_remaining: u32,
}

struct SimItem {
    item: WorkItem,
    visible_at: Instant,
}

#[derive(Default)]
struct Staged {
    cases: Vec<WorkflowCase>,
    items: Vec<WorkItem>,
    resumes: Vec<WorkItemId>,
}

#[derive(Default)]
struct SimState {
    scripts: HashMap<String, WorkflowScript>,
    cases: Vec<SimCase>,
    items: Vec<SimItem>,
    /// Finished items whose effect on their case has been applied
    handled: HashSet<WorkItemId>,
    directory: HashMap<(ObjectKind, String), PlatformObject>,
    tx: Option<Staged>,
    journal: Vec<TxEvent>,
    failing_saves: HashSet<WorkItemId>,
    failing_commits: u32,
    failing_reads: u32,
    /// Finished out of band when the next transaction opens
    finish_on_begin: Option<WorkItemId>,
    lookups: HashMap<ObjectKind, usize>,
    resumes: usize,
    decaches: usize,
    closed: bool,
}

impl SimState {
    fn ensure_open(&self) -> PlatformResult<()> {
        if self.closed {
            return Err(PlatformError::Unavailable("handle is closed".into()));
        }
        Ok(())
    }

    fn staged(&mut self) -> PlatformResult<&mut Staged> {
        self.ensure_open()?;
        self.tx
            .as_mut()
            .ok_or_else(|| PlatformError::Transaction("no open transaction".into()))
    }

    fn case_index(&self, name: &str) -> Option<usize> {
        self.cases.iter().position(|c| c.case.name == name)
    }

    /// Emit the next scripted work item, or complete the case when the
    /// script is exhausted
    fn emit_next(&mut self, index: usize, now: Instant) {
        let sim = &mut self.cases[index];
        if sim.case.is_complete() {
            return;
        }

        match sim.script.steps.get(sim.next_step) {
            Some(step) => {
                let item = WorkItem::new(
                    sim.case.id.clone(),
                    sim.case.name.clone(),
                    Some(step.owner().clone()),
                    step.payload(),
                );
                sim.next_step += 1;
                tracing::trace!(
                    case = %sim.case.name,
                    work_item = %item.id,
                    kind = %item.kind(),
                    "Simulated engine emitted work item"
                );
                self.items.push(SimItem {
                    item,
                    visible_at: now + sim.script.materialize_delay,
                });
            }
            None => {
                sim.case.complete(CompletionStatus::Success);
                tracing::trace!(case = %sim.case.name, "Simulated case completed");
            }
        }
    }

    fn finish_case(&mut self, index: usize, status: CompletionStatus, message: String) {
        let name = {
            let sim = &mut self.cases[index];
            sim.case.complete(status);
            sim.case.add_message(message);
            sim.case.name.clone()
        };
        self.drop_pending_items(&name);
    }

    /// The engine discards outstanding work items of a completed case
    fn drop_pending_items(&mut self, case_name: &str) {
        self.items
            .retain(|s| !(s.item.case_name == case_name && s.item.is_pending()));
    }

    fn reveal_id(&mut self, index: usize) {
        let sim = &mut self.cases[index];
        sim.case.id = Some(sim.id.clone());
        let (id, name) = (sim.id.clone(), sim.case.name.clone());
        for s in self.items.iter_mut().filter(|s| s.item.case_name == name) {
            s.item.case_id = Some(id.clone());
        }
    }

    /// Apply committed, finished approval items to their cases
    fn advance(&mut self, now: Instant) {
        let ready: Vec<(WorkItemId, String, bool)> = self
            .items
            .iter()
            .filter(|s| {
                s.item.kind() == WorkItemKind::Approval
                    && s.item.state == WorkItemState::Finished
                    && !self.handled.contains(&s.item.id)
            })
            .map(|s| {
                let rejected = s.item.approval_set().is_some_and(|set| set.has_rejection());
                (s.item.id.clone(), s.item.case_name.clone(), rejected)
            })
            .collect();

        for (item_id, case_name, rejected) in ready {
            self.handled.insert(item_id.clone());
            let Some(index) = self.case_index(&case_name) else {
                continue;
            };
            if self.cases[index].case.is_complete() {
                continue;
            }
            if rejected && self.cases[index].script.reject_terminates {
                self.finish_case(
                    index,
                    CompletionStatus::Success,
                    format!("Request rejected at work item {item_id}"),
                );
            } else {
                self.emit_next(index, now);
            }
        }
    }

    /// Visible committed items with staged modifications applied
    fn visible_items(&self, now: Instant) -> Vec<WorkItem> {
        let staged = self.tx.as_ref().map(|t| t.items.as_slice()).unwrap_or(&[]);
        self.items
            .iter()
            .filter(|s| s.visible_at <= now)
            .map(|s| {
                staged
                    .iter()
                    .find(|i| i.id == s.item.id)
                    .unwrap_or(&s.item)
                    .clone()
            })
            .collect()
    }

    fn exposed_case(&self, index: usize) -> WorkflowCase {
        let committed = &self.cases[index].case;
        self.tx
            .as_ref()
            .and_then(|t| t.cases.iter().find(|c| c.name == committed.name))
            .unwrap_or(committed)
            .clone()
    }

    fn apply(&mut self, staged: Staged, now: Instant) {
        for update in staged.cases {
            let Some(index) = self.case_index(&update.name) else {
                continue;
            };
            let newly_complete = {
                let sim = &mut self.cases[index];
                let was_complete = sim.case.is_complete();
                sim.case.variables = update.variables.clone();
                if let Some(status) = update.completion_status() {
                    sim.case.complete(status);
                }
                !was_complete && sim.case.is_complete()
            };
            if newly_complete {
                let name = update.name.clone();
                self.drop_pending_items(&name);
            }
        }

        for update in staged.items {
            if let Some(slot) = self.items.iter_mut().find(|s| s.item.id == update.id) {
                slot.item = update;
            }
        }

        for id in staged.resumes {
            self.resumes += 1;
            let target = self
                .items
                .iter()
                .find(|s| s.item.id == id)
                .map(|s| (s.item.kind(), s.item.state, s.item.case_name.clone()));
            let Some((kind, state, case_name)) = target else {
                continue;
            };
            if kind != WorkItemKind::Form
                || state != WorkItemState::Finished
                || self.handled.contains(&id)
            {
                continue;
            }
            self.handled.insert(id);
            if let Some(index) = self.case_index(&case_name) {
                self.emit_next(index, now);
            }
        }
    }
}

/// Scripted in-memory workflow platform
#[derive(Default)]
pub struct SimulatedPlatform {
    state: Mutex<SimState>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Setup ────────────────────────────────────────────────────────

    pub fn with_script(self, script: WorkflowScript) -> Self {
        self.register(script);
        self
    }

    pub fn with_identity(self, name: &str) -> Self {
        self.add_object(PlatformObject::new(ObjectKind::Identity, name));
        self
    }

    pub fn with_application(self, name: &str) -> Self {
        self.add_object(PlatformObject::new(ObjectKind::Application, name));
        self
    }

    pub fn register(&self, script: WorkflowScript) {
        self.state.lock().scripts.insert(script.name.clone(), script);
    }

    pub fn add_object(&self, object: PlatformObject) {
        self.state
            .lock()
            .directory
            .insert((object.kind, object.name.clone()), object);
    }

    // ── Failure Injection ────────────────────────────────────────────

    /// Make every save of this work item fail
    pub fn fail_saves_for(&self, id: &WorkItemId) {
        self.state.lock().failing_saves.insert(id.clone());
    }

    /// Make the next `count` commits fail, leaving the transaction open
    pub fn fail_next_commits(&self, count: u32) {
        self.state.lock().failing_commits = count;
    }

    /// Make the next `count` work item queries fail as unavailable
    pub fn fail_next_reads(&self, count: u32) {
        self.state.lock().failing_reads = count;
    }

    /// Finish this item as another writer would, just as the next
    /// transaction begins
    pub fn finish_on_next_begin(&self, id: &WorkItemId) {
        self.state.lock().finish_on_begin = Some(id.clone());
    }

    /// Complete a case as if the engine finished it on its own
    pub fn complete_externally(&self, case_name: &str, status: CompletionStatus) {
        let mut state = self.state.lock();
        if let Some(index) = state.case_index(case_name) {
            state.finish_case(index, status, "Completed by the engine".into());
        }
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn journal(&self) -> Vec<TxEvent> {
        self.state.lock().journal.clone()
    }

    pub fn lookup_count(&self, kind: ObjectKind) -> usize {
        self.state.lock().lookups.get(&kind).copied().unwrap_or(0)
    }

    pub fn resume_count(&self) -> usize {
        self.state.lock().resumes
    }

    pub fn decache_count(&self) -> usize {
        self.state.lock().decaches
    }

    pub fn in_transaction(&self) -> bool {
        self.state.lock().tx.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Committed state of a case, identifier included, without counting as a read
    pub fn engine_case(&self, case_name: &str) -> Option<WorkflowCase> {
        let state = self.state.lock();
        state.case_index(case_name).map(|index| {
            let sim = &state.cases[index];
            sim.case.clone().with_id(sim.id.clone())
        })
    }

    /// Every committed item of a case, visible or not, in emission order
    pub fn items_for_case(&self, case_name: &str) -> Vec<WorkItem> {
        self.state
            .lock()
            .items
            .iter()
            .filter(|s| s.item.case_name == case_name)
            .map(|s| s.item.clone())
            .collect()
    }

    pub fn case_count(&self) -> usize {
        self.state.lock().cases.len()
    }
}

#[async_trait]
impl WorkflowPlatform for SimulatedPlatform {
    async fn begin_transaction(&self) -> PlatformResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        if state.tx.is_some() {
            return Err(PlatformError::Transaction(
                "a transaction is already open on this handle".into(),
            ));
        }
        if let Some(id) = state.finish_on_begin.take() {
            if let Some(slot) = state.items.iter_mut().find(|s| s.item.id == id) {
                slot.item.finish("Finished by another session");
            }
        }
        state.tx = Some(Staged::default());
        state.journal.push(TxEvent::Begin);
        Ok(())
    }

    async fn commit(&self) -> PlatformResult<()> {
        let mut state = self.state.lock();
        state.staged()?;
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            state.journal.push(TxEvent::CommitFailed);
            return Err(PlatformError::Transaction("commit failed".into()));
        }
        if let Some(staged) = state.tx.take() {
            state.apply(staged, Instant::now());
        }
        state.journal.push(TxEvent::Commit);
        Ok(())
    }

    async fn rollback(&self) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.tx.take().is_none() {
            return Err(PlatformError::Transaction("no open transaction".into()));
        }
        state.journal.push(TxEvent::Rollback);
        Ok(())
    }

    async fn launch(&self, request: &LaunchRequest) -> PlatformResult<LaunchOutcome> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        let Some(script) = state.scripts.get(&request.workflow_name).cloned() else {
            return Ok(LaunchOutcome::refused(vec![format!(
                "Workflow '{}' not found",
                request.workflow_name
            )]));
        };
        if state.case_index(&request.case_name).is_some() {
            return Err(PlatformError::Rejected(format!(
                "case '{}' already exists",
                request.case_name
            )));
        }

        let id = CaseId::generate();
        let mut case = WorkflowCase::new(
            request.case_name.clone(),
            request.workflow_name.clone(),
            request.launcher.clone(),
        )
        .with_variables(request.variables.clone());
        if script.id_lag_reads == 0 {
            case.id = Some(id.clone());
        }

        let id_reads_remaining = script.id_lag_reads;
        state.cases.push(SimCase {
            case,
            id,
            script,
            next_step: 0,
            id_reads_remaining,
        });
        let index = state.cases.len() - 1;
        state.emit_next(index, Instant::now());

        Ok(LaunchOutcome::launched(state.cases[index].case.clone()))
    }

    async fn case_by_id(&self, id: &str) -> PlatformResult<Option<WorkflowCase>> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.advance(Instant::now());
        let index = state
            .cases
            .iter()
            .position(|c| c.case.id.as_ref().is_some_and(|cid| cid.as_str() == id));
        Ok(index.map(|i| state.exposed_case(i)))
    }

    async fn case_by_name(&self, name: &str) -> PlatformResult<Option<WorkflowCase>> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.advance(Instant::now());
        let Some(index) = state.case_index(name) else {
            return Ok(None);
        };
        let case = state.exposed_case(index);
        if state.cases[index].id_reads_remaining > 0 {
            state.cases[index].id_reads_remaining -= 1;
            if state.cases[index].id_reads_remaining == 0 {
                state.reveal_id(index);
            }
        }
        Ok(Some(case))
    }

    async fn save_case(&self, case: &WorkflowCase) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.case_index(&case.name).is_none() {
            return Err(PlatformError::Rejected(format!("unknown case '{}'", case.name)));
        }
        let staged = state.staged()?;
        staged.cases.retain(|c| c.name != case.name);
        staged.cases.push(case.clone());
        Ok(())
    }

    async fn work_items(&self, query: &WorkItemQuery) -> PlatformResult<Vec<WorkItem>> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(PlatformError::Unavailable("work item query failed".into()));
        }
        let now = Instant::now();
        state.advance(now);
        Ok(state
            .visible_items(now)
            .into_iter()
            .filter(|item| query.matches(item))
            .collect())
    }

    async fn work_item(&self, id: &WorkItemId) -> PlatformResult<Option<WorkItem>> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let now = Instant::now();
        state.advance(now);
        Ok(state.visible_items(now).into_iter().find(|i| &i.id == id))
    }

    async fn save_work_item(&self, item: &WorkItem) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.failing_saves.contains(&item.id) {
            return Err(PlatformError::Rejected(format!(
                "save of work item {} refused",
                item.id
            )));
        }
        match state.items.iter().find(|s| s.item.id == item.id) {
            None => {
                return Err(PlatformError::Rejected(format!("unknown work item {}", item.id)));
            }
            Some(existing) if !existing.item.is_pending() => {
                return Err(PlatformError::Conflict(format!(
                    "work item {} is already finished",
                    item.id
                )));
            }
            Some(_) => {}
        }
        let staged = state.staged()?;
        staged.items.retain(|i| i.id != item.id);
        staged.items.push(item.clone());
        Ok(())
    }

    async fn resume_work_item(&self, item: &WorkItem) -> PlatformResult<()> {
        let mut state = self.state.lock();
        let staged = state.staged()?;
        staged.resumes.push(item.id.clone());
        Ok(())
    }

    async fn lookup(&self, kind: ObjectKind, name: &str) -> PlatformResult<Option<PlatformObject>> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        *state.lookups.entry(kind).or_insert(0) += 1;
        Ok(state.directory.get(&(kind, name.to_string())).cloned())
    }

    async fn count(&self, kind: ObjectKind) -> PlatformResult<usize> {
        let state = self.state.lock();
        state.ensure_open()?;
        Ok(state.directory.keys().filter(|(k, _)| *k == kind).count())
    }

    async fn decache(&self) -> PlatformResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.decaches += 1;
        Ok(())
    }

    async fn close(&self) -> PlatformResult<()> {
        let mut state = self.state.lock();
        state.closed = true;
        state.tx = None;
        Ok(())
    }
}
