use caseflow_config::{CaseflowConfig, EnvironmentKind};
use caseflow_engine::{ApprovalPolicy, CaseflowEngine, EngineError, StopReason};
use caseflow_session::{AcquisitionStrategy, SessionManager};
use caseflow_sim::{SimulatedAcquisition, SimulatedPlatform, TxEvent, WorkflowScript};
use caseflow_types::{
    ApprovalLine, CaseRef, CompletionStatus, Owner, Variables, WorkItemKind, WorkItemState,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const ACTIVATION: &str = "Identity Activation";

fn activation_script(levels: usize) -> WorkflowScript {
    WorkflowScript::new(ACTIVATION)
        .form(Owner::Identity("spadmin".into()), ["reason", "startDate"])
        .approval_levels(levels, "Active Directory")
}

async fn engine_with(scripts: Vec<WorkflowScript>) -> (CaseflowEngine, Arc<SimulatedPlatform>) {
    let mut platform = SimulatedPlatform::new()
        .with_identity("spadmin")
        .with_identity("approver-1")
        .with_identity("approver-2")
        .with_application("Active Directory");
    for script in scripts {
        platform = platform.with_script(script);
    }
    let platform = Arc::new(platform);

    let session = Arc::new(SessionManager::new(CaseflowConfig::for_profile(
        EnvironmentKind::Test,
    )));
    let strategies: Vec<Box<dyn AcquisitionStrategy>> =
        vec![Box::new(SimulatedAcquisition::new(Arc::clone(&platform)))];
    session.initialize(&strategies).await.unwrap();

    (CaseflowEngine::new(session), platform)
}

fn form_values() -> Variables {
    let mut values = Variables::new();
    values.insert("reason".into(), serde_json::json!("New hire"));
    values.insert("startDate".into(), serde_json::json!("2026-11-02"));
    values
}

// ── Workflow Controller ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn launch_names_are_unique() {
    let (engine, platform) = engine_with(vec![activation_script(1)]).await;

    let mut names = HashSet::new();
    for _ in 0..25 {
        let launched = engine
            .controller()
            .launch(ACTIVATION, "spadmin", Variables::new())
            .await
            .unwrap();
        assert!(launched.name.starts_with("spadmin - "));
        assert!(launched.initial_status.is_none());
        assert!(names.insert(launched.name));
    }
    assert_eq!(platform.case_count(), 25);
}

#[tokio::test(start_paused = true)]
async fn launch_as_admin_uses_configured_account() {
    let (engine, platform) = engine_with(vec![activation_script(1)]).await;
    let launched = engine
        .controller()
        .launch_as_admin(ACTIVATION, Variables::new())
        .await
        .unwrap();

    assert!(launched.name.starts_with("spadmin - "));
    assert_eq!(platform.engine_case(&launched.name).unwrap().launcher, "spadmin");
}

#[tokio::test(start_paused = true)]
async fn launch_of_unknown_workflow_is_rejected() {
    let (engine, platform) = engine_with(vec![]).await;

    let err = engine
        .controller()
        .launch("Does Not Exist", "spadmin", Variables::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LaunchRejected { ref workflow, .. } if workflow == "Does Not Exist"));
    assert_eq!(platform.case_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn launch_of_empty_workflow_reports_immediate_completion() {
    let (engine, _platform) = engine_with(vec![WorkflowScript::new("Noop")]).await;
    let launched = engine
        .controller()
        .launch("Noop", "spadmin", Variables::new())
        .await
        .unwrap();
    assert_eq!(launched.initial_status, Some(CompletionStatus::Success));
}

#[tokio::test(start_paused = true)]
async fn wait_for_completion_with_zero_timeout_returns_immediately() {
    let (engine, _platform) = engine_with(vec![activation_script(1)]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();

    let start = Instant::now();
    let case = engine
        .controller()
        .wait_for_completion(&launched.reference(), Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(case.completion_status().is_none());
}

#[tokio::test(start_paused = true)]
async fn wait_for_completion_timeout_returns_running_case() {
    let (engine, platform) = engine_with(vec![activation_script(1)]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();

    let start = Instant::now();
    let case = engine
        .controller()
        .wait_for_completion(&launched.reference(), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert!(case.completion_status().is_none());
    assert_eq!(case.name, launched.name);
    // every poll drops stale state first
    assert!(platform.decache_count() >= 3);
}

#[tokio::test(start_paused = true)]
async fn wait_for_completion_observes_external_completion() {
    let (engine, platform) = engine_with(vec![activation_script(1)]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();

    let finisher = {
        let platform = Arc::clone(&platform);
        let name = launched.name.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            platform.complete_externally(&name, CompletionStatus::Warning);
        })
    };

    let start = Instant::now();
    let case = engine
        .controller()
        .wait_for_completion(&launched.reference(), Duration::from_secs(60))
        .await
        .unwrap();
    finisher.await.unwrap();

    assert_eq!(case.completion_status(), Some(CompletionStatus::Warning));
    assert_eq!(start.elapsed(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn get_case_falls_back_to_name() {
    let (engine, _platform) = engine_with(vec![activation_script(1)]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();

    let by_name = engine
        .controller()
        .get_case(&launched.name_reference())
        .await
        .unwrap();
    let by_id = engine.controller().get_case(&launched.reference()).await.unwrap();
    assert_eq!(by_name.name, by_id.name);

    let err = engine
        .controller()
        .get_case(&CaseRef::new("nobody - 1"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn cancel_is_idempotent() {
    let (engine, platform) = engine_with(vec![activation_script(2)]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();
    let case = launched.reference();

    let first = engine.controller().cancel(&case).await.unwrap();
    let second = engine.controller().cancel(&case).await.unwrap();
    assert_eq!(first.completion_status(), Some(CompletionStatus::Terminated));
    assert_eq!(second.completion_status(), Some(CompletionStatus::Terminated));
    assert_eq!(
        engine.controller().status(&case).await.unwrap(),
        Some(CompletionStatus::Terminated)
    );

    // outstanding work went away with the case
    assert!(engine.work_items().find_by_case(&case).await.is_empty());
    let journal = platform.journal();
    assert_eq!(journal[journal.len() - 2..], [TxEvent::Begin, TxEvent::Commit]);
}

#[tokio::test(start_paused = true)]
async fn cancel_unknown_case_is_not_found() {
    let (engine, _platform) = engine_with(vec![]).await;
    let err = engine
        .controller()
        .cancel(&CaseRef::new("ghost - 1"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CaseNotFound(_)));
}

// ── Work Item Service ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn wait_for_missing_kind_times_out() {
    let script = WorkflowScript::new("Approval Only").approval_levels(1, "LDAP");
    let (engine, _platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch("Approval Only", "spadmin", Variables::new())
        .await
        .unwrap();

    let start = Instant::now();
    let err = engine
        .work_items()
        .wait_for(&launched.reference(), WorkItemKind::Form, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(!err.is_not_found());
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn wait_for_sees_delayed_item() {
    let script = activation_script(1).materialize_delay(Duration::from_millis(2_500));
    let (engine, _platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();

    let start = Instant::now();
    let form = engine
        .work_items()
        .wait_for(&launched.reference(), WorkItemKind::Form, Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(form.kind(), WorkItemKind::Form);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn find_by_case_works_before_identifier_exists() {
    let script = activation_script(1).id_lag_reads(3);
    let (engine, _platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();
    assert!(launched.id.is_none());

    let items = engine.work_items().find_by_case(&launched.reference()).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].case_name, launched.name);
}

#[tokio::test(start_paused = true)]
async fn find_by_owner_lists_pending_items() {
    let (engine, _platform) = engine_with(vec![activation_script(1)]).await;
    for _ in 0..3 {
        engine
            .controller()
            .launch(ACTIVATION, "spadmin", Variables::new())
            .await
            .unwrap();
    }
    assert_eq!(engine.work_items().find_by_owner("spadmin").await.len(), 3);
    assert!(engine.work_items().find_by_owner("approver-1").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn complete_form_resumes_case() {
    let (engine, platform) = engine_with(vec![activation_script(2)]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();
    let case = launched.reference();

    let form = engine
        .work_items()
        .wait_for(&case, WorkItemKind::Form, Duration::from_secs(5))
        .await
        .unwrap();
    let done = engine
        .work_items()
        .complete_form(&form.id, form_values())
        .await
        .unwrap();
    assert_eq!(done.state, WorkItemState::Finished);
    assert!(done
        .completion_comments
        .as_deref()
        .is_some_and(|c| c.starts_with("Completed programmatically")));
    assert_eq!(platform.resume_count(), 1);

    // the engine moved on to the first approval level
    assert!(engine.work_items().form_items(&case).await.is_empty());
    assert!(engine.work_items().has_pending_approvals(&case).await);
}

#[tokio::test(start_paused = true)]
async fn complete_form_on_approval_item_changes_nothing() {
    let script = WorkflowScript::new("Approval Only").approval_levels(1, "LDAP");
    let (engine, platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch("Approval Only", "spadmin", Variables::new())
        .await
        .unwrap();
    let case = launched.reference();
    let approval = engine.work_items().approval_items(&case).await.remove(0);
    let journal_before = platform.journal().len();

    let err = engine
        .work_items()
        .complete_form(&approval.id, form_values())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::WrongItemKind {
            expected: WorkItemKind::Form,
            actual: WorkItemKind::Approval,
            ..
        }
    ));
    let pending = engine.work_items().find_by_case(&case).await;
    assert_eq!(pending.len(), 1);
    assert!(pending[0].is_pending());
    assert_eq!(platform.journal().len(), journal_before);
}

#[tokio::test(start_paused = true)]
async fn complete_form_for_case_without_form() {
    let script = WorkflowScript::new("Approval Only").approval_levels(1, "LDAP");
    let (engine, _platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch("Approval Only", "spadmin", Variables::new())
        .await
        .unwrap();

    let err = engine
        .work_items()
        .complete_form_for_case(&launched.reference(), form_values())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoPendingItem { kind: WorkItemKind::Form, .. }));
    assert!(err.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn failed_save_rolls_back_and_leaves_item_pending() {
    let script = WorkflowScript::new("Approval Only").approval_levels(1, "LDAP");
    let (engine, platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch("Approval Only", "spadmin", Variables::new())
        .await
        .unwrap();
    let case = launched.reference();
    let item = engine.work_items().approval_items(&case).await.remove(0);
    platform.fail_saves_for(&item.id);

    let err = engine.work_items().approve(&item.id, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Session(_)));
    assert_eq!(platform.journal().last(), Some(&TxEvent::Rollback));
    assert!(engine.work_items().has_pending_approvals(&case).await);
}

#[tokio::test(start_paused = true)]
async fn finished_items_are_not_revisited() {
    let script = WorkflowScript::new("Approval Only").approval_levels(1, "LDAP");
    let (engine, _platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch("Approval Only", "spadmin", Variables::new())
        .await
        .unwrap();
    let item = engine
        .work_items()
        .approval_items(&launched.reference())
        .await
        .remove(0);

    engine.work_items().approve(&item.id, Some("ok")).await.unwrap();
    let err = engine.work_items().reject(&item.id, None).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyFinished(_)));
}

#[tokio::test(start_paused = true)]
async fn item_finished_by_another_writer_is_left_alone() {
    let script = WorkflowScript::new("Approval Only").approval_levels(1, "LDAP");
    let (engine, platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch("Approval Only", "spadmin", Variables::new())
        .await
        .unwrap();
    let item = engine
        .work_items()
        .approval_items(&launched.reference())
        .await
        .remove(0);

    // finished between the engine's read and its transaction
    platform.finish_on_next_begin(&item.id);
    let err = engine.work_items().reject(&item.id, None).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyFinished(_)));
    assert_eq!(platform.journal().last(), Some(&TxEvent::Rollback));

    let stored = platform.items_for_case(&launched.name).remove(0);
    assert_eq!(
        stored.completion_comments.as_deref(),
        Some("Finished by another session")
    );
    assert!(!stored.approval_set().unwrap().has_rejection());
}

#[tokio::test(start_paused = true)]
async fn read_failures_look_empty_and_waits_recover() {
    let (engine, platform) = engine_with(vec![activation_script(1)]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();
    let case = launched.reference();

    platform.fail_next_reads(1);
    assert!(engine.work_items().find_by_case(&case).await.is_empty());
    assert_eq!(engine.work_items().find_by_case(&case).await.len(), 1);

    platform.fail_next_reads(1);
    assert!(engine.work_items().find_by_owner("spadmin").await.is_empty());

    platform.fail_next_reads(2);
    let start = Instant::now();
    let form = engine
        .work_items()
        .wait_for(&case, WorkItemKind::Form, Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(form.kind(), WorkItemKind::Form);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn polling_does_not_hold_the_session() {
    let (engine, _platform) = engine_with(vec![activation_script(1)]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();
    let case = launched.reference();

    let waiter = {
        let engine = engine.clone();
        let case = case.clone();
        tokio::spawn(async move {
            engine
                .work_items()
                .wait_for(&case, WorkItemKind::Approval, Duration::from_secs(30))
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(3)).await;
    engine
        .work_items()
        .complete_form_for_case(&case, form_values())
        .await
        .unwrap();

    let approval = waiter.await.unwrap().unwrap();
    assert_eq!(approval.owner_name(), Some("approver-1"));
}

// ── Approval Automation ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn full_activation_flow() {
    let (engine, _platform) = engine_with(vec![activation_script(3)]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();
    let case = launched.reference();

    engine
        .work_items()
        .complete_form_for_case(&case, form_values())
        .await
        .unwrap();

    let run = engine
        .approvals()
        .handle_all_approvals(&case, &ApprovalPolicy::default())
        .await
        .unwrap();
    assert_eq!(run.processed, 3);
    assert_eq!(run.stop, StopReason::CaseCompleted);
    let owners: Vec<_> = run.results.iter().map(|r| r.owner.clone().unwrap()).collect();
    assert_eq!(owners, vec!["approver-1", "approver-2", "approver-3"]);
    assert!(run.results.iter().all(|r| r.success));

    let finished = engine
        .controller()
        .wait_for_completion_default(&case)
        .await
        .unwrap();
    assert_eq!(finished.completion_status(), Some(CompletionStatus::Success));
    assert_eq!(engine.work_items().completed_approval_count(&case).await, 3);
    assert!(!engine.work_items().has_pending_approvals(&case).await);
}

#[tokio::test(start_paused = true)]
async fn approvals_stop_when_no_item_appears() {
    let script = WorkflowScript::new("Slow Chain")
        .approval_levels(2, "LDAP")
        .materialize_delay(Duration::from_secs(30));
    let (engine, _platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch("Slow Chain", "spadmin", Variables::new())
        .await
        .unwrap();

    let start = Instant::now();
    let run = engine
        .approvals()
        .handle_all_approvals(&launched.reference(), &ApprovalPolicy::default())
        .await
        .unwrap();
    assert_eq!(run.processed, 0);
    assert_eq!(run.stop, StopReason::NoMoreItems);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn approvals_stop_at_max_levels() {
    let script = WorkflowScript::new("Long Chain").approval_levels(5, "LDAP");
    let (engine, _platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch("Long Chain", "spadmin", Variables::new())
        .await
        .unwrap();
    let case = launched.reference();

    let policy = ApprovalPolicy::new(Duration::from_secs(10), 2);
    let run = engine.approvals().handle_all_approvals(&case, &policy).await.unwrap();
    assert_eq!(run.processed, 2);
    assert_eq!(run.stop, StopReason::MaxLevels);
    assert!(engine.work_items().has_pending_approvals(&case).await);
}

#[tokio::test(start_paused = true)]
async fn approval_failure_aborts_chain() {
    let script = WorkflowScript::new("Chain").approval_levels(3, "LDAP");
    let (engine, platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch("Chain", "spadmin", Variables::new())
        .await
        .unwrap();
    let case = launched.reference();

    let first = engine
        .approvals()
        .approve_single_level(&case, 1, &ApprovalPolicy::default())
        .await
        .unwrap();
    assert!(first.success);

    // level 2 appears on the next read; make its save fail
    let second = engine.work_items().approval_items(&case).await.remove(0);
    platform.fail_saves_for(&second.id);

    let err = engine
        .approvals()
        .handle_all_approvals(&case, &ApprovalPolicy::default())
        .await
        .unwrap_err();
    match err {
        EngineError::ChainAborted { level, processed, .. } => {
            assert_eq!(level, 1);
            assert_eq!(processed, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(platform.journal().last(), Some(&TxEvent::Rollback));
}

#[tokio::test(start_paused = true)]
async fn approve_single_level_reports_owner() {
    let script = WorkflowScript::new("Chain").approval(
        Owner::Identity("approver-2".into()),
        vec![ApprovalLine::new("Active Directory", "Enable").with_value("CN=Finance")],
    );
    let (engine, _platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch("Chain", "spadmin", Variables::new())
        .await
        .unwrap();

    let result = engine
        .approvals()
        .approve_single_level(&launched.reference(), 1, &ApprovalPolicy::default())
        .await
        .unwrap();
    assert_eq!(result.level, 1);
    assert_eq!(result.owner.as_deref(), Some("approver-2"));
    assert!(result.success);
    assert!(result.error.is_none());

    let err = engine
        .approvals()
        .approve_single_level(
            &launched.reference(),
            2,
            &ApprovalPolicy::new(Duration::from_secs(3), 1),
        )
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn rejection_stops_after_first_level() {
    let (engine, _platform) = engine_with(vec![activation_script(3)]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();
    let case = launched.reference();
    engine
        .work_items()
        .complete_form_for_case(&case, form_values())
        .await
        .unwrap();

    let run = engine
        .approvals()
        .handle_all_rejections(&case, &ApprovalPolicy::default())
        .await
        .unwrap();
    assert_eq!(run.processed, 1);
    assert_eq!(run.stop, StopReason::Rejected);
    assert!(!run.follow_up_pending);
    assert_eq!(
        engine.controller().status(&case).await.unwrap(),
        Some(CompletionStatus::Success)
    );
}

#[tokio::test(start_paused = true)]
async fn rejection_tolerates_a_further_level() {
    let script = WorkflowScript::new("Escalating")
        .approval_levels(2, "LDAP")
        .reject_terminates(false);
    let (engine, _platform) = engine_with(vec![script]).await;
    let launched = engine
        .controller()
        .launch("Escalating", "spadmin", Variables::new())
        .await
        .unwrap();

    let run = engine
        .approvals()
        .handle_all_rejections(&launched.reference(), &ApprovalPolicy::default())
        .await
        .unwrap();
    assert_eq!(run.processed, 1);
    assert_eq!(run.stop, StopReason::Rejected);
    assert!(run.follow_up_pending);
}

#[tokio::test(start_paused = true)]
async fn rejection_without_items() {
    let (engine, _platform) = engine_with(vec![activation_script(1)]).await;
    let launched = engine
        .controller()
        .launch(ACTIVATION, "spadmin", Variables::new())
        .await
        .unwrap();

    // the form is still open, so no approval item exists yet
    let policy = ApprovalPolicy::new(Duration::from_secs(2), 1);
    let run = engine
        .approvals()
        .handle_all_rejections(&launched.reference(), &policy)
        .await
        .unwrap();
    assert_eq!(run.processed, 0);
    assert_eq!(run.stop, StopReason::NoMoreItems);
}
