//! Integration tests for WorkflowEngine against the in-memory store.

use std::sync::Arc;

use chrono::Utc;
use fixflow_config::TaskTemplate;
use fixflow_engine::{
  Action, ActionOutcome, ChannelNotifier, EngineError, NewTask, WorkflowEngine, WorkflowEvent,
};
use fixflow_store::{MemoryStore, TaskStore};
use fixflow_workflow::{
  DecisionAnswer, GraphError, StepStatus, Task, TaskStatus, TaskStep, WorkflowError,
};

const ACTOR: &str = "alice";

fn task(task_id: &str, steps: Vec<TaskStep>) -> Task {
  Task {
    task_id: task_id.to_string(),
    title: "Crash on save".to_string(),
    description: "Editor crashes when saving large files".to_string(),
    status: TaskStatus::New,
    created_at: Utc::now(),
    completed_at: None,
    defect_id: "D-42".to_string(),
    product_version: Some("2.4.1".to_string()),
    steps,
  }
}

/// action, action, terminal
fn linear(task_id: &str) -> Task {
  task(
    task_id,
    vec![
      TaskStep::action("s1", task_id, "Reproduce", 1),
      TaskStep::action("s2", task_id, "Patch", 2),
      TaskStep::action("s3", task_id, "Verify and close", 3).terminal(),
    ],
  )
}

/// action x3, terminal
fn four_steps(task_id: &str) -> Task {
  task(
    task_id,
    vec![
      TaskStep::action("s1", task_id, "Reproduce", 1),
      TaskStep::action("s2", task_id, "Find root cause", 2),
      TaskStep::action("s3", task_id, "Patch", 3),
      TaskStep::action("s4", task_id, "Verify and close", 4).terminal(),
    ],
  )
}

/// Decision first: Yes goes to a terminal, No to an action followed by a terminal.
fn decision_first(task_id: &str) -> Task {
  task(
    task_id,
    vec![
      TaskStep::action("d1", task_id, "Already fixed upstream?", 1)
        .decision("a", "b")
        .with_note_required(),
      TaskStep::action("b", task_id, "Backport the fix", 2),
      TaskStep::action("c", task_id, "Verify backport", 3).terminal(),
      TaskStep::action("a", task_id, "Close as duplicate", 4).terminal(),
    ],
  )
}

fn engine() -> WorkflowEngine {
  WorkflowEngine::new(Arc::new(MemoryStore::new()))
}

fn in_progress(task: &Task) -> Vec<&str> {
  task
    .steps
    .iter()
    .filter(|s| s.status == StepStatus::InProgress)
    .map(|s| s.step_id.as_str())
    .collect()
}

fn workflow_error(result: Result<impl std::fmt::Debug, EngineError>) -> WorkflowError {
  match result {
    Err(EngineError::Workflow(err)) => err,
    other => panic!("expected a workflow error, got {other:?}"),
  }
}

#[tokio::test]
async fn test_linear_task_to_completion() {
  let engine = engine();
  engine.create_task(linear("t1"), ACTOR).await.unwrap();

  let state = engine.complete_step("t1", "s1", None, ACTOR).await.unwrap();
  assert_eq!(state.task_status, TaskStatus::InProgress);
  assert_eq!(state.current_step.unwrap().step_id, "s2");
  assert_eq!(state.completed_steps.len(), 1);

  engine.complete_step("t1", "s2", None, ACTOR).await.unwrap();

  let err = workflow_error(engine.complete_step("t1", "s3", None, ACTOR).await);
  assert_eq!(
    err,
    WorkflowError::NoteRequired {
      step_id: "s3".to_string()
    }
  );

  let state = engine
    .complete_step("t1", "s3", Some("done"), ACTOR)
    .await
    .unwrap();
  assert_eq!(state.task_status, TaskStatus::Done);
  assert!(state.current_step.is_none());
  assert!(state.preview.is_empty());
  assert_eq!(state.progress.completed_steps_count, 3);
  assert_eq!(state.progress.completion_percentage, 100);
  assert!(state.progress.is_complete);

  let task = engine.get_task("t1").await.unwrap();
  assert!(task.completed_at.is_some());
  assert_eq!(task.step("s3").unwrap().notes.as_deref(), Some("done"));
  assert_eq!(task.step("s1").unwrap().completed_by.as_deref(), Some(ACTOR));
}

#[tokio::test]
async fn test_decision_promotes_selected_branch() {
  let engine = engine();
  let state = engine.create_task(decision_first("t1"), ACTOR).await.unwrap();

  let preview: Vec<(&str, Option<DecisionAnswer>)> = state
    .preview
    .iter()
    .map(|p| (p.step.step_id.as_str(), p.condition))
    .collect();
  assert_eq!(
    preview,
    vec![
      ("a", Some(DecisionAnswer::Yes)),
      ("b", Some(DecisionAnswer::No))
    ]
  );

  let err = workflow_error(
    engine
      .make_decision("t1", "d1", "Maybe", Some("unsure"), ACTOR)
      .await,
  );
  assert!(matches!(err, WorkflowError::InvalidAnswer { ref answer, .. } if answer == "Maybe"));

  let err = workflow_error(engine.make_decision("t1", "d1", "yes", Some("x"), ACTOR).await);
  assert!(matches!(err, WorkflowError::InvalidAnswer { .. }));

  let err = workflow_error(engine.make_decision("t1", "d1", "Yes", None, ACTOR).await);
  assert!(matches!(err, WorkflowError::NoteRequired { .. }));

  let state = engine
    .make_decision("t1", "d1", "Yes", Some("because X"), ACTOR)
    .await
    .unwrap();
  assert_eq!(state.current_step.as_ref().unwrap().step_id, "a");
  assert_eq!(state.task_status, TaskStatus::InProgress);
  assert!(state.preview.is_empty());

  let task = engine.get_task("t1").await.unwrap();
  let d1 = task.step("d1").unwrap();
  assert_eq!(d1.decision_answer, Some(DecisionAnswer::Yes));
  assert_eq!(d1.notes.as_deref(), Some("because X"));
  assert_eq!(task.step("b").unwrap().status, StepStatus::New);

  let state = engine
    .complete_step("t1", "a", Some("duplicate of D-7"), ACTOR)
    .await
    .unwrap();
  assert_eq!(state.task_status, TaskStatus::Done);
  // The untaken branch stays New and never counts as completed.
  assert_eq!(state.progress.completed_steps_count, 2);
  assert_eq!(state.progress.total_steps_count, 4);
  assert_eq!(state.progress.completion_percentage, 50);
  assert!(state.progress.is_complete);
}

#[tokio::test]
async fn test_decision_no_branch_continues_by_order() {
  let engine = engine();
  engine.create_task(decision_first("t1"), ACTOR).await.unwrap();

  let state = engine
    .make_decision("t1", "d1", "No", Some("not upstream"), ACTOR)
    .await
    .unwrap();
  assert_eq!(state.current_step.unwrap().step_id, "b");
  assert_eq!(state.preview.len(), 1);
  assert_eq!(state.preview[0].step.step_id, "c");

  let state = engine.complete_step("t1", "b", None, ACTOR).await.unwrap();
  assert_eq!(state.current_step.unwrap().step_id, "c");
}

#[tokio::test]
async fn test_decision_step_cannot_be_completed() {
  let engine = engine();
  engine.create_task(decision_first("t1"), ACTOR).await.unwrap();

  let err = workflow_error(engine.complete_step("t1", "d1", Some("x"), ACTOR).await);
  assert!(matches!(err, WorkflowError::NotADecisionAction { .. }));

  engine.create_task(linear("t2"), ACTOR).await.unwrap();
  let err = workflow_error(engine.make_decision("t2", "s1", "Yes", None, ACTOR).await);
  assert!(matches!(err, WorkflowError::NotADecisionStep { .. }));
}

#[tokio::test]
async fn test_go_back_rolls_back_later_steps() {
  let engine = engine();
  engine.create_task(four_steps("t1"), ACTOR).await.unwrap();
  for step in ["s1", "s2", "s3"] {
    engine.complete_step("t1", step, None, ACTOR).await.unwrap();
  }

  let state = engine.go_back("t1", "s2", ACTOR).await.unwrap();
  assert_eq!(state.task_status, TaskStatus::InProgress);
  assert_eq!(state.current_step.as_ref().unwrap().step_id, "s2");
  let completed: Vec<&str> = state
    .completed_steps
    .iter()
    .map(|s| s.step_id.as_str())
    .collect();
  assert_eq!(completed, vec!["s1"]);

  let task = engine.get_task("t1").await.unwrap();
  assert_eq!(task.step("s3").unwrap().status, StepStatus::New);
  assert_eq!(task.step("s4").unwrap().status, StepStatus::New);
  assert_eq!(in_progress(&task), vec!["s2"]);
}

#[tokio::test]
async fn test_go_back_reopens_finished_task() {
  let engine = engine();
  engine.create_task(four_steps("t1"), ACTOR).await.unwrap();
  for step in ["s1", "s2", "s3"] {
    engine.complete_step("t1", step, None, ACTOR).await.unwrap();
  }
  let state = engine
    .complete_step("t1", "s4", Some("verified"), ACTOR)
    .await
    .unwrap();
  assert_eq!(state.task_status, TaskStatus::Done);

  let state = engine.go_back("t1", "s2", ACTOR).await.unwrap();
  assert_eq!(state.task_status, TaskStatus::InProgress);
  assert_eq!(state.current_step.unwrap().step_id, "s2");

  let task = engine.get_task("t1").await.unwrap();
  assert!(task.completed_at.is_none());
  let s4 = task.step("s4").unwrap();
  assert_eq!(s4.status, StepStatus::New);
  assert!(s4.notes.is_none());
  assert_eq!(in_progress(&task), vec!["s2"]);
}

#[tokio::test]
async fn test_go_back_after_decision_clears_answer() {
  let engine = engine();
  engine.create_task(decision_first("t1"), ACTOR).await.unwrap();
  engine
    .make_decision("t1", "d1", "No", Some("not upstream"), ACTOR)
    .await
    .unwrap();
  engine.complete_step("t1", "b", None, ACTOR).await.unwrap();

  let state = engine.go_back("t1", "d1", ACTOR).await.unwrap();
  assert_eq!(state.current_step.as_ref().unwrap().step_id, "d1");
  assert_eq!(state.preview.len(), 2);

  let task = engine.get_task("t1").await.unwrap();
  assert_eq!(task.step("d1").unwrap().decision_answer, None);
  assert_eq!(task.step("b").unwrap().status, StepStatus::New);
  assert_eq!(task.step("c").unwrap().status, StepStatus::New);

  // The other branch is now reachable.
  let state = engine
    .make_decision("t1", "d1", "Yes", Some("found it upstream"), ACTOR)
    .await
    .unwrap();
  assert_eq!(state.current_step.unwrap().step_id, "a");
}

#[tokio::test]
async fn test_go_back_requires_completed_target() {
  let engine = engine();
  engine.create_task(four_steps("t1"), ACTOR).await.unwrap();
  engine.complete_step("t1", "s1", None, ACTOR).await.unwrap();

  for target in ["s2", "s3"] {
    let err = workflow_error(engine.go_back("t1", target, ACTOR).await);
    assert!(matches!(err, WorkflowError::StepNotCompleted { .. }));
  }
  let err = workflow_error(engine.go_back("t1", "nope", ACTOR).await);
  assert!(matches!(err, WorkflowError::StepNotFound { .. }));
}

#[tokio::test]
async fn test_complete_then_go_back_round_trip() {
  let engine = engine();
  engine.create_task(linear("t1"), ACTOR).await.unwrap();
  engine
    .complete_step("t1", "s1", Some("reproduced on 2.4.1"), ACTOR)
    .await
    .unwrap();

  let state = engine.go_back("t1", "s1", ACTOR).await.unwrap();
  let current = state.current_step.unwrap();
  assert_eq!(current.step_id, "s1");
  assert!(current.completed_at.is_none());
  assert!(current.notes.is_none());
  assert!(current.completed_by.is_none());
  assert!(state.completed_steps.is_empty());
}

#[tokio::test]
async fn test_step_not_current_leaves_state_unchanged() {
  let store = Arc::new(MemoryStore::new());
  let engine = WorkflowEngine::new(store.clone());
  engine.create_task(linear("t1"), ACTOR).await.unwrap();

  let before = engine.get_state("t1").await.unwrap();
  let err = workflow_error(engine.complete_step("t1", "s2", None, ACTOR).await);
  assert_eq!(
    err,
    WorkflowError::StepNotCurrent {
      step_id: "s2".to_string(),
      current: Some("s1".to_string()),
    }
  );

  assert_eq!(engine.get_state("t1").await.unwrap(), before);
  let stored = store.get_task("t1").await.unwrap();
  assert_eq!(stored, engine.get_task("t1").await.unwrap());
  assert_eq!(stored.status, TaskStatus::New);
}

#[tokio::test]
async fn test_finished_task_rejects_actions() {
  let engine = engine();
  engine.create_task(linear("t1"), ACTOR).await.unwrap();
  engine.complete_step("t1", "s1", None, ACTOR).await.unwrap();
  engine.complete_step("t1", "s2", None, ACTOR).await.unwrap();
  engine
    .complete_step("t1", "s3", Some("done"), ACTOR)
    .await
    .unwrap();

  let err = workflow_error(engine.complete_step("t1", "s3", Some("again"), ACTOR).await);
  assert!(matches!(err, WorkflowError::TaskAlreadyComplete { .. }));
}

#[tokio::test]
async fn test_whitespace_note_does_not_satisfy_requirement() {
  let engine = engine();
  let mut t = linear("t1");
  t.steps[0] = TaskStep::action("s1", "t1", "Reproduce", 1).with_note_required();
  engine.create_task(t, ACTOR).await.unwrap();

  let err = workflow_error(engine.complete_step("t1", "s1", Some("   \n"), ACTOR).await);
  assert!(matches!(err, WorkflowError::NoteRequired { .. }));
}

#[tokio::test]
async fn test_get_state_is_idempotent() {
  let engine = engine();
  engine.create_task(decision_first("t1"), ACTOR).await.unwrap();

  let first = engine.get_state("t1").await.unwrap();
  let second = engine.get_state("t1").await.unwrap();
  assert_eq!(first, second);

  // Reading the preview never promotes anything.
  let task = engine.get_task("t1").await.unwrap();
  assert!(in_progress(&task).is_empty());
  assert_eq!(task.status, TaskStatus::New);
}

#[tokio::test]
async fn test_at_most_one_step_in_progress() {
  let engine = engine();
  engine.create_task(decision_first("t1"), ACTOR).await.unwrap();

  let actions = vec![
    Action::DecideNo {
      step_id: "d1".to_string(),
      note: Some("not upstream".to_string()),
    },
    Action::Complete {
      step_id: "b".to_string(),
      note: None,
    },
    Action::GoBack {
      step_id: "d1".to_string(),
    },
    Action::DecideYes {
      step_id: "d1".to_string(),
      note: Some("upstream after all".to_string()),
    },
    Action::Complete {
      step_id: "a".to_string(),
      note: Some("closed".to_string()),
    },
  ];

  for action in actions {
    engine.apply("t1", action, ACTOR).await.unwrap();
    let task = engine.get_task("t1").await.unwrap();
    assert!(in_progress(&task).len() <= 1);
    let state = engine.get_state("t1").await.unwrap();
    assert!(state.progress.completed_steps_count <= state.progress.total_steps_count);
  }
}

#[tokio::test]
async fn test_empty_task() {
  let engine = engine();
  let state = engine.create_task(task("t1", Vec::new()), ACTOR).await.unwrap();

  assert!(state.current_step.is_none());
  assert!(state.preview.is_empty());
  assert_eq!(state.progress.total_steps_count, 0);
  assert_eq!(state.progress.completion_percentage, 0);
  assert!(!state.progress.is_complete);
}

#[tokio::test]
async fn test_completion_order_follows_actions() {
  let engine = engine();
  engine.create_task(four_steps("t1"), ACTOR).await.unwrap();
  for step in ["s1", "s2", "s3"] {
    engine.complete_step("t1", step, None, ACTOR).await.unwrap();
  }

  let state = engine.get_state("t1").await.unwrap();
  let times: Vec<_> = state
    .completed_steps
    .iter()
    .map(|s| s.completed_at.unwrap())
    .collect();
  assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_unknown_task() {
  let engine = engine();
  assert!(matches!(
    engine.get_state("missing").await,
    Err(EngineError::TaskNotFound { .. })
  ));
  assert!(matches!(
    engine.add_note("missing", "hello", ACTOR).await,
    Err(EngineError::TaskNotFound { .. })
  ));
}

#[tokio::test]
async fn test_invalid_graph_is_fatal_at_load() {
  let store = Arc::new(MemoryStore::new());
  let mut broken = linear("t1");
  broken.steps[1] = TaskStep::action("s2", "t1", "Fixed?", 2).decision("s3", "missing");
  store.create_task(&broken).await.unwrap();

  let engine = WorkflowEngine::new(store);
  let err = engine.get_state("t1").await.unwrap_err();
  assert!(err.is_exceptional());
  assert!(matches!(
    err,
    EngineError::Workflow(WorkflowError::InvalidGraph(GraphError::DanglingEdge { .. }))
  ));

  let err = engine
    .complete_step("t1", "s1", None, ACTOR)
    .await
    .unwrap_err();
  assert!(err.is_exceptional());
}

#[tokio::test]
async fn test_two_steps_in_progress_is_invalid() {
  let store = Arc::new(MemoryStore::new());
  let mut broken = linear("t1");
  broken.status = TaskStatus::InProgress;
  broken.steps[0].status = StepStatus::InProgress;
  broken.steps[1].status = StepStatus::InProgress;
  store.create_task(&broken).await.unwrap();

  let engine = WorkflowEngine::new(store);
  assert!(matches!(
    engine.get_state("t1").await,
    Err(EngineError::Workflow(WorkflowError::InvalidGraph(
      GraphError::MultipleCurrentSteps { .. }
    )))
  ));
}

#[tokio::test]
async fn test_create_rejects_invalid_graph() {
  let engine = engine();
  let mut broken = linear("t1");
  broken.steps[2] = TaskStep::action("s3", "t1", "Verify", 3);

  let err = engine.create_task(broken, ACTOR).await.unwrap_err();
  assert!(matches!(
    err,
    EngineError::Workflow(WorkflowError::InvalidGraph(GraphError::MissingSuccessor { .. }))
  ));
  assert!(matches!(
    engine.get_state("t1").await,
    Err(EngineError::TaskNotFound { .. })
  ));
}

#[tokio::test]
async fn test_user_rejections_are_not_exceptional() {
  let engine = engine();
  engine.create_task(linear("t1"), ACTOR).await.unwrap();

  let err = engine
    .complete_step("t1", "s3", Some("x"), ACTOR)
    .await
    .unwrap_err();
  assert!(!err.is_exceptional());
  assert!(err.as_workflow().is_some());
}

#[tokio::test]
async fn test_notes_do_not_change_state() {
  let engine = engine();
  engine.create_task(linear("t1"), ACTOR).await.unwrap();
  let before = engine.get_state("t1").await.unwrap();

  let first = engine
    .add_note("t1", "customer confirmed repro", ACTOR)
    .await
    .unwrap();
  let second = engine.add_note("t1", "", "bob").await.unwrap();

  assert_eq!(first.task_id, "t1");
  assert_eq!(first.author, ACTOR);
  assert_eq!(second.author, "bob");
  assert_ne!(first.note_id, second.note_id);
  assert_eq!(engine.get_state("t1").await.unwrap(), before);

  let notes = engine.list_notes("t1").await.unwrap();
  let ids: Vec<&str> = notes.iter().map(|n| n.note_id.as_str()).collect();
  assert_eq!(ids, vec![first.note_id.as_str(), second.note_id.as_str()]);
}

#[tokio::test]
async fn test_notes_on_finished_task() {
  let engine = engine();
  engine.create_task(linear("t1"), ACTOR).await.unwrap();
  engine.complete_step("t1", "s1", None, ACTOR).await.unwrap();
  engine.complete_step("t1", "s2", None, ACTOR).await.unwrap();
  engine
    .complete_step("t1", "s3", Some("done"), ACTOR)
    .await
    .unwrap();

  let outcome = engine
    .apply(
      "t1",
      Action::AddNote {
        content: "follow-up in D-43".to_string(),
      },
      ACTOR,
    )
    .await
    .unwrap();
  match outcome {
    ActionOutcome::Note(note) => assert_eq!(note.content, "follow-up in D-43"),
    other => panic!("expected a note, got {other:?}"),
  }
}

#[tokio::test]
async fn test_apply_from_json() {
  let engine = engine();
  engine.create_task(linear("t1"), ACTOR).await.unwrap();

  let action: Action =
    serde_json::from_str(r#"{ "action": "complete", "step_id": "s1", "note": "ok" }"#).unwrap();
  match engine.apply("t1", action, ACTOR).await.unwrap() {
    ActionOutcome::State(state) => assert_eq!(state.current_step.unwrap().step_id, "s2"),
    other => panic!("expected state, got {other:?}"),
  }
}

#[tokio::test]
async fn test_events_follow_committed_actions() {
  let (notifier, mut events) = ChannelNotifier::channel();
  let engine = WorkflowEngine::with_notifier(Arc::new(MemoryStore::new()), notifier);

  engine.create_task(decision_first("t1"), ACTOR).await.unwrap();
  engine
    .make_decision("t1", "d1", "Yes", Some("upstream"), ACTOR)
    .await
    .unwrap();
  // rejected: emits nothing
  let _ = engine.complete_step("t1", "a", None, ACTOR).await;
  engine
    .complete_step("t1", "a", Some("closed"), "bob")
    .await
    .unwrap();

  let mut received = Vec::new();
  while let Ok(event) = events.try_recv() {
    received.push(event);
  }

  assert_eq!(
    received,
    vec![
      WorkflowEvent::TaskCreated {
        task_id: "t1".to_string(),
        actor: ACTOR.to_string(),
      },
      WorkflowEvent::DecisionMade {
        task_id: "t1".to_string(),
        step_id: "d1".to_string(),
        answer: DecisionAnswer::Yes,
        actor: ACTOR.to_string(),
        next_step_id: "a".to_string(),
      },
      WorkflowEvent::StepCompleted {
        task_id: "t1".to_string(),
        step_id: "a".to_string(),
        actor: "bob".to_string(),
        next_step_id: None,
      },
      WorkflowEvent::TaskCompleted {
        task_id: "t1".to_string(),
        actor: "bob".to_string(),
      },
    ]
  );
}

#[tokio::test]
async fn test_evict_reloads_from_store() {
  let engine = engine();
  engine.create_task(linear("t1"), ACTOR).await.unwrap();
  engine.complete_step("t1", "s1", None, ACTOR).await.unwrap();
  let before = engine.get_state("t1").await.unwrap();

  assert!(engine.evict("t1").await);
  assert!(!engine.evict("t1").await);
  assert_eq!(engine.get_state("t1").await.unwrap(), before);
}

#[tokio::test]
async fn test_summaries_and_rollup() {
  let engine = engine();
  engine.create_task(linear("t1"), ACTOR).await.unwrap();
  engine.create_task(four_steps("t2"), ACTOR).await.unwrap();
  engine.complete_step("t1", "s1", None, ACTOR).await.unwrap();
  engine.complete_step("t1", "s2", None, ACTOR).await.unwrap();
  engine
    .complete_step("t1", "s3", Some("done"), ACTOR)
    .await
    .unwrap();
  engine.complete_step("t2", "s1", None, ACTOR).await.unwrap();

  let summaries = engine.summaries().await.unwrap();
  assert_eq!(summaries.len(), 2);
  let t1 = summaries.iter().find(|s| s.task_id == "t1").unwrap();
  assert_eq!(t1.status, TaskStatus::Done);
  assert_eq!(t1.progress.completion_percentage, 100);
  let t2 = summaries.iter().find(|s| s.task_id == "t2").unwrap();
  assert_eq!(t2.progress.completion_percentage, 25);

  let report = engine.report().await.unwrap();
  assert_eq!(report.tasks, summaries);
  let rollup = report.rollup;
  assert_eq!(rollup.task_count, 2);
  assert_eq!(rollup.completed_task_count, 1);
  assert_eq!(rollup.completed_steps_count, 4);
  assert_eq!(rollup.total_steps_count, 7);
  assert_eq!(rollup.completion_percentage, 57);
}

const TRIAGE: &str = r#"{
  "template_id": "triage",
  "name": "Defect triage",
  "steps": [
    { "key": "repro", "action": "Reproduce the defect", "order": 1, "type": "action" },
    { "key": "upstream", "action": "Fixed upstream?", "order": 2, "type": "decision",
      "if_yes": "dup", "if_no": "patch", "requires_note": true },
    { "key": "patch", "action": "Apply patch", "order": 3, "type": "action" },
    { "key": "verify", "action": "Verify and close", "order": 4, "type": "terminal" },
    { "key": "dup", "action": "Close as duplicate", "order": 5, "type": "terminal" }
  ]
}"#;

#[tokio::test]
async fn test_task_from_template() {
  let engine = engine();
  let template = TaskTemplate::from_json(TRIAGE).unwrap();
  let state = engine
    .create_from_template(
      &template,
      NewTask {
        title: "Crash on save".to_string(),
        defect_id: "D-42".to_string(),
        ..Default::default()
      },
      ACTOR,
    )
    .await
    .unwrap();
  let task_id = state.task_id.clone();

  let repro = state.current_step.unwrap();
  assert_eq!(repro.action, "Reproduce the defect");
  engine
    .complete_step(&task_id, &repro.step_id, None, ACTOR)
    .await
    .unwrap();

  let state = engine.get_state(&task_id).await.unwrap();
  let upstream = state.current_step.unwrap();
  assert!(upstream.is_decision);
  let state = engine
    .make_decision(&task_id, &upstream.step_id, "No", Some("local bug"), ACTOR)
    .await
    .unwrap();
  assert_eq!(state.current_step.unwrap().action, "Apply patch");

  let summaries = engine.summaries().await.unwrap();
  assert_eq!(summaries[0].title, "Crash on save");
  assert_eq!(summaries[0].progress.completed_steps_count, 2);
}
