//! End-to-end decision scenarios driven through the fluent surface.

use tiller_dsl::{CustomUnit, TaskUnit, TimerUnit, WorkflowBuilder};
use tiller_types::{
    Action, ControlPayload, Decision, EventId, EventLog, HistoryAttributes, HistoryRecord,
    UnitEventDetail, UnitIdentity,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn task_token(name: &str) -> String {
    UnitIdentity::task(name, "1.0")
        .unwrap()
        .token()
        .as_str()
        .to_string()
}

fn timer_token(name: &str) -> String {
    UnitIdentity::timer(name)
        .unwrap()
        .token()
        .as_str()
        .to_string()
}

fn workflow_started(id: u64, input: &str) -> HistoryRecord {
    HistoryRecord::new(
        id,
        HistoryAttributes::WorkflowStarted {
            input: input.into(),
        },
    )
}

fn scheduled(id: u64, name: &str) -> HistoryRecord {
    HistoryRecord::new(
        id,
        HistoryAttributes::TaskScheduled {
            name: name.into(),
            version: "1.0".into(),
            token: task_token(name),
            control: "{}".into(),
            input: "".into(),
        },
    )
}

fn started(id: u64, scheduled_id: u64) -> HistoryRecord {
    HistoryRecord::new(
        id,
        HistoryAttributes::TaskStarted {
            scheduled_id: EventId(scheduled_id),
        },
    )
}

fn completed(id: u64, scheduled_id: u64, result: &str) -> HistoryRecord {
    HistoryRecord::new(
        id,
        HistoryAttributes::TaskCompleted {
            scheduled_id: EventId(scheduled_id),
            started_id: EventId(scheduled_id + 1),
            result: result.into(),
        },
    )
}

fn failed(id: u64, scheduled_id: u64, reason: &str, detail: &str) -> HistoryRecord {
    HistoryRecord::new(
        id,
        HistoryAttributes::TaskFailed {
            scheduled_id: EventId(scheduled_id),
            started_id: EventId(scheduled_id + 1),
            reason: reason.into(),
            detail: detail.into(),
        },
    )
}

fn cancelled(id: u64, scheduled_id: u64) -> HistoryRecord {
    HistoryRecord::new(
        id,
        HistoryAttributes::TaskCancelled {
            scheduled_id: EventId(scheduled_id),
            started_id: EventId(scheduled_id + 1),
            detail: "".into(),
        },
    )
}

fn reschedule_timer_started(id: u64, token: &str) -> HistoryRecord {
    HistoryRecord::new(
        id,
        HistoryAttributes::TimerStarted {
            token: token.into(),
            duration_secs: 60,
            control: ControlPayload::reschedule().encode().unwrap(),
        },
    )
}

fn timer_fired(id: u64, token: &str, started_id: u64) -> HistoryRecord {
    HistoryRecord::new(
        id,
        HistoryAttributes::TimerFired {
            token: token.into(),
            started_id: EventId(started_id),
        },
    )
}

#[test]
fn completed_parent_schedules_child_with_parent_result() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("pipeline", "1.0")
        .with_task(TaskUnit::new("a", "1.0"))
        .with_task(
            TaskUnit::new("b", "1.0")
                .after_task("a", "1.0")
                .with_input(|ctx| Ok(ctx.parent_result("a", "1.0")?.unwrap_or_default())),
        )
        .build()
        .unwrap();

    let log = EventLog::new(
        vec![
            completed(4, 2, "x"),
            started(3, 2),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(2),
        EventId(4),
    )
    .unwrap();

    let decisions = orchestrator.decide(&log).unwrap();
    assert_eq!(decisions.len(), 1);
    assert!(matches!(
        &decisions[0],
        Decision::ScheduleTask { name, input, .. } if name == "b" && input == "x"
    ));
}

#[test]
fn failure_handler_fails_the_workflow_with_event_detail() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("fragile", "1.0")
        .with_task(TaskUnit::new("a", "1.0").on_failure(|event| {
            match &event.detail {
                UnitEventDetail::TaskFailed { reason, detail } => {
                    Action::fail(reason.clone(), detail.clone())
                }
                _ => Action::ignore(),
            }
        }))
        .build()
        .unwrap();

    let log = EventLog::new(
        vec![
            failed(4, 2, "R", "D"),
            started(3, 2),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(2),
        EventId(4),
    )
    .unwrap();

    assert_eq!(
        orchestrator.decide(&log).unwrap(),
        vec![Decision::FailWorkflow {
            reason: "R".into(),
            detail: "D".into(),
        }]
    );
}

#[test]
fn reschedule_degrades_to_default_after_the_limit() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("retrying", "1.0")
        .with_task(
            TaskUnit::new("flaky", "1.0")
                .on_failure(|_| Action::reschedule().after_secs(60).up_to(2)),
        )
        .build()
        .unwrap();
    let token = task_token("flaky");

    // first failure: below the limit, a reschedule timer is due
    let log = EventLog::new(
        vec![
            failed(4, 2, "boom", ""),
            started(3, 2),
            scheduled(2, "flaky"),
            workflow_started(1, ""),
        ],
        EventId(3),
        EventId(4),
    )
    .unwrap();
    let decisions = orchestrator.decide(&log).unwrap();
    assert!(matches!(
        decisions.as_slice(),
        [Decision::StartTimer {
            duration_secs: 60,
            ..
        }]
    ));

    // the reschedule timer fires: the task is scheduled again
    let log = EventLog::new(
        vec![
            timer_fired(6, &token, 5),
            reschedule_timer_started(5, &token),
            failed(4, 2, "boom", ""),
            started(3, 2),
            scheduled(2, "flaky"),
            workflow_started(1, ""),
        ],
        EventId(5),
        EventId(6),
    )
    .unwrap();
    let decisions = orchestrator.decide(&log).unwrap();
    assert!(matches!(
        decisions.as_slice(),
        [Decision::ScheduleTask { name, .. }] if name == "flaky"
    ));

    // third failure: the limit of 2 attempts is exhausted, degrade to the
    // default terminal action
    let log = EventLog::new(
        vec![
            failed(14, 12, "boom", "gave up"),
            started(13, 12),
            scheduled(12, "flaky"),
            timer_fired(11, &token, 10),
            reschedule_timer_started(10, &token),
            failed(9, 7, "boom", ""),
            started(8, 7),
            scheduled(7, "flaky"),
            timer_fired(6, &token, 5),
            reschedule_timer_started(5, &token),
            failed(4, 2, "boom", ""),
            started(3, 2),
            scheduled(2, "flaky"),
            workflow_started(1, ""),
        ],
        EventId(13),
        EventId(14),
    )
    .unwrap();
    assert_eq!(
        orchestrator.decide(&log).unwrap(),
        vec![Decision::FailWorkflow {
            reason: "boom".into(),
            detail: "gave up".into(),
        }]
    );
}

#[test]
fn simultaneous_fail_and_cancel_resolve_to_fail() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("racing", "1.0")
        .with_task(TaskUnit::new("a", "1.0"))
        .with_task(TaskUnit::new("b", "1.0"))
        .build()
        .unwrap();

    let log = EventLog::new(
        vec![
            cancelled(7, 3),
            failed(6, 2, "R", "D"),
            started(5, 3),
            started(4, 2),
            scheduled(3, "b"),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(5),
        EventId(7),
    )
    .unwrap();

    assert_eq!(
        orchestrator.decide(&log).unwrap(),
        vec![Decision::FailWorkflow {
            reason: "R".into(),
            detail: "D".into(),
        }]
    );
}

#[test]
fn join_is_gated_until_every_parent_branch_quiesces() {
    init_tracing();
    let builder = || {
        WorkflowBuilder::new("diamond", "1.0")
            .with_task(TaskUnit::new("a", "1.0"))
            .with_task(TaskUnit::new("b", "1.0").after_task("a", "1.0"))
            .with_task(TaskUnit::new("c", "1.0").after_task("a", "1.0"))
            .with_task(
                TaskUnit::new("d", "1.0")
                    .after_task("b", "1.0")
                    .after_task("c", "1.0"),
            )
            .build()
            .unwrap()
    };

    // c still running: b's completion must not unlock d
    let gated_log = EventLog::new(
        vec![
            completed(9, 5, "b-done"),
            started(8, 6),
            started(7, 5),
            scheduled(6, "c"),
            scheduled(5, "b"),
            completed(4, 2, "a-done"),
            started(3, 2),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(8),
        EventId(9),
    )
    .unwrap();
    assert!(builder().decide(&gated_log).unwrap().is_empty());

    // both branches quiesced: d becomes schedulable exactly once
    let open_log = EventLog::new(
        vec![
            completed(10, 6, "c-done"),
            completed(9, 5, "b-done"),
            started(8, 6),
            started(7, 5),
            scheduled(6, "c"),
            scheduled(5, "b"),
            completed(4, 2, "a-done"),
            started(3, 2),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(8),
        EventId(10),
    )
    .unwrap();
    let decisions = builder().decide(&open_log).unwrap();
    assert_eq!(decisions.len(), 1);
    assert!(matches!(
        &decisions[0],
        Decision::ScheduleTask { name, .. } if name == "d"
    ));
}

#[test]
fn implicit_completion_is_suppressed_while_work_is_outstanding() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("busy", "1.0")
        .with_task(TaskUnit::new("a", "1.0"))
        .with_task(TaskUnit::new("b", "1.0"))
        .build()
        .unwrap();

    // a is done but b is still in flight: no completion proposal survives
    let log = EventLog::new(
        vec![
            completed(5, 2, "done"),
            started(4, 2),
            scheduled(3, "b"),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(4),
        EventId(5),
    )
    .unwrap();
    assert!(orchestrator.decide(&log).unwrap().is_empty());

    // once b resolves too, the proposal goes through
    let log = EventLog::new(
        vec![
            completed(7, 3, "late"),
            started(6, 3),
            completed(5, 2, "done"),
            started(4, 2),
            scheduled(3, "b"),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(5),
        EventId(7),
    )
    .unwrap();
    assert_eq!(
        orchestrator.decide(&log).unwrap(),
        vec![Decision::CompleteWorkflow {
            result: "late".into(),
            proposal: true,
        }]
    );
}

#[test]
fn timer_unit_bridges_two_tasks() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("cooled", "1.0")
        .with_task(TaskUnit::new("a", "1.0"))
        .with_timer(
            TimerUnit::new("cooldown")
                .fire_after_secs(30)
                .after_task("a", "1.0"),
        )
        .with_task(TaskUnit::new("b", "1.0").after_timer("cooldown"))
        .build()
        .unwrap();

    // a completes: the cooldown timer starts
    let log = EventLog::new(
        vec![
            completed(4, 2, "a-done"),
            started(3, 2),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(3),
        EventId(4),
    )
    .unwrap();
    let decisions = orchestrator.decide(&log).unwrap();
    assert!(matches!(
        decisions.as_slice(),
        [Decision::StartTimer {
            duration_secs: 30,
            ..
        }]
    ));

    // the timer fires: b is scheduled
    let token = timer_token("cooldown");
    let log = EventLog::new(
        vec![
            HistoryRecord::new(
                6,
                HistoryAttributes::TimerFired {
                    token: token.clone(),
                    started_id: EventId(5),
                },
            ),
            HistoryRecord::new(
                5,
                HistoryAttributes::TimerStarted {
                    token,
                    duration_secs: 30,
                    control: ControlPayload::for_timer("cooldown").encode().unwrap(),
                },
            ),
            completed(4, 2, "a-done"),
            started(3, 2),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(5),
        EventId(6),
    )
    .unwrap();
    let decisions = orchestrator.decide(&log).unwrap();
    assert!(matches!(
        decisions.as_slice(),
        [Decision::ScheduleTask { name, .. }] if name == "b"
    ));
}

#[test]
fn signal_handler_emits_a_marker() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("listening", "1.0")
        .with_task(TaskUnit::new("a", "1.0"))
        .on_signal(|event| match &event.kind {
            tiller_types::FlowEventKind::Signaled { name, .. } => {
                Action::record_marker("signal-received", name.clone())
            }
            _ => Action::ignore(),
        })
        .build()
        .unwrap();

    let log = EventLog::new(
        vec![
            HistoryRecord::new(
                3,
                HistoryAttributes::WorkflowSignaled {
                    name: "go-faster".into(),
                    input: "".into(),
                },
            ),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(2),
        EventId(3),
    )
    .unwrap();

    assert_eq!(
        orchestrator.decide(&log).unwrap(),
        vec![Decision::RecordMarker {
            name: "signal-received".into(),
            detail: "go-faster".into(),
        }]
    );
}

#[test]
fn custom_root_unit_emits_its_wrapped_action_on_start() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("announcing", "1.0")
        .with_custom(
            CustomUnit::new("announce", |ctx| {
                Action::record_marker("run-started", ctx.workflow_input())
            })
            .unwrap(),
        )
        .with_task(TaskUnit::new("a", "1.0"))
        .build()
        .unwrap();

    let log = EventLog::fresh(vec![workflow_started(1, "job-9")]).unwrap();
    let decisions = orchestrator.decide(&log).unwrap();
    assert_eq!(decisions.len(), 2);
    assert!(matches!(
        &decisions[0],
        Decision::RecordMarker { name, detail } if name == "run-started" && detail == "job-9"
    ));
    assert!(matches!(
        &decisions[1],
        Decision::ScheduleTask { name, .. } if name == "a"
    ));
}

#[test]
fn when_gate_keeping_branch_defers_the_join_to_the_live_branch() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("conditional", "1.0")
        .with_task(TaskUnit::new("a", "1.0"))
        .with_task(TaskUnit::new("b", "1.0").after_task("a", "1.0"))
        .with_task(
            TaskUnit::new("c", "1.0")
                .after_task("a", "1.0")
                .when_keeping_branch(|_| false),
        )
        .with_task(
            TaskUnit::new("d", "1.0")
                .after_task("b", "1.0")
                .after_task("c", "1.0"),
        )
        .build()
        .unwrap();

    // a completes: only b is scheduled, the gated branch stays silent
    let log = EventLog::new(
        vec![
            completed(4, 2, "a-done"),
            started(3, 2),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(3),
        EventId(4),
    )
    .unwrap();
    let decisions = orchestrator.decide(&log).unwrap();
    assert!(matches!(
        decisions.as_slice(),
        [Decision::ScheduleTask { name, .. }] if name == "b"
    ));

    // b completes: c never ran and holds nothing, so the join unlocks
    let log = EventLog::new(
        vec![
            completed(7, 5, "b-done"),
            started(6, 5),
            scheduled(5, "b"),
            completed(4, 2, "a-done"),
            started(3, 2),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(6),
        EventId(7),
    )
    .unwrap();
    let decisions = orchestrator.decide(&log).unwrap();
    assert!(matches!(
        decisions.as_slice(),
        [Decision::ScheduleTask { name, .. }] if name == "d"
    ));
}

#[test]
fn when_gate_default_triggers_the_first_join_point() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("conditional", "1.0")
        .with_task(TaskUnit::new("a", "1.0"))
        .with_task(TaskUnit::new("b", "1.0").after_task("a", "1.0"))
        .with_task(
            TaskUnit::new("c", "1.0")
                .after_task("a", "1.0")
                .when(|_| false),
        )
        .with_task(
            TaskUnit::new("d", "1.0")
                .after_task("b", "1.0")
                .after_task("c", "1.0"),
        )
        .build()
        .unwrap();

    // a completes: b is scheduled, and the dead branch hands its share of
    // the join over immediately
    let log = EventLog::new(
        vec![
            completed(4, 2, "a-done"),
            started(3, 2),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(3),
        EventId(4),
    )
    .unwrap();
    let decisions = orchestrator.decide(&log).unwrap();
    let names: Vec<&str> = decisions
        .iter()
        .map(|d| match d {
            Decision::ScheduleTask { name, .. } => name.as_str(),
            other => other.kind_name(),
        })
        .collect();
    assert_eq!(names, vec!["b", "d"]);
}

#[test]
fn completion_handler_can_jump_past_the_chain() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("leaping", "1.0")
        .with_task(TaskUnit::new("a", "1.0").on_completion(|_| {
            Action::jump_to(UnitIdentity::task("c", "1.0").unwrap())
        }))
        .with_task(TaskUnit::new("b", "1.0").after_task("a", "1.0"))
        .with_task(TaskUnit::new("c", "1.0").after_task("b", "1.0"))
        .build()
        .unwrap();

    let log = EventLog::new(
        vec![
            completed(4, 2, "a-done"),
            started(3, 2),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(3),
        EventId(4),
    )
    .unwrap();

    let decisions = orchestrator.decide(&log).unwrap();
    assert!(matches!(
        decisions.as_slice(),
        [Decision::ScheduleTask { name, .. }] if name == "c"
    ));
}

#[test]
fn child_workflow_unit_schedules_and_continues() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("nesting", "1.0")
        .with_task(TaskUnit::new("prepare", "1.0"))
        .with_child_workflow(
            tiller_dsl::ChildWorkflowUnit::new("billing", "2.0").after_task("prepare", "1.0"),
        )
        .with_task(TaskUnit::new("notify", "1.0").after(tiller_dsl::ParentRef::task_at(
            "billing", "2.0", "",
        )))
        .build()
        .unwrap();
    let child_token = UnitIdentity::task("billing", "2.0")
        .unwrap()
        .token()
        .as_str()
        .to_string();

    // prepare completes: the nested workflow is scheduled
    let log = EventLog::new(
        vec![
            completed(4, 2, "ready"),
            started(3, 2),
            scheduled(2, "prepare"),
            workflow_started(1, ""),
        ],
        EventId(3),
        EventId(4),
    )
    .unwrap();
    let decisions = orchestrator.decide(&log).unwrap();
    assert!(matches!(
        decisions.as_slice(),
        [Decision::ScheduleChildWorkflow { name, .. }] if name == "billing"
    ));

    // the nested workflow completes: its child task is scheduled
    let log = EventLog::new(
        vec![
            HistoryRecord::new(
                7,
                HistoryAttributes::ChildCompleted {
                    initiated_id: EventId(5),
                    result: "invoiced".into(),
                },
            ),
            HistoryRecord::new(6, HistoryAttributes::ChildStarted {
                initiated_id: EventId(5),
            }),
            HistoryRecord::new(
                5,
                HistoryAttributes::ChildInitiated {
                    name: "billing".into(),
                    version: "2.0".into(),
                    token: child_token,
                    control: "{}".into(),
                    input: "".into(),
                },
            ),
            completed(4, 2, "ready"),
            started(3, 2),
            scheduled(2, "prepare"),
            workflow_started(1, ""),
        ],
        EventId(6),
        EventId(7),
    )
    .unwrap();
    let decisions = orchestrator.decide(&log).unwrap();
    assert!(matches!(
        decisions.as_slice(),
        [Decision::ScheduleTask { name, .. }] if name == "notify"
    ));
}

#[test]
fn completion_handler_can_continue_as_new() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("rolling", "1.0")
        .with_task(
            TaskUnit::new("poll", "1.0")
                .on_completion(|event| Action::restart(event.result().unwrap_or_default())),
        )
        .build()
        .unwrap();

    let log = EventLog::new(
        vec![
            completed(4, 2, "cursor-42"),
            started(3, 2),
            scheduled(2, "poll"),
            workflow_started(1, ""),
        ],
        EventId(3),
        EventId(4),
    )
    .unwrap();

    assert_eq!(
        orchestrator.decide(&log).unwrap(),
        vec![Decision::ContinueAsNew {
            input: "cursor-42".into(),
        }]
    );
}

#[test]
fn repeated_cycles_are_deterministic() {
    init_tracing();
    let orchestrator = WorkflowBuilder::new("steady", "1.0")
        .with_task(TaskUnit::new("a", "1.0"))
        .with_task(TaskUnit::new("b", "1.0").after_task("a", "1.0"))
        .build()
        .unwrap();

    let log = EventLog::new(
        vec![
            completed(4, 2, "x"),
            started(3, 2),
            scheduled(2, "a"),
            workflow_started(1, ""),
        ],
        EventId(2),
        EventId(4),
    )
    .unwrap();

    let first = orchestrator.decide(&log).unwrap();
    for _ in 0..8 {
        assert_eq!(orchestrator.decide(&log).unwrap(), first);
    }
}
