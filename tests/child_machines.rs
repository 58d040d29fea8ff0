//! Parent/child machine actors: invoke lifecycle, sendParent, respond,
//! done propagation.

use std::sync::{Arc, Mutex};

use serde_json::json;
use statevisor::{
    interpret, Action, Behavior, InterpreterOptions, InvokeBuilder, MachineDefinition,
    SimulatedClock, TransitionBuilder,
};

fn options(clock: &SimulatedClock) -> InterpreterOptions {
    InterpreterOptions::default().with_clock(Arc::new(clock.clone()))
}

#[test]
fn invoked_machine_child_reports_done_with_data() {
    let worker = MachineDefinition::builder("worker")
        .initial("working")
        .state("working", |s| {
            s.entry(Action::send_parent("WORKER_STARTED"))
                .on("FINISH", "finished")
        })
        .final_state("finished", |s| s.data(|_, _| json!(7)))
        .build()
        .unwrap();

    let parent = MachineDefinition::builder("parent")
        .initial("running")
        .state("running", |s| {
            s.invoke(
                InvokeBuilder::new("worker", Behavior::machine(worker)).on_done(
                    TransitionBuilder::to("celebrating").guard(|_, event| event.data() == &json!(7)),
                ),
            )
            .on_with(
                "WORKER_STARTED",
                TransitionBuilder::internal().assign(|ctx, _| {
                    ctx.insert("started".into(), json!(true));
                }),
            )
        })
        .state("celebrating", |s| s)
        .build()
        .unwrap();

    let clock = SimulatedClock::new();
    let service = interpret(parent, options(&clock));
    service.start().unwrap();

    // The child's entry notification arrived within the start flush.
    let state = service.state().unwrap();
    assert_eq!(state.context.get("started"), Some(&json!(true)));
    assert!(state.children.contains_key("worker"));

    service.send_to("worker", "FINISH").unwrap();

    let state = service.state().unwrap();
    assert_eq!(state.value.dotted(), "celebrating");
    // Exiting the invoking state stopped and removed the child.
    assert!(state.children.is_empty());
    assert!(service.children().is_empty());
}

#[test]
fn respond_routes_back_to_the_event_origin() {
    let child = MachineDefinition::builder("pinger")
        .initial("waiting")
        .state("waiting", |s| {
            s.entry(Action::send_parent("PING")).on("PONG", "satisfied")
        })
        .final_state("satisfied", |s| s)
        .build()
        .unwrap();

    let parent = MachineDefinition::builder("parent")
        .initial("hosting")
        .state("hosting", |s| {
            s.invoke(InvokeBuilder::new("pinger", Behavior::machine(child)).on_done_to("finished"))
                .on_with(
                    "PING",
                    TransitionBuilder::internal().action(Action::respond("PONG")),
                )
        })
        .state("finished", |s| s)
        .build()
        .unwrap();

    let clock = SimulatedClock::new();
    let service = interpret(parent, options(&clock));
    service.start().unwrap();

    // PING -> respond(PONG) -> child final -> done.invoke.pinger, all
    // settled synchronously.
    assert_eq!(service.state().unwrap().value.dotted(), "finished");
    assert!(service.children().is_empty());
}

#[test]
fn stopping_the_parent_stops_children_first() {
    let child = MachineDefinition::builder("worker")
        .initial("working")
        .state("working", |s| s)
        .build()
        .unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));

    let parent = MachineDefinition::builder("parent")
        .initial("running")
        .state("running", |s| {
            s.invoke(InvokeBuilder::new("worker", Behavior::machine(child)))
        })
        .build()
        .unwrap();

    let clock = SimulatedClock::new();
    let service = interpret(parent, options(&clock));
    service.start().unwrap();

    let child_ref = service.children().get("worker").cloned().unwrap();
    let log = Arc::clone(&order);
    service.subscribe_with(
        |_| {},
        |_| {},
        move || log.lock().unwrap().push("parent-complete"),
    );

    service.stop();
    assert_eq!(*order.lock().unwrap(), vec!["parent-complete"]);
    assert!(service.children().is_empty());

    // Stopping an already-stopped child ref is a no-op.
    child_ref.stop();
}

#[test]
fn explicit_stop_action_tears_down_a_spawned_child() {
    let child = MachineDefinition::builder("sidekick")
        .initial("idle")
        .state("idle", |s| s)
        .build()
        .unwrap();

    let parent = MachineDefinition::builder("parent")
        .initial("plain")
        .state("plain", |s| {
            s.entry(Action::start_child("sidekick", Behavior::machine(child)))
                .on_with(
                    "DISMISS",
                    TransitionBuilder::internal().action(Action::stop_child("sidekick")),
                )
        })
        .build()
        .unwrap();

    let clock = SimulatedClock::new();
    let service = interpret(parent, options(&clock));
    service.start().unwrap();
    assert!(service.children().contains_key("sidekick"));

    service.send("DISMISS").unwrap();
    assert!(service.children().is_empty());
    // The published state reflects the removal.
    assert!(service.state().unwrap().children.is_empty());
}
