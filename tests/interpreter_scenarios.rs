//! End-to-end interpreter scenarios driven by a deterministic clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use statevisor::{
    interpret, Action, Interpreter, InterpreterOptions, MachineDefinition, SendSpec,
    SimulatedClock, TransitionBuilder,
};

fn options(clock: &SimulatedClock) -> InterpreterOptions {
    InterpreterOptions::default().with_clock(Arc::new(clock.clone()))
}

fn current(service: &Interpreter) -> String {
    service.state().expect("started").value.dotted()
}

fn record_transitions(service: &Interpreter) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    service.subscribe_fn(move |state| sink.lock().unwrap().push(state.value.dotted()));
    log
}

/// Delayed self-send on entry, consumed by a plain transition.
fn timed_state(
    delay: Duration,
    event: &str,
    target: &str,
) -> impl FnOnce(statevisor::StateBuilder) -> statevisor::StateBuilder {
    let event = event.to_string();
    let target = target.to_string();
    move |s| {
        s.entry(Action::send_spec(
            SendSpec::new(event.as_str()).with_delay(delay),
        ))
        .on(event, target)
    }
}

#[test]
fn traffic_light_with_simulated_clock() {
    let clock = SimulatedClock::new();
    let ten = Duration::from_millis(10);
    let lights = MachineDefinition::builder("lights")
        .initial("green")
        .state("green", timed_state(ten, "TIMER", "yellow"))
        .state("yellow", timed_state(ten, "TIMER", "red"))
        .state("red", |s| s.after(ten, "green"))
        .build()
        .unwrap();

    let service = interpret(lights, options(&clock));
    service.start().unwrap();

    let mut observed = vec![current(&service)];
    for _ in 0..6 {
        clock.advance(Duration::from_millis(5));
        observed.push(current(&service));
    }

    assert_eq!(
        observed,
        ["green", "green", "yellow", "yellow", "red", "red", "green"]
    );
}

#[test]
fn cancel_prevents_delayed_event() {
    let clock = SimulatedClock::new();
    let machine = MachineDefinition::builder("lights")
        .initial("green")
        .state("green", |s| {
            s.entry(Action::send_spec(
                SendSpec::new("TIMER").with_delay(Duration::from_millis(10)),
            ))
            .on("TIMER", "yellow")
            .on_with(
                "KEEP_GOING",
                TransitionBuilder::internal().action(Action::cancel("TIMER")),
            )
        })
        .state("yellow", |s| s)
        .build()
        .unwrap();

    let service = interpret(machine, options(&clock));
    service.start().unwrap();

    clock.advance(Duration::from_millis(5));
    service.send("KEEP_GOING").unwrap();
    clock.advance(Duration::from_millis(10));

    assert_eq!(current(&service), "green");
    assert_eq!(clock.pending(), 0);
}

#[test]
fn cancel_by_expression() {
    let clock = SimulatedClock::new();
    let machine = MachineDefinition::builder("racer")
        .initial("waiting")
        .state("waiting", |s| {
            s.entry(Action::send_spec(
                SendSpec::new("FOO")
                    .with_id("foo")
                    .with_delay(Duration::from_millis(100)),
            ))
            .entry(Action::send_spec(
                SendSpec::new("BAR").with_delay(Duration::from_millis(200)),
            ))
            .entry(Action::cancel_expr(|_, _| "foo".to_string()))
            .on("FOO", "fail")
            .on("BAR", "pass")
        })
        .state("fail", |s| s)
        .state("pass", |s| s)
        .build()
        .unwrap();

    let service = interpret(machine, options(&clock));
    let observed = record_transitions(&service);
    service.start().unwrap();

    clock.advance(Duration::from_millis(300));

    assert_eq!(current(&service), "pass");
    assert!(!observed.lock().unwrap().iter().any(|v| v == "fail"));
}

#[test]
fn deferred_pre_start_events_drain_on_start() {
    let machine = MachineDefinition::builder("steps")
        .initial("a")
        .state("a", |s| s.on("NEXT_A", "b"))
        .state("b", |s| s.on("NEXT_B", "c"))
        .final_state("c", |s| s)
        .build()
        .unwrap();

    let clock = SimulatedClock::new();
    let service = interpret(machine, options(&clock));
    let observed = record_transitions(&service);
    let done = Arc::new(Mutex::new(0));
    let d = Arc::clone(&done);
    service.on_done(move |_| *d.lock().unwrap() += 1);

    // Default options defer sends before start instead of failing.
    service.send("NEXT_A").unwrap();
    service.send("NEXT_B").unwrap();
    service.start().unwrap();

    assert_eq!(*observed.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(*done.lock().unwrap(), 1);
    assert_eq!(service.status(), statevisor::Status::Stopped);
}

#[test]
fn transient_state_with_guard_rests_on_final_state() {
    let machine = MachineDefinition::builder("transients")
        .initial("idle")
        .state("idle", |s| s.on("START", "transient"))
        .state("transient", |s| {
            s.always(TransitionBuilder::to("fail").guard(|_, _| false))
                .always_to("next")
        })
        .state("fail", |s| s)
        .state("next", |s| s)
        .build()
        .unwrap();

    let clock = SimulatedClock::new();
    let service = interpret(machine, options(&clock));
    let observed = record_transitions(&service);
    service.start().unwrap();
    service.send("START").unwrap();

    // Observers never see the transient state, only the resting one.
    assert_eq!(*observed.lock().unwrap(), vec!["idle", "next"]);
}

#[test]
fn after_and_delayed_send_are_equivalent() {
    let ten = Duration::from_millis(10);

    let with_after = MachineDefinition::builder("with-after")
        .initial("waiting")
        .state("waiting", |s| s.after(ten, "next"))
        .state("next", |s| s)
        .build()
        .unwrap();

    let with_send = MachineDefinition::builder("with-send")
        .initial("waiting")
        .state("waiting", |s| {
            s.entry(Action::send_spec(SendSpec::new("GO").with_delay(ten)))
                .on("GO", "next")
        })
        .state("next", |s| s)
        .build()
        .unwrap();

    for machine in [with_after, with_send] {
        let clock = SimulatedClock::new();
        let service = interpret(machine, options(&clock));
        service.start().unwrap();

        clock.advance(Duration::from_millis(9));
        assert_eq!(current(&service), "waiting");
        clock.advance(Duration::from_millis(1));
        assert_eq!(current(&service), "next");
    }
}

#[test]
fn internal_target_routes_to_self() {
    let machine = MachineDefinition::builder("selfie")
        .initial("idle")
        .state("idle", |s| {
            s.entry(Action::send_to("PING", "#_internal")).on("PING", "pinged")
        })
        .state("pinged", |s| s)
        .build()
        .unwrap();

    let clock = SimulatedClock::new();
    let service = interpret(machine, options(&clock));
    service.start().unwrap();

    assert_eq!(current(&service), "pinged");
}

#[test]
fn raised_events_drain_within_the_same_macrostep() {
    let machine = MachineDefinition::builder("raiser")
        .initial("idle")
        .state("idle", |s| {
            s.on_with(
                "GO",
                TransitionBuilder::to("mid").action(Action::raise("STEP")),
            )
        })
        .state("mid", |s| s.on("STEP", "end"))
        .state("end", |s| s)
        .build()
        .unwrap();

    let clock = SimulatedClock::new();
    let service = interpret(machine, options(&clock));
    let observed = record_transitions(&service);
    service.start().unwrap();
    service.send("GO").unwrap();

    assert_eq!(*observed.lock().unwrap(), vec!["idle", "mid", "end"]);
    assert_eq!(current(&service), "end");
}

#[test]
fn compound_states_bubble_events_and_signal_done() {
    let machine = MachineDefinition::builder("fetcher")
        .initial("fetch")
        .state("fetch", |s| {
            s.initial("idle")
                .child("idle", |c| c.on("FETCH", "loading"))
                .child("loading", |c| c.on("RESOLVE", "done"))
                .final_child("done", |c| c)
                .on("done.state.fetch", "celebrated")
                .on("RESET", "fetch")
        })
        .state("celebrated", |s| s)
        .build()
        .unwrap();

    let clock = SimulatedClock::new();
    let service = interpret(machine, options(&clock));
    service.start().unwrap();
    assert_eq!(current(&service), "fetch.idle");

    service.send("FETCH").unwrap();
    assert_eq!(current(&service), "fetch.loading");

    // Reaching the final child raises done.state.fetch, which the parent
    // consumes in the same macrostep.
    service.send("RESOLVE").unwrap();
    assert_eq!(current(&service), "celebrated");
}
