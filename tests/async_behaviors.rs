//! Future, stream, and callback behaviors under a Tokio runtime.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use statevisor::{
    interpret, Behavior, InterpreterOptions, InvokeBuilder, MachineDefinition, TransitionBuilder,
};

async fn settle() {
    // Paused-clock tests: give spawned behavior tasks a chance to run and
    // auto-advance past their sleeps.
    tokio::time::sleep(Duration::from_millis(500)).await;
}

#[tokio::test(start_paused = true)]
async fn promise_child_resolves_and_is_cleaned_up() {
    let machine = MachineDefinition::builder("asker")
        .initial("waiting")
        .state("waiting", |s| {
            s.invoke(
                InvokeBuilder::new(
                    "childActor",
                    Behavior::future(|| async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(json!(42))
                    }),
                )
                .on_done(
                    TransitionBuilder::to("success").guard(|_, event| event.data() == &json!(42)),
                ),
            )
        })
        .state("success", |s| s)
        .build()
        .unwrap();

    let service = interpret(machine, InterpreterOptions::default());
    service.start().unwrap();
    assert!(service.state().unwrap().children.contains_key("childActor"));

    settle().await;

    let state = service.state().unwrap();
    assert_eq!(state.value.dotted(), "success");
    assert!(!state.children.contains_key("childActor"));
}

#[tokio::test(start_paused = true)]
async fn promise_rejection_surfaces_as_platform_error() {
    let machine = MachineDefinition::builder("asker")
        .initial("waiting")
        .state("waiting", |s| {
            s.invoke(
                InvokeBuilder::new(
                    "fetcher",
                    Behavior::future(|| async { Err(json!("connection refused")) }),
                )
                .on_done_to("success")
                .on_error(TransitionBuilder::to("failed").assign(|ctx, event| {
                    ctx.insert("reason".into(), event.data().clone());
                })),
            )
        })
        .state("success", |s| s)
        .state("failed", |s| s)
        .build()
        .unwrap();

    let service = interpret(machine, InterpreterOptions::default());
    service.start().unwrap();
    settle().await;

    let state = service.state().unwrap();
    assert_eq!(state.value.dotted(), "failed");
    assert_eq!(state.context.get("reason"), Some(&json!("connection refused")));
}

#[tokio::test(start_paused = true)]
async fn future_factory_is_lazy_until_start() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);

    let machine = MachineDefinition::builder("lazy")
        .initial("waiting")
        .state("waiting", |s| {
            s.invoke(InvokeBuilder::new(
                "probe",
                Behavior::future(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(json!(null)) }
                }),
            ))
        })
        .build()
        .unwrap();

    let service = interpret(machine, InterpreterOptions::default());
    let _ = service.initial_state();
    let _ = service.initial_state();
    let _ = service.next_state("ANYTHING");
    assert_eq!(invocations.load(Ordering::SeqCst), 0);

    service.start().unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stream_child_forwards_items_then_completes() {
    let machine = MachineDefinition::builder("collector")
        .initial("listening")
        .state("listening", |s| {
            s.invoke(
                InvokeBuilder::new(
                    "feed",
                    Behavior::stream(|| {
                        futures::stream::iter(vec![
                            statevisor::Event::new("DATA").with_payload(json!({"n": 1})),
                            statevisor::Event::new("DATA").with_payload(json!({"n": 2})),
                        ])
                    }),
                )
                .on_done_to("drained"),
            )
            .on_with(
                "DATA",
                TransitionBuilder::internal().assign(|ctx, event| {
                    let seen = ctx.get("seen").and_then(|v| v.as_u64()).unwrap_or(0);
                    let n = event.payload.get("n").and_then(|v| v.as_u64()).unwrap_or(0);
                    ctx.insert("seen".into(), json!(seen + n));
                }),
            )
        })
        .state("drained", |s| s)
        .build()
        .unwrap();

    let service = interpret(machine, InterpreterOptions::default());
    service.start().unwrap();
    settle().await;

    let state = service.state().unwrap();
    assert_eq!(state.value.dotted(), "drained");
    assert_eq!(state.context.get("seen"), Some(&json!(3)));
    assert!(state.children.is_empty());
}

#[tokio::test(start_paused = true)]
async fn channel_subscription_streams_states_until_stop() {
    let machine = MachineDefinition::builder("toggle")
        .initial("off")
        .state("off", |s| s.on("TOGGLE", "on"))
        .state("on", |s| s.on("TOGGLE", "off"))
        .build()
        .unwrap();

    let service = interpret(machine, InterpreterOptions::default());
    service.start().unwrap();

    let mut states = service.subscribe_channel();
    // Replay-latest applies to channel subscriptions too.
    assert_eq!(states.recv().await.unwrap().value.dotted(), "off");

    service.send("TOGGLE").unwrap();
    assert_eq!(states.recv().await.unwrap().value.dotted(), "on");

    service.stop();
    assert!(states.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn callback_child_emits_echoes_and_disposes() {
    let disposed = Arc::new(AtomicBool::new(false));
    let disposed_flag = Arc::clone(&disposed);

    let machine = MachineDefinition::builder("bridge")
        .initial("open")
        .state("open", |s| {
            s.invoke(InvokeBuilder::new(
                "wire",
                Behavior::callback(move |sender, mut receiver| {
                    sender.send("WIRE_UP");
                    let echo = sender.clone();
                    tokio::spawn(async move {
                        while let Some(event) = receiver.recv().await {
                            if event.name == "ASK" {
                                echo.send(statevisor::Event::new("REPLY"));
                            }
                        }
                    });
                    let flag = Arc::clone(&disposed_flag);
                    Some(Box::new(move || {
                        flag.store(true, Ordering::SeqCst);
                    }) as Box<dyn FnOnce() + Send>)
                }),
            ))
            .on("WIRE_UP", "wired")
        })
        .state("wired", |s| s.on("REPLY", "answered"))
        .state("answered", |s| s)
        .build()
        .unwrap();

    let service = interpret(machine, InterpreterOptions::default());
    service.start().unwrap();
    settle().await;
    assert_eq!(service.state().unwrap().value.dotted(), "wired");

    // Exiting the invoking state stopped the callback child: its inbox is
    // gone, so ASK is not echoed, and the disposer ran.
    service.send_to("wire", "ASK").unwrap_err();
    settle().await;
    assert!(disposed.load(Ordering::SeqCst));
    assert_eq!(service.state().unwrap().value.dotted(), "wired");
}
