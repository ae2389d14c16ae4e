//! Stream coordinator integration tests: ordering, cancellation, replacement.

use curio_config::CurioConfig;
use curio_core::coordinator::{StreamCoordinator, StreamHandle};
use curio_core::error::CoreError;
use curio_protocol::{EventPayload, FunctionName};
use curio_test_utils::{ScriptedAgent, ScriptedStep, discovery_stack};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

const EVENT_BUFFER: usize = 64;

async fn next_event(handle: &mut StreamHandle) -> EventPayload {
    tokio::time::timeout(Duration::from_secs(2), handle.events.recv())
        .await
        .expect("event before timeout")
        .expect("bus open")
        .payload
}

async fn wait_idle(coordinator: &StreamCoordinator) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while coordinator.is_streaming() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("idle before timeout");
}

#[tokio::test]
async fn events_are_ordered_and_correlated_within_a_turn() {
    let stack = discovery_stack(&CurioConfig::default());
    let (session_id, _, _) = stack.sessions.create_session();
    let call_id = ScriptedAgent::call_id();
    let agent = ScriptedAgent::new(vec![
        ScriptedStep::text("Searching"),
        ScriptedStep::call(
            call_id,
            FunctionName::SearchProducts,
            json!({ "query": "wireless headphones" }),
        ),
        ScriptedStep::text(" done"),
    ]);
    let coordinator =
        StreamCoordinator::new(session_id, agent.clone(), stack.executor.clone(), EVENT_BUFFER);

    let mut handle = coordinator.attach();
    let turn_id = coordinator
        .submit("find headphones".to_string())
        .expect("submit");

    let EventPayload::TextChunk { content, partial } = next_event(&mut handle).await else {
        panic!("expected text chunk first");
    };
    assert_eq!((content.as_str(), partial), ("Searching", true));

    let EventPayload::FunctionCall {
        function,
        tool_call_id,
        ..
    } = next_event(&mut handle).await
    else {
        panic!("expected function call before its result");
    };
    assert_eq!(function, FunctionName::SearchProducts);
    assert_eq!(tool_call_id, call_id);

    let EventPayload::FunctionResult {
        function,
        result,
        tool_call_id,
    } = next_event(&mut handle).await
    else {
        panic!("expected function result after the call");
    };
    assert_eq!(function, FunctionName::SearchProducts);
    assert_eq!(tool_call_id, call_id);
    assert_eq!(result.success, true);

    let EventPayload::TextChunk { content, .. } = next_event(&mut handle).await else {
        panic!("expected trailing text");
    };
    assert_eq!(content, " done".to_string());

    let EventPayload::Completion {
        turn_id: completed,
        total_tokens,
    } = next_event(&mut handle).await
    else {
        panic!("expected completion last");
    };
    assert_eq!(completed, turn_id);
    assert_eq!(total_tokens, 2);

    // The executed result was fed back to the agent.
    let observed = agent.observed();
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0].0, call_id);
    assert_eq!(observed[0].1.success, true);
}

#[tokio::test]
async fn provider_errors_abort_the_turn_but_keep_the_session_usable() {
    let stack = discovery_stack(&CurioConfig::default());
    let (session_id, _, _) = stack.sessions.create_session();
    let agent = ScriptedAgent::new(vec![
        ScriptedStep::text("partial answer"),
        ScriptedStep::fail("upstream 500"),
    ]);
    let coordinator =
        StreamCoordinator::new(session_id, agent, stack.executor.clone(), EVENT_BUFFER);

    let mut handle = coordinator.attach();
    coordinator.submit("hello".to_string()).expect("submit");

    assert!(matches!(
        next_event(&mut handle).await,
        EventPayload::TextChunk { .. }
    ));
    let EventPayload::Error { error } = next_event(&mut handle).await else {
        panic!("expected sanitized error event");
    };
    assert!(!error.contains("500"), "provider detail leaked: {error}");

    // The turn gate was released; the next message streams normally.
    wait_idle(&coordinator).await;
    coordinator.submit("again".to_string()).expect("resubmit");
    assert!(matches!(
        next_event(&mut handle).await,
        EventPayload::TextChunk { .. }
    ));
}

#[tokio::test]
async fn concurrent_messages_are_rejected_deterministically() {
    let stack = discovery_stack(&CurioConfig::default());
    let (session_id, _, _) = stack.sessions.create_session();
    let agent = ScriptedAgent::new(vec![ScriptedStep::text("slow reply").after_ms(100)]);
    let coordinator =
        StreamCoordinator::new(session_id, agent, stack.executor.clone(), EVENT_BUFFER);

    let mut handle = coordinator.attach();
    coordinator.submit("first".to_string()).expect("submit");
    let err = coordinator
        .submit("second".to_string())
        .expect_err("mid-turn message");
    assert!(matches!(err, CoreError::TurnInProgress(id) if id == session_id));

    // First turn still completes untouched.
    assert!(matches!(
        next_event(&mut handle).await,
        EventPayload::TextChunk { .. }
    ));
    assert!(matches!(
        next_event(&mut handle).await,
        EventPayload::Completion { .. }
    ));
}

#[tokio::test]
async fn reconnection_replaces_the_previous_stream() {
    let stack = discovery_stack(&CurioConfig::default());
    let (session_id, _, _) = stack.sessions.create_session();
    let agent = ScriptedAgent::new(vec![ScriptedStep::text("hi")]);
    let coordinator =
        StreamCoordinator::new(session_id, agent, stack.executor.clone(), EVENT_BUFFER);

    let first = coordinator.attach();
    let second = coordinator.attach();
    assert_eq!(coordinator.is_current(first.epoch()), false);
    assert_eq!(coordinator.is_current(second.epoch()), true);
}

#[tokio::test]
async fn disconnected_sessions_stop_consuming_the_agent() {
    let stack = discovery_stack(&CurioConfig::default());
    let (session_id, _, _) = stack.sessions.create_session();
    let agent = ScriptedAgent::new(vec![
        ScriptedStep::text("one"),
        ScriptedStep::text("two"),
        ScriptedStep::text("three"),
    ]);
    let coordinator =
        StreamCoordinator::new(session_id, agent.clone(), stack.executor.clone(), EVENT_BUFFER);

    // Attach and immediately drop: the listener is gone before the turn runs.
    drop(coordinator.attach());
    coordinator.submit("hello".to_string()).expect("submit");
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The coordinator stopped after the first undeliverable step instead of
    // draining the generator.
    assert_eq!(agent.steps_taken(), 1);
    assert_eq!(coordinator.is_streaming(), false);
}

#[tokio::test]
async fn turn_aborts_promptly_once_the_stream_detaches_mid_turn() {
    let stack = discovery_stack(&CurioConfig::default());
    let (session_id, _, _) = stack.sessions.create_session();
    let call_id = ScriptedAgent::call_id();
    let agent = ScriptedAgent::new(vec![
        ScriptedStep::call(
            call_id,
            FunctionName::SearchProducts,
            json!({ "query": "camera" }),
        ),
        ScriptedStep::text("tail").after_ms(200),
        ScriptedStep::text("never consumed"),
    ]);
    let coordinator =
        StreamCoordinator::new(session_id, agent.clone(), stack.executor.clone(), EVENT_BUFFER);

    let mut handle = coordinator.attach();
    coordinator.submit("search".to_string()).expect("submit");

    // Watch the call execute, then walk away while the agent is mid-reply.
    assert!(matches!(
        next_event(&mut handle).await,
        EventPayload::FunctionCall { .. }
    ));
    assert!(matches!(
        next_event(&mut handle).await,
        EventPayload::FunctionResult { .. }
    ));
    drop(handle);
    tokio::time::sleep(Duration::from_millis(400)).await;

    // The delayed step was consumed but undeliverable, so the turn stopped
    // there instead of draining the generator.
    assert_eq!(agent.steps_taken(), 2);
    assert_eq!(coordinator.is_streaming(), false);
    assert_eq!(agent.observed().len(), 1);

    // The executed search still landed in session context.
    let snapshot = stack.sessions.snapshot(session_id).expect("snapshot");
    assert_eq!(snapshot.search_history.len(), 1);
}
