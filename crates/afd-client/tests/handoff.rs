//! Handoff registry, dispatch and reconnection.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use afd_client::{
    HandoffCallbacks, HandoffConnection, HandoffHandler, HandoffRegistry, HandoffState,
    ReconnectOptions, ReconnectingHandoff, connect_handoff,
};
use afd_core::handoff::{HandoffCredentials, HandoffDescriptor, ReconnectPolicy};
use afd_core::registry::CommandDefinition;
use afd_core::{AfdError, CommandError, CommandResult};
use afd_testing::{MockRegistry, Recorder, wait_until};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::time::Instant;

// =============================================================================
// Scripted handler
// =============================================================================

#[derive(Default)]
struct HandlerState {
    failures_left: AtomicU32,
    connects: Mutex<Vec<(String, Instant)>>,
    callbacks: Mutex<Option<HandoffCallbacks>>,
    sent: Recorder<Value>,
}

/// Connects instantly unless told to fail, and lets the test drop the
/// connection from the remote side.
#[derive(Clone, Default)]
struct ScriptedHandler {
    state: Arc<HandlerState>,
}

impl ScriptedHandler {
    fn fail_next(&self, count: u32) {
        self.state.failures_left.store(count, Ordering::SeqCst);
    }

    fn drop_connection(&self, reason: &str) {
        let callbacks = self.state.callbacks.lock().unwrap().take();
        if let Some(callbacks) = callbacks {
            callbacks.disconnected(Some(reason));
        }
    }

    fn live_callbacks(&self) -> HandoffCallbacks {
        self.state.callbacks.lock().unwrap().clone().unwrap()
    }

    fn connects(&self) -> Vec<(String, Instant)> {
        self.state.connects.lock().unwrap().clone()
    }

    fn connect_count(&self) -> usize {
        self.state.connects.lock().unwrap().len()
    }
}

struct ScriptedConnection {
    state: Mutex<HandoffState>,
    sent: Recorder<Value>,
}

#[async_trait]
impl HandoffConnection for ScriptedConnection {
    async fn send(&self, message: Value) -> Result<(), AfdError> {
        self.sent.record(message);
        Ok(())
    }

    async fn close(&self) {
        *self.state.lock().unwrap() = HandoffState::Disconnected;
    }

    fn state(&self) -> HandoffState {
        *self.state.lock().unwrap()
    }
}

#[async_trait]
impl HandoffHandler for ScriptedHandler {
    async fn connect(
        &self,
        descriptor: &HandoffDescriptor,
        callbacks: HandoffCallbacks,
    ) -> Result<Arc<dyn HandoffConnection>, AfdError> {
        self.state
            .connects
            .lock()
            .unwrap()
            .push((descriptor.endpoint.clone(), Instant::now()));

        let left = self.state.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            if left != u32::MAX {
                self.state.failures_left.store(left - 1, Ordering::SeqCst);
            }
            return Err(AfdError::connection_failed("endpoint unreachable"));
        }

        callbacks.connected();
        *self.state.callbacks.lock().unwrap() = Some(callbacks);
        Ok(Arc::new(ScriptedConnection {
            state: Mutex::new(HandoffState::Connected),
            sent: self.state.sent.clone(),
        }))
    }
}

fn registry_with(handler: &ScriptedHandler) -> Arc<HandoffRegistry> {
    let registry = HandoffRegistry::new();
    registry.register("websocket", handler.clone());
    Arc::new(registry)
}

fn descriptor() -> HandoffDescriptor {
    HandoffDescriptor::new("websocket", "wss://live.example.com/session/1")
        .with_credentials(HandoffCredentials::new().with_session_id("s-42"))
}

fn fast_options() -> ReconnectOptions {
    ReconnectOptions::new()
        .with_backoff(Duration::from_millis(100))
        .with_max_attempts(3)
}

// =============================================================================
// Registry and dispatch
// =============================================================================

#[tokio::test]
async fn test_unknown_protocol_lists_registered_ones() {
    let registry = HandoffRegistry::new();
    registry.register("websocket", ScriptedHandler::default());
    registry.register("sse", ScriptedHandler::default());

    let descriptor = HandoffDescriptor::new("webrtc", "stun:example.com");
    let err = connect_handoff(&registry, &descriptor, HandoffCallbacks::new())
        .await
        .err()
        .unwrap();

    match err {
        AfdError::UnknownProtocol { protocol, available } => {
            assert_eq!(protocol, "webrtc");
            assert_eq!(available.to_vec(), vec!["sse", "websocket"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_register_replaces_and_unregister_removes() {
    let registry = HandoffRegistry::new();
    assert!(registry.register("websocket", ScriptedHandler::default()).is_none());
    assert!(registry.register("websocket", ScriptedHandler::default()).is_some());
    assert!(registry.has("websocket"));

    assert!(registry.unregister("websocket"));
    assert!(!registry.unregister("websocket"));
    assert!(registry.protocols().is_empty());
}

#[tokio::test]
async fn test_connect_handoff_uses_handler() {
    let handler = ScriptedHandler::default();
    let registry = registry_with(&handler);
    let opened = Recorder::new();
    let sink = opened.clone();

    let connection = connect_handoff(
        &registry,
        &descriptor(),
        HandoffCallbacks::new().on_connect(move || sink.record(())),
    )
    .await
    .unwrap();

    assert_eq!(connection.state(), HandoffState::Connected);
    connection.send(json!({"type": "hello"})).await.unwrap();
    assert_eq!(handler.state.sent.values(), vec![json!({"type": "hello"})]);
    assert_eq!(opened.len(), 1);
}

// =============================================================================
// Reconnection
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnects_with_growing_backoff_and_resets_attempts() {
    let handler = ScriptedHandler::default();
    let reconnecting = Recorder::new();
    let reconnected = Recorder::new();
    let options = fast_options()
        .on_reconnecting({
            let sink = reconnecting.clone();
            move |attempt| sink.record(attempt)
        })
        .on_reconnected({
            let sink = reconnected.clone();
            move || sink.record(())
        });

    let handoff = ReconnectingHandoff::connect(registry_with(&handler), descriptor(), HandoffCallbacks::new(), options)
        .await
        .unwrap();

    handler.fail_next(2);
    handler.drop_connection("network");
    wait_until(|| reconnected.len() == 1).await;

    assert_eq!(reconnecting.values(), vec![1, 2, 3]);
    assert_eq!(handoff.state(), HandoffState::Connected);
    assert_eq!(handoff.attempts(), 0);

    let times: Vec<Instant> = handler.connects().into_iter().map(|(_, at)| at).collect();
    assert_eq!(times.len(), 4);
    for (i, base_ms) in [100u64, 200, 400].into_iter().enumerate() {
        let gap = times[i + 1] - times[i];
        let low = Duration::from_millis(base_ms);
        let high = Duration::from_millis(base_ms + 101);
        assert!(gap >= low && gap <= high, "gap {i} was {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_late_disconnect_of_replaced_connection_is_ignored() {
    let handler = ScriptedHandler::default();
    let disconnects = Recorder::new();
    let reconnected = Recorder::new();
    let callbacks = HandoffCallbacks::new().on_disconnect({
        let sink = disconnects.clone();
        move |reason: Option<&str>| sink.record(reason.map(str::to_string))
    });
    let options = fast_options().on_reconnected({
        let sink = reconnected.clone();
        move || sink.record(())
    });
    let handoff = ReconnectingHandoff::connect(registry_with(&handler), descriptor(), callbacks, options)
        .await
        .unwrap();

    let first = handler.live_callbacks();
    handler.drop_connection("network");
    wait_until(|| reconnected.len() == 1).await;

    first.disconnected(Some("late duplicate"));
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(handoff.state(), HandoffState::Connected);
    assert_eq!(handler.connect_count(), 2);
    assert_eq!(disconnects.values(), vec![Some("network".to_string())]);
    handoff.send(json!({"type": "ping"})).await.unwrap();
    assert_eq!(handler.state.sent.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_attempts() {
    let handler = ScriptedHandler::default();
    let failed = Recorder::new();
    let options = fast_options().with_max_attempts(2).on_reconnect_failed({
        let sink = failed.clone();
        move |attempts| sink.record(attempts)
    });

    let handoff = ReconnectingHandoff::connect(registry_with(&handler), descriptor(), HandoffCallbacks::new(), options)
        .await
        .unwrap();

    handler.fail_next(u32::MAX);
    handler.drop_connection("network");
    wait_until(|| handoff.state() == HandoffState::Failed).await;

    assert_eq!(failed.values(), vec![2]);
    assert_eq!(handler.connect_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_send_while_reconnecting_is_rejected() {
    let handler = ScriptedHandler::default();
    let handoff = ReconnectingHandoff::connect(registry_with(&handler), descriptor(), HandoffCallbacks::new(), fast_options())
        .await
        .unwrap();

    handler.fail_next(u32::MAX);
    handler.drop_connection("network");
    wait_until(|| handoff.state() == HandoffState::Reconnecting).await;

    let err = handoff.send(json!({"type": "ping"})).await.unwrap_err();
    match err {
        AfdError::HandoffNotConnected { state } => assert_eq!(state, "reconnecting"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_reconnection() {
    let handler = ScriptedHandler::default();
    let disconnects = Recorder::new();
    let callbacks = HandoffCallbacks::new().on_disconnect({
        let sink = disconnects.clone();
        move |reason: Option<&str>| sink.record(reason.map(str::to_string))
    });
    let handoff = ReconnectingHandoff::connect(registry_with(&handler), descriptor(), callbacks, fast_options())
        .await
        .unwrap();

    handoff.close().await;
    handler.drop_connection("closed by client");
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(handoff.state(), HandoffState::Disconnected);
    assert_eq!(handler.connect_count(), 1);
    assert_eq!(disconnects.values(), vec![Some("closed by client".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_policy_can_forbid_reconnection() {
    let handler = ScriptedHandler::default();
    let descriptor = descriptor().with_reconnect(ReconnectPolicy::new(false));
    let handoff = ReconnectingHandoff::connect(registry_with(&handler), descriptor, HandoffCallbacks::new(), ReconnectOptions::new())
        .await
        .unwrap();

    handler.drop_connection("network");
    wait_until(|| handoff.state() == HandoffState::Disconnected).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(handler.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_policy_limits_apply_without_options() {
    let handler = ScriptedHandler::default();
    let descriptor = descriptor().with_reconnect(
        ReconnectPolicy::new(true)
            .with_max_attempts(1)
            .with_backoff_ms(50),
    );
    let handoff = ReconnectingHandoff::connect(registry_with(&handler), descriptor, HandoffCallbacks::new(), ReconnectOptions::new())
        .await
        .unwrap();

    handler.fail_next(u32::MAX);
    handler.drop_connection("network");
    wait_until(|| handoff.state() == HandoffState::Failed).await;
    assert_eq!(handler.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_command_supplies_fresh_descriptor() {
    let handler = ScriptedHandler::default();
    let commands = Arc::new(MockRegistry::new().with_result(
        CommandDefinition::new("session-resume", "Resume a live session"),
        CommandResult::success(json!({
            "protocol": "websocket",
            "endpoint": "wss://live.example.com/session/2",
        })),
    ));
    let options = fast_options().with_reconnect_command(commands.clone(), "session-resume");

    let handoff = ReconnectingHandoff::connect(registry_with(&handler), descriptor(), HandoffCallbacks::new(), options)
        .await
        .unwrap();

    handler.drop_connection("network");
    wait_until(|| handler.connect_count() == 2 && handoff.state() == HandoffState::Connected).await;

    assert_eq!(commands.last_call().unwrap().input, json!({"sessionId": "s-42"}));
    assert_eq!(handler.connects()[1].0, "wss://live.example.com/session/2");
    assert_eq!(handoff.descriptor().endpoint, "wss://live.example.com/session/2");
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconnect_command_reuses_last_descriptor() {
    let handler = ScriptedHandler::default();
    let commands = Arc::new(MockRegistry::new().with_result(
        CommandDefinition::new("session-resume", "Resume a live session"),
        CommandResult::failure(CommandError::internal("session store down")),
    ));
    let options = fast_options()
        .with_session_id("override")
        .with_reconnect_command(commands.clone(), "session-resume");

    let handoff = ReconnectingHandoff::connect(registry_with(&handler), descriptor(), HandoffCallbacks::new(), options)
        .await
        .unwrap();

    handler.drop_connection("network");
    wait_until(|| handler.connect_count() == 2 && handoff.state() == HandoffState::Connected).await;

    assert_eq!(commands.last_call().unwrap().input, json!({"sessionId": "override"}));
    assert_eq!(handler.connects()[1].0, "wss://live.example.com/session/1");
}

#[tokio::test]
async fn test_initial_failure_is_returned_without_retry() {
    let handler = ScriptedHandler::default();
    handler.fail_next(1);

    let result = ReconnectingHandoff::connect(registry_with(&handler), descriptor(), HandoffCallbacks::new(), fast_options()).await;

    assert!(matches!(result, Err(AfdError::ConnectionFailed { .. })));
    assert_eq!(handler.connect_count(), 1);
}
