// SPDX-License-Identifier: AGPL-3.0-or-later

//! Dispatch-level tests for the Workload Runtime: session lifecycle,
//! request/response, and the reentrancy-safe echo handler contract
//! (spec §4.8).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ens_core::frame::MsgId;
use ens_core::workload::{
    EventEntry, EventHandler, EventKind, HandlerFuture, HandlerRegistry, InMemoryChannel,
    InterWorkloadChannel, SyncHandler, WorkloadConfig, WorkloadRuntime,
};

fn echo_handler() -> Arc<dyn EventHandler<InMemoryChannel>> {
    Arc::new(SyncHandler(|_session_id: u64, kind: EventKind, _seq: u32, payload: Bytes| {
        if kind == EventKind::Request {
            Ok(payload)
        } else {
            Ok(Bytes::new())
        }
    }))
}

/// A handler that always fails, to exercise teardown-on-handler-error
/// (spec §8 scenario 5).
struct FailingHandler;

impl EventHandler<InMemoryChannel> for FailingHandler {
    fn handle<'a>(
        &'a self,
        _runtime: &'a Arc<WorkloadRuntime<InMemoryChannel>>,
        _session_id: u64,
        _kind: EventKind,
        _seq: u32,
        _payload: Bytes,
    ) -> HandlerFuture<'a> {
        Box::pin(async move { Err(anyhow::anyhow!("handler refuses")) })
    }
}

fn build_runtime_with(
    handler_name: &str,
    handler: Arc<dyn EventHandler<InMemoryChannel>>,
) -> (Arc<WorkloadRuntime<InMemoryChannel>>, Arc<InMemoryChannel>) {
    let config = WorkloadConfig {
        id: "chan-0".to_string(),
        microservice: "robot-arm".to_string(),
        events: vec![EventEntry {
            name: "angle".to_string(),
            handler_name: handler_name.to_string(),
            default: false,
        }],
    };
    let mut handlers: HashMap<String, Arc<dyn EventHandler<InMemoryChannel>>> = HashMap::new();
    handlers.insert(handler_name.to_string(), handler);
    let registry = HandlerRegistry::build(&config, &handlers).expect("registry builds");

    let channel = Arc::new(InMemoryChannel::new());
    let runtime = Arc::new(WorkloadRuntime::new(channel.clone(), registry));
    (runtime, channel)
}

fn build_runtime() -> (Arc<WorkloadRuntime<InMemoryChannel>>, Arc<InMemoryChannel>) {
    build_runtime_with("echo", echo_handler())
}

#[tokio::test]
async fn session_start_then_request_echoes_payload_back() {
    let (runtime, channel) = build_runtime();

    channel
        .send(42, MsgId::SessionStart as u32, 0, Bytes::from_static(b"robot-arm.angle"))
        .await;
    assert!(runtime.poll().await);
    let (session_id, msg_id, _seq, _payload) = channel.recv().await;
    assert_eq!(session_id, 42);
    assert_eq!(msg_id, MsgId::SessionStarted as u32);

    channel.send(42, MsgId::Request as u32, 5, Bytes::from_static(b"ping")).await;
    assert!(runtime.poll().await);
    let (session_id, msg_id, seq, payload) = channel.recv().await;
    assert_eq!(session_id, 42);
    assert_eq!(msg_id, MsgId::Response as u32);
    assert_eq!(seq, 5);
    assert_eq!(&payload[..], b"ping");
}

#[tokio::test]
async fn session_stop_empties_the_table_but_idle_waits_out_the_grace_period() {
    let (runtime, channel) = build_runtime();

    channel
        .send(1, MsgId::SessionStart as u32, 0, Bytes::from_static(b"robot-arm.angle"))
        .await;
    assert!(runtime.poll().await);
    let _ = channel.recv().await; // SESSION_STARTED

    assert!(!runtime.is_idle().await);

    channel.send(1, MsgId::SessionStop as u32, 0, Bytes::new()).await;
    assert!(runtime.poll().await);

    tokio::time::sleep(Duration::from_millis(10)).await;
    // The table is empty immediately, but the idle grace period has not
    // elapsed yet.
    assert!(!runtime.is_idle().await);
}

#[tokio::test]
async fn response_for_unknown_session_is_dropped_not_fatal() {
    let (runtime, channel) = build_runtime();
    channel.send(999, MsgId::Response as u32, 1, Bytes::from_static(b"stray")).await;
    assert!(runtime.poll().await);
}

#[tokio::test]
async fn handler_error_tears_down_the_active_session() {
    let (runtime, channel) = build_runtime_with("fails", Arc::new(FailingHandler));

    channel
        .send(7, MsgId::SessionStart as u32, 0, Bytes::from_static(b"robot-arm.angle"))
        .await;
    assert!(runtime.poll().await);
    let (_, msg_id, _, _) = channel.recv().await;
    assert_eq!(msg_id, MsgId::SessionStarted as u32);
    assert!(!runtime.is_idle().await);

    channel.send(7, MsgId::Request as u32, 1, Bytes::from_static(b"ping")).await;
    assert!(runtime.poll().await);

    // The handler errored, so the runtime notifies the peer with
    // SESSION_STOP before answering the still-pending request with an
    // empty RESPONSE, and tears the session down rather than leaving it
    // active.
    let (_, msg_id, _, _) = channel.recv().await;
    assert_eq!(msg_id, MsgId::SessionStop as u32);

    let (session_id, msg_id, seq, payload) = channel.recv().await;
    assert_eq!(session_id, 7);
    assert_eq!(msg_id, MsgId::Response as u32);
    assert_eq!(seq, 1);
    assert!(payload.is_empty());
}
