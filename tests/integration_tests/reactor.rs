// SPDX-License-Identifier: AGPL-3.0-or-later

//! Elastic pool growth under concurrent load (spec §8 scenario 6): a
//! slow handler blocking one worker must not stall dispatch of
//! messages on other sessions — the Reactor spawns a sibling worker
//! whenever none is left blocked in `recv`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use ens_core::frame::MsgId;
use ens_core::workload::{
    EventEntry, EventHandler, EventKind, HandlerFuture, HandlerRegistry, InMemoryChannel,
    InterWorkloadChannel, WorkloadConfig, WorkloadRuntime, reactor,
};

/// Blocks on the first `Request` it sees (to simulate a slow
/// handler) and counts every `Request` it completes.
struct SlowThenFastHandler {
    completed: Arc<AtomicUsize>,
}

impl EventHandler<InMemoryChannel> for SlowThenFastHandler {
    fn handle<'a>(
        &'a self,
        _runtime: &'a Arc<WorkloadRuntime<InMemoryChannel>>,
        session_id: u64,
        kind: EventKind,
        seq: u32,
        payload: Bytes,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            if kind == EventKind::Request && session_id == 1 {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            let _ = seq;
            Ok(payload)
        })
    }
}

#[tokio::test]
async fn a_slow_session_does_not_stall_dispatch_on_other_sessions() {
    let completed = Arc::new(AtomicUsize::new(0));
    let config = WorkloadConfig {
        id: "chan-0".to_string(),
        microservice: "robot-arm".to_string(),
        events: vec![EventEntry {
            name: "angle".to_string(),
            handler_name: "slow".to_string(),
            default: false,
        }],
    };
    let mut handlers: HashMap<String, Arc<dyn EventHandler<InMemoryChannel>>> = HashMap::new();
    handlers.insert("slow".to_string(), Arc::new(SlowThenFastHandler { completed: completed.clone() }));
    let registry = HandlerRegistry::build(&config, &handlers).expect("registry builds");

    let channel = Arc::new(InMemoryChannel::new());
    let runtime = Arc::new(WorkloadRuntime::new(channel.clone(), registry));
    reactor::spawn(runtime.clone());

    channel
        .send(1, MsgId::SessionStart as u32, 0, Bytes::from_static(b"robot-arm.angle"))
        .await;
    channel
        .send(2, MsgId::SessionStart as u32, 0, Bytes::from_static(b"robot-arm.angle"))
        .await;
    let _ = channel.recv().await;
    let _ = channel.recv().await;

    // Session 1's request blocks its worker for 200ms. While it's
    // blocked, session 2's request must still complete promptly,
    // which only happens if the Reactor grew a sibling worker.
    channel.send(1, MsgId::Request as u32, 10, Bytes::from_static(b"slow")).await;
    channel.send(2, MsgId::Request as u32, 20, Bytes::from_static(b"fast")).await;

    let (session_id, msg_id, seq, payload) =
        tokio::time::timeout(Duration::from_millis(100), channel.recv()).await.expect("fast response in time");
    assert_eq!(session_id, 2);
    assert_eq!(msg_id, MsgId::Response as u32);
    assert_eq!(seq, 20);
    assert_eq!(&payload[..], b"fast");

    let (session_id, msg_id, seq, _payload) = channel.recv().await;
    assert_eq!(session_id, 1);
    assert_eq!(msg_id, MsgId::Response as u32);
    assert_eq!(seq, 10);

    assert_eq!(completed.load(Ordering::SeqCst), 2);
}
