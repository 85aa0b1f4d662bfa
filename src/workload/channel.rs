// SPDX-License-Identifier: AGPL-3.0-or-later

//! The inter-workload channel: an abstract four-tuple message
//! transport the Workload Runtime polls for incoming traffic (spec
//! §4.8). Production deployments bridge this to whatever local IPC the
//! host platform provides; `InMemoryChannel` below is the harness used
//! by this crate's own tests.

use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::sync::Notify;

/// Distinguished message that signals the runtime to shut down.
pub const MSG_WORKLOAD_TERMINATED: u32 = u32::MAX;

/// A four-tuple message: `(session_id, msg_id, seq, payload)`.
pub type ChannelMessage = (u64, u32, u32, Bytes);

/// An abstract blocking message transport. `recv` blocks until a
/// message is available; `waiters()` reports how many callers are
/// currently blocked inside `recv`, which the Reactor uses to decide
/// when to grow its worker pool.
pub trait InterWorkloadChannel: Send + Sync {
    fn send(
        &self,
        session_id: u64,
        msg_id: u32,
        seq: u32,
        payload: Bytes,
    ) -> impl Future<Output = ()> + Send;

    fn recv(&self) -> impl Future<Output = ChannelMessage> + Send;

    fn waiters(&self) -> usize;
}

/// An in-process channel backed by a `VecDeque`, used by this crate's
/// own tests and as a reference implementation.
#[derive(Default)]
pub struct InMemoryChannel {
    queue: StdMutex<VecDeque<ChannelMessage>>,
    notify: Notify,
    waiters: AtomicUsize,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InterWorkloadChannel for InMemoryChannel {
    async fn send(&self, session_id: u64, msg_id: u32, seq: u32, payload: Bytes) {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).push_back((
            session_id,
            msg_id,
            seq,
            payload,
        ));
        self.notify.notify_one();
    }

    async fn recv(&self) -> ChannelMessage {
        self.waiters.fetch_add(1, Ordering::SeqCst);
        loop {
            if let Some(msg) = self.queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
                self.waiters.fetch_sub(1, Ordering::SeqCst);
                return msg;
            }
            self.notify.notified().await;
        }
    }

    fn waiters(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }
}
