// SPDX-License-Identifier: AGPL-3.0-or-later

//! A session as tracked by the Workload Runtime's session table (spec
//! §4.8) — distinct from the client-side `EventSession`: this side has
//! no socket of its own, only a channel-routed identity and a pending
//! map for requests this workload issued outbound.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::session::SessionState;
use crate::workload::channel::InterWorkloadChannel;
use crate::workload::handler::EventHandler;

/// One entry in the Workload Runtime's session table.
pub struct WorkloadSession<C: InterWorkloadChannel> {
    pub id: u64,
    interface: std::sync::Mutex<Option<String>>,
    state: AtomicU8,
    pending: DashMap<u32, oneshot::Sender<Bytes>>,
    /// A per-session handler override, set via `session_start`'s
    /// optional `event_fn` argument (spec.md:152). Consulted ahead of
    /// the static `HandlerRegistry` by dispatch.
    override_handler: std::sync::Mutex<Option<Arc<dyn EventHandler<C>>>>,
}

impl<C: InterWorkloadChannel> WorkloadSession<C> {
    pub fn new(id: u64, interface: Option<String>) -> Self {
        Self {
            id,
            interface: std::sync::Mutex::new(interface),
            state: AtomicU8::new(SessionState::Idle as u8),
            pending: DashMap::new(),
            override_handler: std::sync::Mutex::new(None),
        }
    }

    pub fn with_override_handler(self, handler: Option<Arc<dyn EventHandler<C>>>) -> Self {
        *self.override_handler.lock().unwrap_or_else(|e| e.into_inner()) = handler;
        self
    }

    pub fn override_handler(&self) -> Option<Arc<dyn EventHandler<C>>> {
        self.override_handler.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn interface(&self) -> Option<String> {
        self.interface.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_interface(&self, interface: String) {
        *self.interface.lock().unwrap_or_else(|e| e.into_inner()) = Some(interface);
    }

    /// Registers a Waiter for `seq`, to be signalled when a correlated
    /// `RESPONSE` (or `SESSION_STARTED`, at `seq == 0`) is dispatched.
    pub fn register_waiter(&self, seq: u32) -> oneshot::Receiver<Bytes> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, tx);
        rx
    }

    /// Signals the Waiter at `seq` with `payload`, if one is still
    /// registered. Returns whether a waiter was found.
    pub fn signal(&self, seq: u32, payload: Bytes) -> bool {
        match self.pending.remove(&seq) {
            Some((_, tx)) => {
                let _ = tx.send(payload);
                true
            },
            None => false,
        }
    }

    /// Releases every outstanding Waiter with an empty payload, the
    /// teardown behavior shared with the client-side session.
    pub fn release_all_waiters(&self) {
        let keys: Vec<u32> = self.pending.iter().map(|e| *e.key()).collect();
        for seq in keys {
            self.signal(seq, Bytes::new());
        }
    }
}
