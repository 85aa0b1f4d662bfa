// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Workload Runtime: owns the session table, dispatches messages
//! pulled off the inter-workload channel, and exposes the outbound
//! `session_start`/`session_request` (`send`)/`session_notify`/
//! `session_end` API (spec §4.8).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::frame::MsgId;
use crate::session::SessionState;
use crate::workload::channel::{InterWorkloadChannel, MSG_WORKLOAD_TERMINATED};
use crate::workload::config::HandlerRegistry;
use crate::workload::handler::{EventHandler, EventKind};
use crate::workload::session::WorkloadSession;

/// Sessions idle (table empty) for at least this long are reported
/// idle by [`WorkloadRuntime::is_idle`].
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WorkloadRuntime<C: InterWorkloadChannel> {
    channel: Arc<C>,
    registry: HandlerRegistry<C>,
    sessions: Mutex<HashMap<u64, Arc<WorkloadSession<C>>>>,
    next_session_id: AtomicU64,
    last_active: Mutex<Instant>,
}

impl<C: InterWorkloadChannel + 'static> WorkloadRuntime<C> {
    pub fn new(channel: Arc<C>, registry: HandlerRegistry<C>) -> Self {
        Self {
            channel,
            registry,
            sessions: Mutex::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
            last_active: Mutex::new(Instant::now()),
        }
    }

    fn new_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Removes a session from the table. If the table is now empty,
    /// this is the moment the runtime became idle, so `last_active` is
    /// stamped here — not on every dispatch.
    async fn remove_session(&self, id: u64) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&id);
        if sessions.is_empty() {
            *self.last_active.lock().await = Instant::now();
        }
    }

    /// True once the session table has been empty for at least
    /// [`IDLE_TIMEOUT`].
    pub async fn is_idle(&self) -> bool {
        let sessions = self.sessions.lock().await;
        if !sessions.is_empty() {
            return false;
        }
        self.last_active.lock().await.elapsed() >= IDLE_TIMEOUT
    }

    /// Opens a session outbound to `interface`, blocking until the peer
    /// confirms with `SESSION_STARTED`. `event_fn`, if given, overrides
    /// the statically registered handler for every event dispatched on
    /// this session (spec.md:152). On any failure the half-created
    /// session is removed and `None` is returned.
    pub async fn session_start(
        &self,
        interface: &str,
        event_fn: Option<Arc<dyn EventHandler<C>>>,
    ) -> Option<u64> {
        let id = self.new_session_id();
        let session =
            Arc::new(WorkloadSession::new(id, Some(interface.to_string())).with_override_handler(event_fn));
        let waiter = session.register_waiter(0);

        self.sessions.lock().await.insert(id, session);

        self.channel
            .send(id, MsgId::SessionStart as u32, 0, Bytes::copy_from_slice(interface.as_bytes()))
            .await;

        match waiter.await {
            Ok(_) => Some(id),
            Err(_) => {
                self.remove_session(id).await;
                None
            },
        }
    }

    /// Sends a request on an already-started outbound session and
    /// awaits the correlated response.
    pub async fn send(&self, session_id: u64, seq: u32, payload: Bytes) -> Option<Bytes> {
        let session = self.sessions.lock().await.get(&session_id).cloned()?;
        if !session.is_active() {
            return None;
        }
        let waiter = session.register_waiter(seq);
        self.channel.send(session_id, MsgId::Request as u32, seq, payload).await;
        waiter.await.ok()
    }

    /// Sends a one-way notify on an already-started outbound session;
    /// unlike `send`, there is no correlated response to await.
    pub async fn session_notify(&self, session_id: u64, seq: u32, payload: Bytes) {
        let session = self.sessions.lock().await.get(&session_id).cloned();
        let Some(session) = session else {
            warn!("session_notify on unknown session {session_id}");
            return;
        };
        if !session.is_active() {
            warn!("session_notify on inactive session {session_id}");
            return;
        }
        self.channel.send(session_id, MsgId::Notify as u32, seq, payload).await;
    }

    pub async fn session_end(&self, session_id: u64) {
        if let Some(session) = self.sessions.lock().await.get(&session_id).cloned() {
            session.set_state(SessionState::Closed);
            self.channel.send(session_id, MsgId::SessionStop as u32, 0, Bytes::new()).await;
        }
        self.remove_session(session_id).await;
    }

    /// Reads and dispatches exactly one message. Returns `false` when
    /// the distinguished shutdown message was received, signalling the
    /// caller's loop to stop.
    pub async fn poll(self: &Arc<Self>) -> bool {
        let (session_id, msg_id, seq, payload) = self.channel.recv().await;
        if msg_id == MSG_WORKLOAD_TERMINATED {
            return false;
        }
        self.dispatch(session_id, msg_id, seq, payload).await;
        true
    }

    /// Exposes the channel for the Reactor's manual recv/dispatch loop,
    /// which needs to inspect `waiters()` between the two steps.
    pub(crate) fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    pub(crate) async fn dispatch(self: &Arc<Self>, session_id: u64, msg_id: u32, seq: u32, payload: Bytes) {
        if msg_id == MsgId::Response as u32 {
            let session = self.sessions.lock().await.get(&session_id).cloned();
            if let Some(session) = session {
                if !session.signal(seq, payload) {
                    warn!("response for unknown seq={seq} on session {session_id}");
                }
            } else {
                warn!("response for unknown session {session_id}");
            }
            return;
        }

        if msg_id == MsgId::SessionStarted as u32 {
            let session = self.sessions.lock().await.get(&session_id).cloned();
            if let Some(session) = session {
                session.set_state(SessionState::Active);
                session.signal(0, payload);
            }
            return;
        }

        if msg_id == MsgId::SessionStart as u32 {
            let interface = String::from_utf8_lossy(&payload).to_string();
            let session = Arc::new(WorkloadSession::new(session_id, Some(interface.clone())));
            session.set_state(SessionState::Active);
            self.sessions.lock().await.insert(session_id, session.clone());

            self.invoke(&session, &interface, EventKind::SessionStart, seq, Bytes::new())
                .await;
            self.channel
                .send(session_id, MsgId::SessionStarted as u32, seq, Bytes::new())
                .await;
            return;
        }

        let session = self.sessions.lock().await.get(&session_id).cloned();
        let Some(session) = session else {
            warn!("message for unknown session {session_id} (msg_id={msg_id})");
            return;
        };

        let kind = if msg_id == MsgId::Request as u32 {
            EventKind::Request
        } else if msg_id == MsgId::Notify as u32 {
            EventKind::Notify
        } else if msg_id == MsgId::SessionStop as u32 {
            EventKind::SessionEnd
        } else if msg_id == MsgId::SessionDisconnected as u32 {
            EventKind::SessionDisconnect
        } else {
            warn!("unhandled msg_id={msg_id} on session {session_id}");
            return;
        };

        let interface = session.interface().unwrap_or_default();
        let result = self.invoke(&session, &interface, kind, seq, payload).await;

        if kind == EventKind::Request {
            let response = result.unwrap_or_default();
            self.channel.send(session_id, MsgId::Response as u32, seq, response).await;
        }

        if matches!(kind, EventKind::SessionEnd | EventKind::SessionDisconnect) {
            session.set_state(SessionState::Closed);
        }

        if !session.is_active() {
            session.release_all_waiters();
            self.remove_session(session_id).await;
        }
    }

    /// Invokes the session's override handler if one was set at
    /// `session_start`, else the handler bound to `interface`, falling
    /// back to the registry's default handler. Logs (rather than
    /// propagates) any handler error, tearing the session down if it
    /// was active.
    async fn invoke(
        self: &Arc<Self>,
        session: &Arc<WorkloadSession<C>>,
        interface: &str,
        kind: EventKind,
        seq: u32,
        payload: Bytes,
    ) -> Option<Bytes> {
        let handler = session
            .override_handler()
            .or_else(|| self.registry.get(interface).cloned())
            .or_else(|| self.registry.default_handler().cloned())?;

        match handler.handle(self, session.id, kind, seq, payload).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!("handler error on session {} ({:?}): {e}", session.id, kind);
                if session.is_active() {
                    session.set_state(SessionState::Closed);
                    self.channel.send(session.id, MsgId::SessionStop as u32, 0, Bytes::new()).await;
                }
                None
            },
        }
    }
}
