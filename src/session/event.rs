// SPDX-License-Identifier: AGPL-3.0-or-later

//! The event protocol session: a framed duplex TCP connection carrying
//! correlated request/response traffic and one-way notifies, backed by
//! a dedicated reader task.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::frame::{self, MsgId, ShortFrameOrIo};
use crate::session::SessionState;

/// A live session to an event interface on a cloudlet workload.
///
/// Constructed via [`EventSession::connect`]; closing it (explicitly or
/// by `Drop`) releases the socket, the reader task, and every
/// outstanding [`EventSession::request`] waiter.
#[derive(Debug)]
pub struct EventSession {
    #[allow(dead_code)]
    pub id: u64,
    pub interface_name: String,
    writer: Mutex<Option<OwnedWriteHalf>>,
    state: AtomicU8,
    req_seq: AtomicU64,
    pending: DashMap<u32, oneshot::Sender<Bytes>>,
    notify_tx: mpsc::UnboundedSender<(u32, Bytes)>,
    notify_rx: Mutex<mpsc::UnboundedReceiver<(u32, Bytes)>>,
}

impl EventSession {
    /// Opens a TCP connection to the first resolved address of
    /// `endpoint`, performs the `SESSION_START`/`SESSION_STARTED`
    /// handshake, and spawns the reader task. Returns `None` on any
    /// connect/handshake failure; a partially opened socket is closed.
    pub async fn connect(id: u64, interface_name: String, endpoint: &Endpoint) -> Option<Arc<Self>> {
        let addr = match endpoint.first_address() {
            Some(a) => a,
            None => {
                warn!("no resolved address for endpoint {:?}", endpoint.host);
                return None;
            },
        };

        let stream = match TcpStream::connect(addr).await {
            Ok(s) => s,
            Err(e) => {
                warn!("failed to connect session to {addr}: {e}");
                return None;
            },
        };

        let (read_half, mut write_half) = stream.into_split();

        if let Err(e) = frame::write_frame(
            &mut write_half,
            MsgId::SessionStart as u32,
            0,
            interface_name.as_bytes(),
        )
        .await
        {
            warn!("failed to send SESSION_START: {e}");
            return None;
        }

        let mut handshake_reader = read_half;
        match frame::read_frame(&mut handshake_reader).await {
            Ok(f) if f.msg_id == MsgId::SessionStarted as u32 => {},
            Ok(f) => {
                warn!("expected SESSION_STARTED, got msg_id={}", f.msg_id);
                return None;
            },
            Err(e) => {
                warn!("failed to read SESSION_STARTED: {e}");
                return None;
            },
        }

        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let session = Arc::new(Self {
            id,
            interface_name,
            writer: Mutex::new(Some(write_half)),
            state: AtomicU8::new(SessionState::Active as u8),
            req_seq: AtomicU64::new(1),
            pending: DashMap::new(),
            notify_tx,
            notify_rx: Mutex::new(notify_rx),
        });

        let reader_session = Arc::clone(&session);
        tokio::spawn(async move {
            reader_session.read_loop(handshake_reader).await;
        });

        Some(session)
    }

    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    async fn read_loop(self: Arc<Self>, mut reader: OwnedReadHalf) {
        loop {
            match frame::read_frame(&mut reader).await {
                Ok(f) if f.msg_id == MsgId::Response as u32 => {
                    if let Some((_, sender)) = self.pending.remove(&f.seq) {
                        let _ = sender.send(f.payload);
                    } else {
                        warn!("received response for unknown seq={}", f.seq);
                    }
                },
                Ok(f) if f.msg_id == MsgId::Notify as u32 => {
                    let _ = self.notify_tx.send((f.seq, f.payload));
                },
                Ok(f) => {
                    warn!("unexpected msg_id={} on event session reader", f.msg_id);
                },
                Err(ShortFrameOrIo::Short(_)) => {
                    debug!("short frame: peer closed mid-frame, terminating reader");
                    break;
                },
                Err(ShortFrameOrIo::Io(e)) => {
                    debug!("reader socket error: {e}");
                    break;
                },
            }
        }

        self.teardown().await;
    }

    async fn teardown(&self) {
        self.state.store(SessionState::Closed as u8, Ordering::SeqCst);
        *self.writer.lock().await = None;
        let keys: Vec<u32> = self.pending.iter().map(|e| *e.key()).collect();
        for seq in keys {
            if let Some((_, sender)) = self.pending.remove(&seq) {
                let _ = sender.send(Bytes::new());
            }
        }
    }

    /// Sends a request and blocks until the correlated response
    /// arrives or the session is torn down (in which case the result
    /// is `Some(Bytes::new())` — an empty payload, per the empty-on-
    /// teardown invariant). Returns `None` only when there is no
    /// active connection to send on.
    pub async fn request(&self, payload: &[u8]) -> Option<Bytes> {
        if !self.is_active() {
            return None;
        }

        let seq = self.req_seq.fetch_add(1, Ordering::SeqCst) as u32;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, tx);

        {
            let mut guard = self.writer.lock().await;
            let Some(writer) = guard.as_mut() else {
                self.pending.remove(&seq);
                return None;
            };
            if let Err(e) = frame::write_frame(writer, MsgId::Request as u32, seq, payload).await {
                warn!("failed to send request seq={seq}: {e}");
                self.pending.remove(&seq);
                return None;
            }
        }

        match rx.await {
            Ok(bytes) => Some(bytes),
            Err(_) => Some(Bytes::new()),
        }
    }

    /// Sends a request and returns `None` on timeout, deregistering the
    /// waiter first so a late response can't write into freed state.
    pub async fn request_with_timeout(&self, payload: &[u8], timeout: Duration) -> Option<Bytes> {
        if !self.is_active() {
            return None;
        }

        let seq = self.req_seq.fetch_add(1, Ordering::SeqCst) as u32;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, tx);

        {
            let mut guard = self.writer.lock().await;
            let Some(writer) = guard.as_mut() else {
                self.pending.remove(&seq);
                return None;
            };
            if let Err(e) = frame::write_frame(writer, MsgId::Request as u32, seq, payload).await {
                warn!("failed to send request seq={seq}: {e}");
                self.pending.remove(&seq);
                return None;
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(bytes)) => Some(bytes),
            Ok(Err(_)) => Some(Bytes::new()),
            Err(_) => {
                self.pending.remove(&seq);
                None
            },
        }
    }

    /// Sends a one-way notify; does not wait for an acknowledgement.
    pub async fn notify(&self, seq: u32, payload: &[u8]) {
        if !self.is_active() {
            return;
        }
        let mut guard = self.writer.lock().await;
        if let Some(writer) = guard.as_mut() {
            if let Err(e) = frame::write_frame(writer, MsgId::Notify as u32, seq, payload).await {
                warn!("failed to send notify seq={seq}: {e}");
            }
        }
    }

    /// Dequeues the next received notify, blocking up to `timeout` if
    /// given (or indefinitely if `None` and `block` is true).
    pub async fn get_notify(&self, block: bool, timeout: Option<Duration>) -> Option<(u32, Bytes)> {
        let mut rx = self.notify_rx.lock().await;
        if !block {
            return rx.try_recv().ok();
        }
        match timeout {
            Some(d) => tokio::time::timeout(d, rx.recv()).await.ok().flatten(),
            None => rx.recv().await,
        }
    }

    /// Sends `SESSION_STOP` and shuts down the connection. Idempotent:
    /// subsequent calls and subsequent `request`/`notify` calls are
    /// no-ops.
    pub async fn close(&self) {
        if self.state.swap(SessionState::Closed as u8, Ordering::SeqCst) == SessionState::Closed as u8 {
            return;
        }

        let mut guard = self.writer.lock().await;
        if let Some(writer) = guard.as_mut() {
            let _ = frame::write_frame(writer, MsgId::SessionStop as u32, 0, &[]).await;
            let _ = writer.shutdown().await;
        }
        *guard = None;
        drop(guard);

        let keys: Vec<u32> = self.pending.iter().map(|e| *e.key()).collect();
        for seq in keys {
            if let Some((_, sender)) = self.pending.remove(&seq) {
                let _ = sender.send(Bytes::new());
            }
        }
    }
}
