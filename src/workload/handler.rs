// SPDX-License-Identifier: AGPL-3.0-or-later

//! The handler contract invoked by the Reactor on dispatch (spec
//! §4.8). The source resolves handlers by dotted import path at
//! startup; this crate replaces that with compile-time registration
//! (see `HandlerRegistry`), so a handler here is just a trait object
//! the embedder supplies.
//!
//! A handler is given a handle back to its owning runtime so it can
//! call the outbound `session_start`/`session_request`/`session_notify`/
//! `session_end` APIs from inside dispatch — e.g. forwarding a `NOTIFY`
//! it received on one session onto another, the way the source's
//! `event_handler` calls `enswr.session_notify` from inside a `NOTIFY`
//! branch.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::workload::channel::InterWorkloadChannel;
use crate::workload::runtime::WorkloadRuntime;

/// The reason the Reactor is invoking a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Request,
    Notify,
    SessionStart,
    SessionEnd,
    SessionDisconnect,
}

/// The boxed future a handler invocation returns. Handlers are stored
/// as `Arc<dyn EventHandler<C>>`, so the trait can't use `async fn`
/// directly (not dyn-compatible); this is the manual equivalent.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Bytes>> + Send + 'a>>;

/// A workload's event handler. Implementations MUST be reentrancy-safe:
/// the runtime invokes the same handler concurrently across distinct
/// (and potentially identical) session ids.
pub trait EventHandler<C: InterWorkloadChannel>: Send + Sync {
    /// Handles one dispatched event. `runtime` is the owning
    /// `WorkloadRuntime`, available for outbound calls. The return
    /// value is sent back as the `RESPONSE` payload for
    /// `EventKind::Request`; ignored for every other kind.
    fn handle<'a>(
        &'a self,
        runtime: &'a Arc<WorkloadRuntime<C>>,
        session_id: u64,
        kind: EventKind,
        seq: u32,
        payload: Bytes,
    ) -> HandlerFuture<'a>;
}

/// Adapts a plain synchronous closure — one with no need to call back
/// into the runtime — into an `EventHandler`. Most handlers (echoes,
/// pure transforms) fit this; handlers that need `session_notify` and
/// friends implement `EventHandler` directly instead.
pub struct SyncHandler<F>(pub F);

impl<C, F> EventHandler<C> for SyncHandler<F>
where
    C: InterWorkloadChannel,
    F: Fn(u64, EventKind, u32, Bytes) -> anyhow::Result<Bytes> + Send + Sync,
{
    fn handle<'a>(
        &'a self,
        _runtime: &'a Arc<WorkloadRuntime<C>>,
        session_id: u64,
        kind: EventKind,
        seq: u32,
        payload: Bytes,
    ) -> HandlerFuture<'a> {
        let result = (self.0)(session_id, kind, seq, payload);
        Box::pin(async move { result })
    }
}
