// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Reactor: an elastic pool of worker tasks each looping on
//! `recv`/dispatch. Immediately before dispatching a message, a worker
//! that finds itself the last one blocked in `recv` spawns a sibling —
//! the pool grows under load and never leaves every worker stuck
//! behind one slow handler (spec §4.8, §5).

use std::sync::Arc;

use tracing::debug;

use crate::workload::channel::{InterWorkloadChannel, MSG_WORKLOAD_TERMINATED};
use crate::workload::runtime::WorkloadRuntime;

/// Spawns the Reactor's first worker. Each worker that observes
/// `waiters() == 0` right before it dispatches spawns one more,
/// keeping at least one task perpetually blocked in `recv`.
pub fn spawn<C>(runtime: Arc<WorkloadRuntime<C>>)
where
    C: InterWorkloadChannel + 'static,
{
    spawn_worker(runtime);
}

fn spawn_worker<C>(runtime: Arc<WorkloadRuntime<C>>)
where
    C: InterWorkloadChannel + 'static,
{
    tokio::spawn(async move { worker_loop(runtime).await });
}

async fn worker_loop<C>(runtime: Arc<WorkloadRuntime<C>>)
where
    C: InterWorkloadChannel + 'static,
{
    loop {
        let (session_id, msg_id, seq, payload) = runtime.channel().recv().await;

        if msg_id == MSG_WORKLOAD_TERMINATED {
            break;
        }

        if runtime.channel().waiters() == 0 {
            debug!("last worker idle, growing reactor pool");
            spawn_worker(runtime.clone());
        }

        runtime.dispatch(session_id, msg_id, seq, payload).await;
    }
}
