// SPDX-License-Identifier: AGPL-3.0-or-later

//! The server-side half of the protocol core: a runtime that dispatches
//! framed traffic arriving over an inter-workload channel to
//! statically-registered handlers, via an elastic Reactor pool (spec
//! §4.8).

pub mod channel;
pub mod config;
pub mod handler;
pub mod reactor;
pub mod runtime;
pub mod session;

pub use channel::{InMemoryChannel, InterWorkloadChannel, MSG_WORKLOAD_TERMINATED};
pub use config::{EventEntry, HandlerRegistry, WorkloadConfig};
pub use handler::{EventHandler, EventKind, HandlerFuture, SyncHandler};
pub use runtime::WorkloadRuntime;
pub use session::WorkloadSession;
