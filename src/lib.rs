// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session and request/response protocol core for an edge-compute
//! microservice runtime.
//!
//! This crate implements the shared machinery between the two halves
//! of the system: the Client SDK (discovery, RTT-based cloudlet
//! selection, typed sessions) and the Workload Runtime (elastic
//! dispatch of inbound traffic to registered handlers). See
//! [`client::Client`] and [`workload::WorkloadRuntime`] for the two
//! entry points.

pub mod cfg;
pub mod client;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod prober;
pub mod session;
pub mod workload;
