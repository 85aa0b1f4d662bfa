// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod client;
pub mod models;

pub use client::{Deployment, DiscoveryClient};
pub use models::{
    AppCloudResponse, Binding, CloudletCandidate, DiscoverResponse, Microservice,
};
