// SPDX-License-Identifier: AGPL-3.0-or-later

//! Typed error taxonomy for the session/request-response core.
//!
//! These are the error *kinds* described in the design's error handling
//! section: each maps to a specific failure surface and propagation
//! policy. Call sites that aggregate across layers use `anyhow::Error`
//! instead; these types exist at the boundaries where a caller needs to
//! match on what went wrong.

use thiserror::Error;

/// Endpoint string did not match `scheme://host:port`, or named an
/// unsupported scheme. Fatal to whatever tried to parse it.
#[derive(Debug, Error)]
#[error("invalid endpoint {endpoint:?}: {reason}")]
pub struct BadEndpoint {
    pub endpoint: String,
    pub reason: String,
}

/// A frame read ended before the declared length was satisfied. Always
/// terminates the session reader that hit it.
#[derive(Debug, Error)]
#[error("short frame: expected {expected} bytes, got {got}")]
pub struct ShortFrame {
    pub expected: usize,
    pub got: usize,
}

/// A required key was missing or malformed in a configuration source.
/// Fatal at startup.
#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

/// Discovery REST call failed or returned a response missing required
/// fields. Startup-fatal to the caller of `Client::init`.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("discovery server returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("discovery response missing required field: {0}")]
    MissingField(&'static str),
    #[error("no cloudlets available to probe")]
    NoCloudlets,
}

/// An unknown `msg_id` or a message inconsistent with the session's
/// current state. Logged and dropped; the session survives.
#[derive(Debug, Error)]
#[error("protocol error: {0}")]
pub struct ProtocolError(pub String);
