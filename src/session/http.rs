// SPDX-License-Identifier: AGPL-3.0-or-later

//! A thin HTTP session adapter. The source implements only `GET`; other
//! methods are a clear, intentional extension point (spec §4.4).

use bytes::Bytes;
use tracing::{error, info};

/// Binding coordinates for an HTTP interface: the base endpoint and the
/// bearer-style access token sent as `API-KEY`.
#[derive(Debug, Clone)]
pub struct HttpSession {
    endpoint: String,
    access_token: String,
    client: reqwest::Client,
}

impl HttpSession {
    pub fn new(endpoint: String, access_token: String) -> Self {
        Self {
            endpoint,
            access_token,
            client: reqwest::Client::new(),
        }
    }

    /// Performs an HTTP request against `endpoint + api_path`. Only
    /// `GET` is implemented; other methods are rejected rather than
    /// silently misrouted.
    pub async fn request(&self, method: HttpMethod, api_path: &str, _body: &[u8]) -> Option<Bytes> {
        if method != HttpMethod::Get {
            error!("HttpSession::request: only GET is implemented (got {method:?})");
            return None;
        }

        let url = format!("{}{}", self.endpoint, api_path);
        let response = match self
            .client
            .get(&url)
            .header("Content-Type", "application/json")
            .header("API-KEY", &self.access_token)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!("HTTP request to {url} failed: {e}");
                return None;
            },
        };

        if response.status() != reqwest::StatusCode::OK {
            error!("service error: [{}] - {url}", response.status());
            return None;
        }

        match response.bytes().await {
            Ok(b) => {
                info!("API response from {url}: {} bytes", b.len());
                Some(b)
            },
            Err(e) => {
                error!("failed to read response body from {url}: {e}");
                None
            },
        }
    }

    pub async fn close(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
}
