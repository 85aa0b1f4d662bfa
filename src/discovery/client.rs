// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Discovery REST client: discover candidate cloudlets, instantiate
//! an application deployment, and terminate it (spec §4.7).

use tracing::{error, info, warn};

use crate::discovery::models::{AppCloudResponse, DiscoverResponse, Microservice};
use crate::error::DiscoveryError;

/// A resolved application deployment: the cloud-facing endpoint used
/// for instantiate/terminate, the assigned deployment id, and the
/// microservice binding catalogue.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub deployment_uuid: String,
    pub cloudlet_id: String,
    pub microservices: Vec<Microservice>,
}

impl Deployment {
    pub fn microservice(&self, name: &str) -> Option<&Microservice> {
        self.microservices.iter().find(|m| m.name == name)
    }
}

/// Speaks the two (or three, in localhost mode) Discovery REST calls.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    discovery_url: String,
    api_key: String,
    sdk_version: String,
    localhost: bool,
    localhost_tester_url: String,
    http: reqwest::Client,
}

impl DiscoveryClient {
    pub fn new(
        discovery_url: String,
        api_key: String,
        sdk_version: String,
        localhost: bool,
        localhost_tester_url: String,
    ) -> Self {
        Self {
            discovery_url,
            api_key,
            sdk_version,
            localhost,
            localhost_tester_url,
            http: reqwest::Client::new(),
        }
    }

    /// `GET {DiscoveryURL}/api/v1.0/discover/{developer}/{app}?sdkversion=...`
    pub async fn discover(&self, developer: &str, app: &str) -> Result<DiscoverResponse, DiscoveryError> {
        let url = format!(
            "{}/api/v1.0/discover/{developer}/{app}?sdkversion={}",
            self.discovery_url, self.sdk_version
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status()));
        }

        let body: DiscoverResponse = response.json().await?;
        if body.cloudlets.is_empty() {
            return Err(DiscoveryError::NoCloudlets);
        }
        Ok(body)
    }

    /// `POST {app@cloud}/api/v1.0/app_cloud/{developer}/{app}/{cloudlet}/{client_id}`.
    ///
    /// In localhost mode the call is instead issued against the
    /// workload-tester endpoint with the same response shape, skipping
    /// cloudlet selection entirely.
    ///
    /// Unlike `discover`, this call carries no bearer token — matching
    /// the original client, which only authenticates discovery and
    /// sends instantiate/terminate with a bare `Content-Type` header.
    pub async fn instantiate(
        &self,
        app_at_cloud: &str,
        developer: &str,
        app: &str,
        cloudlet_id: &str,
        client_id: &str,
    ) -> Result<Deployment, DiscoveryError> {
        let url = if self.localhost {
            format!("{}/api/v1.0/workload-tester/{developer}/{app}", self.localhost_tester_url)
        } else {
            format!("{app_at_cloud}/api/v1.0/app_cloud/{developer}/{app}/{cloudlet_id}/{client_id}")
        };

        let response = self.http.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status()));
        }

        let body: AppCloudResponse = response.json().await?;
        info!(
            "instantiated deployment {} with {} microservices",
            body.deployment_id.uuid,
            body.microservices.len()
        );

        let microservices: Vec<Microservice> = body
            .microservices
            .into_iter()
            .map(Microservice::from_raw)
            .collect();

        Ok(Deployment {
            deployment_uuid: body.deployment_id.uuid,
            cloudlet_id: cloudlet_id.to_string(),
            microservices,
        })
    }

    /// `DELETE {app@cloud}/api/v1.0/app_cloud/{developer}/{app}/{cloudlet}/{client_id}/{deployment_uuid}`.
    ///
    /// Failures here are logged, not propagated: termination runs from
    /// the client's teardown path and must not prevent the caller from
    /// finishing shutdown. Carries no bearer token, matching `instantiate`.
    pub async fn terminate(
        &self,
        app_at_cloud: &str,
        developer: &str,
        app: &str,
        deployment: &Deployment,
        client_id: &str,
    ) {
        if self.localhost {
            return;
        }

        let url = format!(
            "{app_at_cloud}/api/v1.0/app_cloud/{developer}/{app}/{}/{client_id}/{}",
            deployment.cloudlet_id, deployment.deployment_uuid
        );

        match self.http.delete(&url).send().await {
            Ok(r) if r.status().is_success() => {},
            Ok(r) => warn!("terminate call to {url} returned {}", r.status()),
            Err(e) => error!("terminate call to {url} failed: {e}"),
        }
    }
}
