// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Client SDK entry point: loads configuration, runs discovery and
//! probing, instantiates the application, and hands out typed sessions
//! to its microservice interfaces (spec §2, §4.7).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};
use uuid::Uuid;

use crate::cfg::sdk_config::SdkConfig;
use crate::discovery::{Binding, Deployment, DiscoveryClient, Microservice};
use crate::endpoint::Endpoint;
use crate::prober;
use crate::session::{EventSession, HttpSession, NetworkSession};

/// A connected interface handle, one of the three session kinds. Which
/// variant `connect()` returns is determined by the binding catalogue,
/// not by caller choice.
pub enum Session {
    Event(Arc<EventSession>),
    Http(HttpSession),
    Network(NetworkSession),
}

/// The Client SDK's top-level handle: owns the Discovery REST client,
/// the resolved application deployment, and issues session handles
/// against it.
pub struct Client {
    config: SdkConfig,
    discovery: DiscoveryClient,
    client_id: String,
    developer: String,
    app: String,
    deployment: Option<Deployment>,
    app_at_cloud: Option<String>,
    next_session_id: AtomicU64,
}

impl Client {
    pub fn new(config: SdkConfig, developer: String, app: String) -> Self {
        let localhost = config.is_localhost();
        let discovery = DiscoveryClient::new(
            config.discovery_url.clone(),
            config.api_key.clone(),
            config.sdk_version.clone(),
            localhost,
            config.localhost_tester_url().to_string(),
        );
        Self {
            config,
            discovery,
            client_id: Uuid::new_v4().to_string(),
            developer,
            app,
            deployment: None,
            app_at_cloud: None,
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Runs discover → probe → instantiate. Returns `false` on any
    /// startup failure (missing config, no cloudlets, discovery
    /// failure) — matching the source's boolean-return init contract
    /// rather than propagating every cause to the caller.
    pub async fn init(&mut self) -> bool {
        if self.config.is_localhost() {
            return self.init_localhost().await;
        }

        let discovered = match self.discovery.discover(&self.developer, &self.app).await {
            Ok(d) => d,
            Err(e) => {
                warn!("discovery failed: {e}");
                return false;
            },
        };

        let candidates: HashMap<String, String> = discovered
            .cloudlets
            .iter()
            .map(|(id, c)| (id.clone(), c.endpoints.probe.clone()))
            .collect();

        let Some((cloudlet_id, probe)) = prober::select_cloudlet(&candidates, &self.app).await else {
            warn!("no cloudlet responded to probing");
            return false;
        };
        let mean = probe.mean().map(|d| d.as_secs_f64()).unwrap_or(-1.0);
        info!("selected cloudlet {cloudlet_id} with mean RTT {mean:.6}s");

        self.app_at_cloud = Some(discovered.cloud.endpoints.app_at_cloud.clone());

        let deployment = match self
            .discovery
            .instantiate(
                self.app_at_cloud.as_deref().unwrap_or_default(),
                &self.developer,
                &self.app,
                &cloudlet_id,
                &self.client_id,
            )
            .await
        {
            Ok(d) => d,
            Err(e) => {
                warn!("instantiate failed: {e}");
                return false;
            },
        };

        self.deployment = Some(deployment);
        true
    }

    async fn init_localhost(&mut self) -> bool {
        let deployment = match self
            .discovery
            .instantiate("", &self.developer, &self.app, "localhost", &self.client_id)
            .await
        {
            Ok(d) => d,
            Err(e) => {
                warn!("localhost workload-tester instantiate failed: {e}");
                return false;
            },
        };
        self.deployment = Some(deployment);
        true
    }

    fn microservice(&self, name: &str) -> Option<&Microservice> {
        self.deployment.as_ref()?.microservice(name)
    }

    /// Opens a session to `microservice.interface_id`, returning
    /// whichever variant the binding catalogue says that interface is.
    pub async fn connect(&self, microservice: &str, interface_id: &str) -> Option<Session> {
        let key = format!("{microservice}.{interface_id}");
        let ms = self.microservice(microservice)?;
        let binding = ms.binding_for(&key)?;

        match binding {
            Binding::Event { endpoint } => {
                let endpoint = Endpoint::parse(endpoint).ok()?;
                let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
                let session = EventSession::connect(id, key, &endpoint).await?;
                Some(Session::Event(session))
            },
            Binding::Http { endpoint, access_token } => {
                Some(Session::Http(HttpSession::new(endpoint.clone(), access_token.clone())))
            },
            Binding::Network { endpoint } => {
                let endpoint = Endpoint::parse(endpoint).ok()?;
                let session = NetworkSession::connect(&endpoint).await?;
                Some(Session::Network(session))
            },
        }
    }

    /// Terminates the deployment via the DELETE REST call. Called from
    /// the owner's shutdown path; never from a destructor, since async
    /// work cannot run inside `Drop`.
    pub async fn close(&mut self) {
        if let Some(deployment) = self.deployment.take() {
            let app_at_cloud = self.app_at_cloud.clone().unwrap_or_default();
            self.discovery
                .terminate(&app_at_cloud, &self.developer, &self.app, &deployment, &self.client_id)
                .await;
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}
