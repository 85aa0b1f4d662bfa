// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wire shapes returned by the Discovery REST service (spec §4.7) and
//! the in-memory binding catalogue built from them (spec §3's Data
//! Model).

use std::collections::HashMap;

use serde::Deserialize;

/// One candidate cloudlet entry from the Discover response.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudletCandidate {
    pub endpoints: CloudletEndpoints,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudletEndpoints {
    pub probe: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudEndpoints {
    #[serde(rename = "app@cloud")]
    pub app_at_cloud: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudSection {
    pub endpoints: CloudEndpoints,
}

/// `GET {DiscoveryURL}/api/v1.0/discover/{developer}/{app}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverResponse {
    pub cloudlets: HashMap<String, CloudletCandidate>,
    pub cloud: CloudSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentId {
    pub uuid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventGatewayEntry {
    #[serde(rename = "eventId")]
    pub event_id: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpGatewayEntry {
    #[serde(rename = "httpApiId")]
    pub http_api_id: String,
    pub endpoint: String,
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkBindingEntry {
    #[serde(rename = "networkId")]
    pub network_id: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMicroservice {
    pub name: String,
    #[serde(default, rename = "eventGateway")]
    pub event_gateway: Vec<EventGatewayEntry>,
    #[serde(default, rename = "httpGateway")]
    pub http_gateway: Vec<HttpGatewayEntry>,
    #[serde(default, rename = "networkBinding")]
    pub network_binding: Vec<NetworkBindingEntry>,
}

/// `POST {app@cloud}/api/v1.0/app_cloud/{developer}/{app}/{cloudlet}/{client_id}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AppCloudResponse {
    #[serde(rename = "deploymentId")]
    pub deployment_id: DeploymentId,
    pub microservices: Vec<RawMicroservice>,
}

/// One of the three binding variants keyed by `microservice.interface_id`.
#[derive(Debug, Clone)]
pub enum Binding {
    Event { endpoint: String },
    Http { endpoint: String, access_token: String },
    Network { endpoint: String },
}

/// A named component within an application deployment, exposing event,
/// HTTP, and network interfaces. Binding names are always
/// `microservice_name + "." + interface_id` — an invariant enforced at
/// construction time, not by callers.
#[derive(Debug, Clone)]
pub struct Microservice {
    pub name: String,
    event_bindings: HashMap<String, Binding>,
    http_bindings: HashMap<String, Binding>,
    network_bindings: HashMap<String, Binding>,
}

impl Microservice {
    pub fn from_raw(raw: RawMicroservice) -> Self {
        let mut event_bindings = HashMap::new();
        for entry in raw.event_gateway {
            let key = format!("{}.{}", raw.name, entry.event_id);
            event_bindings.insert(
                key,
                Binding::Event {
                    endpoint: entry.endpoint,
                },
            );
        }

        let mut http_bindings = HashMap::new();
        for entry in raw.http_gateway {
            let key = format!("{}.{}", raw.name, entry.http_api_id);
            http_bindings.insert(
                key,
                Binding::Http {
                    endpoint: entry.endpoint,
                    access_token: entry.access_token,
                },
            );
        }

        let mut network_bindings = HashMap::new();
        for entry in raw.network_binding {
            let key = format!("{}.{}", raw.name, entry.network_id);
            network_bindings.insert(
                key,
                Binding::Network {
                    endpoint: entry.endpoint,
                },
            );
        }

        Self {
            name: raw.name,
            event_bindings,
            http_bindings,
            network_bindings,
        }
    }

    /// Looks up `interface` (`microservice.interface_id`) across all
    /// three binding kinds, mirroring `ENSClient.connect`'s lookup
    /// order (event, then HTTP, then network).
    pub fn binding_for(&self, interface: &str) -> Option<&Binding> {
        self.event_bindings
            .get(interface)
            .or_else(|| self.http_bindings.get(interface))
            .or_else(|| self.network_bindings.get(interface))
    }

    pub fn event_bindings(&self) -> &HashMap<String, Binding> {
        &self.event_bindings
    }

    pub fn http_bindings(&self) -> &HashMap<String, Binding> {
        &self.http_bindings
    }

    pub fn network_bindings(&self) -> &HashMap<String, Binding> {
        &self.network_bindings
    }
}
