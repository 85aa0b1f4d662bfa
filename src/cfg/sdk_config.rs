// SPDX-License-Identifier: AGPL-3.0-or-later

//! Loads the SDK configuration file: one `key=value` pair per line,
//! split on the first `=`. Required keys are `DiscoveryURL`,
//! `SdkVersion`, `ApiKey`; `Environment=localhost` switches the client
//! into local workload-tester mode.

use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;

const LOCALHOST_ENVIRONMENT: &str = "localhost";
const LOCALHOST_TESTER_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct SdkConfig {
    pub discovery_url: String,
    pub sdk_version: String,
    pub api_key: String,
    pub environment: Option<String>,
}

impl SdkConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError(format!("failed to read {:?}: {e}", path.as_ref())))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut kv: HashMap<String, String> = HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, value)) = line.split_once('=') else {
                continue;
            };
            kv.insert(name.trim().to_string(), value.trim().to_string());
        }

        let discovery_url = kv
            .remove("DiscoveryURL")
            .ok_or_else(|| ConfigError("Missing DiscoveryURL in mecsdk.conf file".into()))?;
        let sdk_version = kv
            .remove("SdkVersion")
            .ok_or_else(|| ConfigError("Missing SdkVersion in mecsdk.conf file".into()))?;
        let api_key = kv
            .remove("ApiKey")
            .ok_or_else(|| ConfigError("Missing ApiKey in mecsdk.conf file".into()))?;
        let environment = kv.remove("Environment");

        Ok(Self {
            discovery_url,
            sdk_version,
            api_key,
            environment,
        })
    }

    /// True when `Environment=localhost` selects the workload-tester
    /// shortcut instead of real Discovery.
    pub fn is_localhost(&self) -> bool {
        self.environment.as_deref() == Some(LOCALHOST_ENVIRONMENT)
    }

    pub fn localhost_tester_url(&self) -> &'static str {
        LOCALHOST_TESTER_URL
    }
}
