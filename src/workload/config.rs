// SPDX-License-Identifier: AGPL-3.0-or-later

//! Workload configuration and handler registration (spec §4.8,
//! §10 REDESIGN FLAGS).
//!
//! The source resolves `fn: "module.function"` strings via a dynamic
//! import at startup. This crate's embedders instead register a
//! concrete [`EventHandler`] under each interface's name directly; the
//! `fn` field is retained on [`EventEntry`] purely to describe the
//! wire shape of the JSON config, and is not resolved at runtime.
//!
//! The source picked the default handler — the one invoked for
//! notifies on sessions this workload opened outbound — implicitly, as
//! whichever entry happened to be registered first. This crate makes
//! that explicit: an entry may set `"default": true`, and at most one
//! may. When none does, the first entry in config order is used, so
//! configs written against the old implicit behavior keep working.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::workload::channel::InterWorkloadChannel;
use crate::workload::handler::EventHandler;

#[derive(Debug, Clone, Deserialize)]
pub struct EventEntry {
    pub name: String,
    #[serde(rename = "fn")]
    pub handler_name: String,
    #[serde(default)]
    pub default: bool,
}

/// `{id, microservice, events: [{name, fn, default?}]}` as received
/// from the workload's JSON configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    pub id: String,
    pub microservice: String,
    pub events: Vec<EventEntry>,
}

impl WorkloadConfig {
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|e| ConfigError(format!("invalid workload config: {e}")))
    }
}

/// Resolves each `WorkloadConfig` event entry to a handler supplied by
/// the embedder (keyed by `handler_name`), and builds the dispatch
/// table the Reactor actually consults: one entry per
/// `microservice.interface_id`, plus whichever entry is the default
/// registered again under the empty-string key.
pub struct HandlerRegistry<C: InterWorkloadChannel> {
    by_interface: HashMap<String, Arc<dyn EventHandler<C>>>,
}

impl<C: InterWorkloadChannel> HandlerRegistry<C> {
    pub fn build(
        config: &WorkloadConfig,
        handlers: &HashMap<String, Arc<dyn EventHandler<C>>>,
    ) -> Result<Self, ConfigError> {
        let explicit_defaults = config.events.iter().filter(|e| e.default).count();
        if explicit_defaults > 1 {
            return Err(ConfigError(format!(
                "at most one event entry may set default:true, found {explicit_defaults}"
            )));
        }

        let mut by_interface = HashMap::new();
        let mut default: Option<Arc<dyn EventHandler<C>>> = None;

        for entry in &config.events {
            let handler = handlers
                .get(&entry.handler_name)
                .cloned()
                .ok_or_else(|| ConfigError(format!("unknown handler {:?}", entry.handler_name)))?;
            let key = format!("{}.{}", config.microservice, entry.name);
            if entry.default || default.is_none() {
                default = Some(handler.clone());
            }
            by_interface.insert(key, handler);
        }

        if let Some(handler) = default {
            by_interface.insert(String::new(), handler);
        }

        Ok(Self { by_interface })
    }

    pub fn get(&self, interface: &str) -> Option<&Arc<dyn EventHandler<C>>> {
        self.by_interface.get(interface)
    }

    pub fn default_handler(&self) -> Option<&Arc<dyn EventHandler<C>>> {
        self.by_interface.get("")
    }
}
