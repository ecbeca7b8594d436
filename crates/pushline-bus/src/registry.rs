// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of message-bus adapters, resolved from configuration.
//!
//! The registry stores adapters keyed by name and always carries an
//! in-process default. `bus.adapter` in the configuration selects an entry;
//! leaving it unset selects the default. Unknown names fail immediately.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use pushline_config::model::BusConfig;
use pushline_core::traits::bus::{MessageBusAdapter, Publisher, Subscriber};
use pushline_core::types::AdapterType;
use pushline_core::PushError;

use crate::memory::InProcessBus;

/// Named message-bus adapters plus the default backend.
pub struct BusRegistry {
    adapters: HashMap<String, Arc<dyn MessageBusAdapter>>,
    default: Arc<dyn MessageBusAdapter>,
}

impl BusRegistry {
    /// Create a registry whose default is a fresh in-process bus.
    pub fn new() -> Self {
        Self::with_default(Arc::new(InProcessBus::new()))
    }

    /// Create a registry with an explicit default adapter.
    ///
    /// The default is also registered under its own name.
    pub fn with_default(default: Arc<dyn MessageBusAdapter>) -> Self {
        let mut adapters = HashMap::new();
        adapters.insert(default.name().to_string(), Arc::clone(&default));
        Self { adapters, default }
    }

    /// Register a pre-built adapter under its `name()`, replacing any previous entry.
    pub fn register(&mut self, adapter: Arc<dyn MessageBusAdapter>) {
        let name = adapter.name().to_string();
        debug!(adapter = %name, "registered message bus adapter");
        self.adapters.insert(name, adapter);
    }

    /// Get an adapter by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn MessageBusAdapter>> {
        self.adapters.get(name)
    }

    /// Registered adapter names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve the adapter selected by `config`.
    pub fn resolve(&self, config: &BusConfig) -> Result<Arc<dyn MessageBusAdapter>, PushError> {
        let adapter = match config.adapter.as_deref() {
            None => Arc::clone(&self.default),
            Some(name) => self
                .adapters
                .get(name)
                .cloned()
                .ok_or_else(|| PushError::AdapterNotFound {
                    adapter_type: AdapterType::MessageBus.to_string(),
                    name: name.to_string(),
                })?,
        };

        if adapter.adapter_type() != AdapterType::MessageBus {
            return Err(PushError::Config(format!(
                "adapter `{}` is a {} adapter, not a message bus",
                adapter.name(),
                adapter.adapter_type()
            )));
        }

        Ok(adapter)
    }
}

impl Default for BusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the configured adapter and create a publisher from it.
pub fn create_publisher(
    registry: &BusRegistry,
    config: &BusConfig,
) -> Result<Arc<dyn Publisher>, PushError> {
    registry
        .resolve(config)?
        .create_publisher(&config.bus_options())
}

/// Resolve the configured adapter and create a subscriber from it.
pub fn create_subscriber(
    registry: &BusRegistry,
    config: &BusConfig,
) -> Result<Box<dyn Subscriber>, PushError> {
    registry
        .resolve(config)?
        .create_subscriber(&config.bus_options())
}
