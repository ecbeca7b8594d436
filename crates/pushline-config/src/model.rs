// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Pushline push pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use pushline_core::types::{DEFAULT_BATCH_SIZE, DEFAULT_PUSH_CHANNEL};
use pushline_core::BusOptions;
use serde::{Deserialize, Serialize};

/// Top-level Pushline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PushlineConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Producer settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Consumer settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Message bus backend selection.
    #[serde(default)]
    pub bus: BusConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Application id stamped on every work item.
    #[serde(default = "default_application_id")]
    pub application_id: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            application_id: default_application_id(),
            log_level: default_log_level(),
        }
    }
}

fn default_application_id() -> String {
    "pushline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Push queue (producer) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Channel work items are published on.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Maximum number of devices per work item.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_channel() -> String {
    DEFAULT_PUSH_CHANNEL.to_string()
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

/// Push worker (consumer) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Channel the worker subscribes to. Should match `queue.channel`.
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
        }
    }
}

/// Message bus backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Registered adapter name. `None` selects the in-process backend.
    #[serde(default)]
    pub adapter: Option<String>,

    /// Per-subscriber backlog that triggers a warning in backends that queue locally.
    /// Messages past it are still queued.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Backend-specific settings such as a connection URL.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            queue_capacity: default_queue_capacity(),
            options: BTreeMap::new(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1024
}

impl BusConfig {
    /// Options handed to the resolved adapter's publisher/subscriber constructors.
    pub fn bus_options(&self) -> BusOptions {
        let options = self
            .options
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect::<serde_json::Map<_, _>>();
        BusOptions {
            queue_capacity: self.queue_capacity,
            options: serde_json::Value::Object(options),
        }
    }
}
