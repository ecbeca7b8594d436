// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the queue, the worker, and adapter traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Default channel shared by the producer and consumers.
pub const DEFAULT_PUSH_CHANNEL: &str = "parse-server-push";

/// Default number of devices per work item.
pub const DEFAULT_BATCH_SIZE: u64 = 100;

/// Class name of the device table.
pub const INSTALLATION_CLASS: &str = "_Installation";

/// A device-query constraint map, e.g. `{"deviceType": {"$in": ["ios"]}}`.
pub type Where = Map<String, Value>;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter in a registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    MessageBus,
    Push,
}

/// Tenant configuration resolved from an application id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub application_id: String,
}

impl AppConfig {
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
        }
    }
}

/// Caller identity handed to the device-query executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// Privileged context used by workers.
    Master,
    /// A regular authenticated user.
    User(String),
    /// No session at all.
    Anonymous,
}

impl Auth {
    pub fn is_master(&self) -> bool {
        matches!(self, Auth::Master)
    }
}

/// A registered endpoint capable of receiving pushes.
///
/// Only the fields the pipeline reads are typed; everything else a device
/// table stores is kept in `extra` so constraints on custom columns still match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub object_id: String,
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale_identifier: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    /// Build a device with a token and no badge or locale.
    pub fn new(
        object_id: impl Into<String>,
        device_type: impl Into<String>,
        device_token: impl Into<String>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            device_type: device_type.into(),
            device_token: Some(device_token.into()),
            badge: None,
            locale_identifier: None,
            created_at: Utc::now(),
            extra: Map::new(),
        }
    }

    pub fn with_badge(mut self, badge: i64) -> Self {
        self.badge = Some(badge);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale_identifier = Some(locale.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// The subset of fields echoed back in a [`PushResult`].
    pub fn as_ref_entry(&self) -> DeviceRef {
        DeviceRef {
            device_type: self.device_type.clone(),
            device_token: self.device_token.clone(),
        }
    }
}

/// Device identity carried in a delivery result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRef {
    pub device_type: String,
    #[serde(default)]
    pub device_token: Option<String>,
}

/// Outcome of delivering one payload to one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResult {
    pub device: DeviceRef,
    pub transmitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl PushResult {
    pub fn sent(device: &Device) -> Self {
        Self {
            device: device.as_ref_entry(),
            transmitted: true,
            response: None,
        }
    }

    pub fn failed(device: &Device, error: impl Into<String>) -> Self {
        Self {
            device: device.as_ref_entry(),
            transmitted: false,
            response: Some(serde_json::json!({ "error": error.into() })),
        }
    }

    /// Transport error string reported by the adapter, if any.
    pub fn error(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.get("error"))
            .and_then(Value::as_str)
    }
}

/// A page descriptor: which slice of the matching device set a work item covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(rename = "where")]
    pub where_: Where,
    pub limit: u64,
    pub skip: u64,
    pub order: String,
}

/// Reference to a push status record by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushStatusRef {
    pub object_id: String,
}

/// The unit of distribution placed on the message bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub body: Value,
    pub query: PageQuery,
    pub push_status: PushStatusRef,
    pub application_id: String,
}

/// Options for a device-table query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    /// Comma-separated ascending sort fields, e.g. `"badge,createdAt"`.
    pub order: Option<String>,
    pub count: bool,
}

impl FindOptions {
    /// Count-only query: no rows, just the total.
    pub fn count_only() -> Self {
        Self {
            limit: Some(0),
            skip: None,
            order: None,
            count: true,
        }
    }

    /// Page query matching a work item's descriptor.
    pub fn page(limit: u64, skip: u64, order: impl Into<String>) -> Self {
        Self {
            limit: Some(limit),
            skip: Some(skip),
            order: Some(order.into()),
            count: false,
        }
    }
}

/// Response of a device-table query.
///
/// `results` is `None` when the executor returned no results key at all,
/// which callers treat as a malformed response rather than an empty page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResponse {
    pub results: Option<Vec<Device>>,
    pub count: Option<u64>,
}

/// Options handed to a message-bus adapter when creating publishers/subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct BusOptions {
    /// Per-subscriber backlog at which backends that buffer locally start warning.
    pub queue_capacity: usize,
    /// Backend-specific settings (connection URL, etc.).
    pub options: Value,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            options: Value::Null,
        }
    }
}

/// A message received from a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
}
