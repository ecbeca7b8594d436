// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory device table and tenant resolver.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use pushline_core::types::INSTALLATION_CLASS;
use pushline_core::{
    AppConfig, AppResolver, Auth, Device, DeviceStore, FindOptions, FindResponse, PushError, Where,
};

/// A device table held in memory.
///
/// Serves only the installation class. Supports equality constraints and
/// the `$in`, `$nin`, `$ne`, `$eq` and `$exists` operators on any column,
/// including custom columns kept in [`Device::extra`]. The store is shared
/// by every application id.
///
/// Each device's JSON row is built once on insert and reused by every query.
#[derive(Debug, Default)]
pub struct MemoryDeviceStore {
    devices: RwLock<Vec<StoredDevice>>,
}

#[derive(Debug)]
struct StoredDevice {
    device: Device,
    row: Value,
}

impl StoredDevice {
    fn new(device: Device) -> Self {
        // Device columns are string-keyed JSON values, so this cannot fail.
        let row = serde_json::to_value(&device).unwrap_or(Value::Null);
        Self { device, row }
    }
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        Self {
            devices: RwLock::new(devices.into_iter().map(StoredDevice::new).collect()),
        }
    }

    /// Add a device, replacing any existing device with the same object id.
    pub fn insert(&self, device: Device) {
        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());
        devices.retain(|d| d.device.object_id != device.object_id);
        devices.push(StoredDevice::new(device));
    }

    /// Remove a device by object id. Returns whether it existed.
    pub fn remove(&self, object_id: &str) -> bool {
        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());
        let before = devices.len();
        devices.retain(|d| d.device.object_id != object_id);
        devices.len() != before
    }

    pub fn len(&self) -> usize {
        self.devices.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn find(
        &self,
        _config: &AppConfig,
        _auth: &Auth,
        class_name: &str,
        where_: &Where,
        options: &FindOptions,
    ) -> Result<FindResponse, PushError> {
        if class_name != INSTALLATION_CLASS {
            return Err(PushError::Query(format!("unknown class: {class_name}")));
        }

        let devices = self.devices.read().unwrap_or_else(|e| e.into_inner());
        let mut rows = Vec::new();
        for stored in devices.iter() {
            if matches_where(&stored.row, where_)? {
                rows.push(stored);
            }
        }
        let count = options.count.then_some(rows.len() as u64);

        let fields: Vec<&str> = options
            .order
            .as_deref()
            .map(|order| {
                order
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| {
            fields
                .iter()
                .map(|field| compare_field(field, a, b))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.device.object_id.cmp(&b.device.object_id))
        });

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map_or(usize::MAX, |l| l as usize);
        let results = rows
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|stored| stored.device.clone())
            .collect();

        Ok(FindResponse {
            results: Some(results),
            count,
        })
    }
}

fn matches_where(row: &Value, where_: &Where) -> Result<bool, PushError> {
    for (key, constraint) in where_ {
        let field = row.get(key).filter(|v| !v.is_null());
        if !matches_constraint(field, constraint)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_constraint(field: Option<&Value>, constraint: &Value) -> Result<bool, PushError> {
    let operators = match constraint {
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => map,
        other => return Ok(field.is_some_and(|f| values_equal(f, other))),
    };

    for (op, operand) in operators {
        let ok = match op.as_str() {
            "$exists" => {
                let wanted = operand.as_bool().ok_or_else(|| {
                    PushError::Query("$exists expects a boolean".to_string())
                })?;
                field.is_some() == wanted
            }
            "$eq" => field.is_some_and(|f| values_equal(f, operand)),
            "$ne" => !field.is_some_and(|f| values_equal(f, operand)),
            "$in" => {
                let list = as_list(op, operand)?;
                field.is_some_and(|f| list.iter().any(|v| values_equal(f, v)))
            }
            "$nin" => {
                let list = as_list(op, operand)?;
                !field.is_some_and(|f| list.iter().any(|v| values_equal(f, v)))
            }
            other => return Err(PushError::Query(format!("unsupported operator: {other}"))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn as_list<'a>(op: &str, operand: &'a Value) -> Result<&'a Vec<Value>, PushError> {
    operand
        .as_array()
        .ok_or_else(|| PushError::Query(format!("{op} expects an array")))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_field(field: &str, a: &StoredDevice, b: &StoredDevice) -> Ordering {
    if field == "createdAt" {
        return a.device.created_at.cmp(&b.device.created_at);
    }
    compare_values(
        a.row.get(field).filter(|v| !v.is_null()),
        b.row.get(field).filter(|v| !v.is_null()),
    )
}

/// Ascending order with missing values first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => type_rank(x).cmp(&type_rank(y)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Resolves a fixed set of application ids.
#[derive(Debug, Clone, Default)]
pub struct StaticAppResolver {
    apps: HashMap<String, AppConfig>,
}

impl StaticAppResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver knowing a single application.
    pub fn single(application_id: impl Into<String>) -> Self {
        Self::new().with_app(AppConfig::new(application_id))
    }

    pub fn with_app(mut self, config: AppConfig) -> Self {
        self.apps.insert(config.application_id.clone(), config);
        self
    }
}

impl AppResolver for StaticAppResolver {
    fn resolve(&self, application_id: &str) -> Result<AppConfig, PushError> {
        self.apps
            .get(application_id)
            .cloned()
            .ok_or_else(|| PushError::UnknownApplication(application_id.to_string()))
    }
}
