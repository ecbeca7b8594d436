// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pushline simulate`: run one push through the whole pipeline in-process.
//!
//! Generates a device table, wires a queue and a worker to the configured
//! bus, and delivers through [`LoggingPushAdapter`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::Value;
use tracing::{info, warn};

use pushline_bus::{create_publisher, create_subscriber, BusRegistry};
use pushline_config::PushlineConfig;
use pushline_core::{AppConfig, Auth, Device, PushAdapter, PushError, Where};
use pushline_push::utils::validate_push_type;
use pushline_push::{
    MemoryDeviceStore, MemoryStatusStore, PushQueue, PushState, PushStatusSnapshot, PushWorker,
    StaticAppResolver, WorkerDeps,
};

use crate::logging_adapter::LoggingPushAdapter;

const LOCALES: [Option<&str>; 4] = [Some("en-US"), Some("fr-FR"), Some("de-DE"), None];

/// Inputs of one simulated push.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub devices: usize,
    pub payload: Value,
    pub where_: Where,
    pub timeout: Duration,
}

/// A synthetic device table alternating iOS and Android devices.
///
/// iOS devices carry badges `0..4`; locales cycle through a fixed list.
pub fn generate_devices(count: usize) -> Vec<Device> {
    let epoch = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_else(Utc::now);
    (0..count)
        .map(|i| {
            let device_type = if i % 2 == 0 { "ios" } else { "android" };
            let mut device = Device::new(format!("device-{i:05}"), device_type, format!("token-{i:05}"))
                .with_created_at(epoch + chrono::Duration::seconds(i as i64));
            if device_type == "ios" {
                device = device.with_badge((i % 4) as i64);
            }
            if let Some(locale) = LOCALES[i % LOCALES.len()] {
                device = device.with_locale(locale);
            }
            device
        })
        .collect()
}

/// Parse a `--where` argument into a constraint map.
pub fn parse_where(raw: &str) -> Result<Where, PushError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(PushError::Config(format!(
            "where must be a JSON object, got {other}"
        ))),
    }
}

/// Run the push and return the final status once every targeted device was
/// handled or the timeout elapsed.
pub async fn simulate(
    config: &PushlineConfig,
    options: SimulateOptions,
) -> Result<PushStatusSnapshot, PushError> {
    let app = AppConfig::new(config.service.application_id.clone());
    let adapter = Arc::new(LoggingPushAdapter::new(vec![
        "ios".to_string(),
        "android".to_string(),
    ]));
    validate_push_type(&options.where_, &adapter.valid_push_types())?;

    let registry = BusRegistry::new();
    let devices = Arc::new(MemoryDeviceStore::with_devices(generate_devices(
        options.devices,
    )));
    let statuses = Arc::new(MemoryStatusStore::new());

    let publisher = create_publisher(&registry, &config.bus)?;
    let queue = PushQueue::from_config(&config.queue, publisher, devices.clone())?;

    let deps = WorkerDeps {
        apps: Arc::new(StaticAppResolver::single(app.application_id.clone())),
        devices,
        statuses: statuses.clone(),
    };
    let subscriber = create_subscriber(&registry, &config.bus)?;
    let worker = Arc::new(PushWorker::from_config(
        &config.worker,
        adapter,
        subscriber,
        deps,
    )?);
    let dispatch = Arc::clone(&worker).start();

    let object_id = uuid::Uuid::new_v4().to_string();
    let status = statuses.get(&app, &object_id);
    queue
        .enqueue(
            &options.payload,
            &options.where_,
            &app,
            &Auth::Master,
            status.as_ref(),
        )
        .await?;

    let settled = tokio::time::timeout(options.timeout, async {
        while !matches!(status.state(), PushState::Succeeded | PushState::Failed) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if settled.is_err() {
        warn!(
            push_status = %object_id,
            remaining = status.remaining(),
            "push did not settle before timeout"
        );
    }

    worker.close();
    dispatch
        .await
        .map_err(|e| PushError::Internal(format!("dispatch task failed: {e}")))?;

    let snapshot = status.snapshot();
    info!(
        push_status = %object_id,
        state = %snapshot.state,
        sent = snapshot.num_sent,
        failed = snapshot.num_failed,
        "simulation finished"
    );
    Ok(snapshot)
}
