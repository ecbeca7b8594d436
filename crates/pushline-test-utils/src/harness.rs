// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `TestHarness` wires a `PushQueue` and a running `PushWorker` to an
//! in-process bus, in-memory device and status stores, and a
//! [`MockPushAdapter`]. Provides `push()` to drive the full pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use pushline_bus::{create_publisher, create_subscriber, BusRegistry};
use pushline_config::PushlineConfig;
use pushline_core::types::DEFAULT_BATCH_SIZE;
use pushline_core::{AppConfig, Auth, Device, PushAdapter, PushError, Where};
use pushline_push::utils::validate_push_type;
use pushline_push::{
    MemoryDeviceStore, MemoryPushStatus, MemoryStatusStore, PushQueue, PushWorker,
    StaticAppResolver, WorkerDeps,
};

use crate::mock_push::MockPushAdapter;

/// Interval between condition checks in [`TestHarness::wait_for`].
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Builder for creating test pipelines with configurable options.
pub struct TestHarnessBuilder {
    devices: Vec<Device>,
    batch_size: u64,
    adapter: Option<MockPushAdapter>,
    config: PushlineConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            devices: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            adapter: None,
            config: PushlineConfig::default(),
        }
    }

    /// Seed the device table.
    pub fn with_devices(mut self, devices: impl IntoIterator<Item = Device>) -> Self {
        self.devices.extend(devices);
        self
    }

    /// Set the number of devices per work item.
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the subscriber backlog at which the in-process bus starts warning.
    pub fn with_bus_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.bus.queue_capacity = capacity;
        self
    }

    /// Use a pre-configured mock adapter.
    pub fn with_adapter(mut self, adapter: MockPushAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Build the pipeline and start the worker's dispatch loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<TestHarness, PushError> {
        let mut config = self.config;
        config.queue.batch_size = self.batch_size;

        let app = AppConfig::new(config.service.application_id.clone());
        let registry = BusRegistry::new();
        let adapter = Arc::new(self.adapter.unwrap_or_default());
        let devices = Arc::new(MemoryDeviceStore::with_devices(self.devices));
        let statuses = Arc::new(MemoryStatusStore::new());

        let publisher = create_publisher(&registry, &config.bus)?;
        let queue = PushQueue::from_config(&config.queue, publisher, devices.clone())?;

        let deps = WorkerDeps {
            apps: Arc::new(StaticAppResolver::single(app.application_id.clone())),
            devices: devices.clone(),
            statuses: statuses.clone(),
        };
        let subscriber = create_subscriber(&registry, &config.bus)?;
        let worker = Arc::new(PushWorker::from_config(
            &config.worker,
            adapter.clone(),
            subscriber,
            deps,
        )?);
        let dispatch = Arc::clone(&worker).start();

        Ok(TestHarness {
            adapter,
            devices,
            statuses,
            queue,
            worker,
            app,
            config,
            dispatch,
        })
    }
}

/// A complete push pipeline with a mock adapter and in-memory stores.
pub struct TestHarness {
    /// The mock delivery adapter.
    pub adapter: Arc<MockPushAdapter>,
    /// The device table shared by the queue and the worker.
    pub devices: Arc<MemoryDeviceStore>,
    /// Status records, one per push.
    pub statuses: Arc<MemoryStatusStore>,
    pub queue: PushQueue,
    pub worker: Arc<PushWorker>,
    /// The tenant every push is issued for.
    pub app: AppConfig,
    pub config: PushlineConfig,
    dispatch: JoinHandle<()>,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Validate and enqueue a push, returning its status record.
    ///
    /// Returns as soon as every work item is published; delivery happens
    /// in the background worker.
    pub async fn push(&self, body: Value, where_: Where) -> Result<Arc<MemoryPushStatus>, PushError> {
        validate_push_type(&where_, &self.adapter.valid_push_types())?;

        let object_id = uuid::Uuid::new_v4().to_string();
        let status = self.statuses.get(&self.app, &object_id);
        self.queue
            .enqueue(&body, &where_, &self.app, &Auth::Master, status.as_ref())
            .await?;
        Ok(status)
    }

    /// Poll `condition` until it holds or `timeout` elapses. Returns whether it held.
    pub async fn wait_for<F>(&self, timeout: Duration, mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if condition() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait until the adapter has received `count` devices in total.
    pub async fn wait_for_deliveries(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.adapter.delivered_count().await >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Close the worker's subscription and wait for its dispatch loop to end.
    pub async fn shutdown(self) -> Result<(), PushError> {
        self.worker.close();
        self.dispatch
            .await
            .map_err(|e| PushError::Internal(format!("dispatch task failed: {e}")))
    }
}
