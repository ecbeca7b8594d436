// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery adapter that logs pushes instead of sending them.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use pushline_core::traits::adapter::PluginAdapter;
use pushline_core::traits::push::PushAdapter;
use pushline_core::types::{AdapterType, Device, HealthStatus, PushResult};
use pushline_core::PushError;

pub struct LoggingPushAdapter {
    valid_push_types: Vec<String>,
}

impl LoggingPushAdapter {
    pub fn new(valid_push_types: Vec<String>) -> Self {
        Self { valid_push_types }
    }
}

#[async_trait]
impl PluginAdapter for LoggingPushAdapter {
    fn name(&self) -> &str {
        "logging"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Push
    }

    async fn health_check(&self) -> Result<HealthStatus, PushError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PushError> {
        Ok(())
    }
}

#[async_trait]
impl PushAdapter for LoggingPushAdapter {
    async fn send(
        &self,
        body: &Value,
        devices: &[Device],
        push_status_id: &str,
    ) -> Result<Vec<PushResult>, PushError> {
        let data = body.get("data").cloned().unwrap_or(Value::Null);
        info!(
            push_status = push_status_id,
            devices = devices.len(),
            data = %data,
            "delivering push"
        );
        Ok(devices.iter().map(PushResult::sent).collect())
    }

    fn valid_push_types(&self) -> Vec<String> {
        self.valid_push_types.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn reports_every_device_as_sent() {
        let adapter = LoggingPushAdapter::new(vec!["ios".into()]);
        let devices = vec![Device::new("a", "ios", "t1"), Device::new("b", "ios", "t2")];
        let results = adapter
            .send(&json!({"data": {"alert": "hi"}}), &devices, "s1")
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.transmitted));
        assert!(logs_contain("delivering push"));
        assert!(logs_contain("devices=2"));
    }
}
