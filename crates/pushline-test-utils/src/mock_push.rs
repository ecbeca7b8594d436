// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock delivery adapter for deterministic testing.
//!
//! `MockPushAdapter` implements `PushAdapter` by recording every call,
//! so tests can assert exactly which payload reached which devices.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use pushline_core::traits::adapter::PluginAdapter;
use pushline_core::traits::push::PushAdapter;
use pushline_core::types::{AdapterType, Device, HealthStatus, PushResult};
use pushline_core::PushError;

/// One recorded `send` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSend {
    pub body: Value,
    pub devices: Vec<Device>,
    pub push_status_id: String,
}

impl RecordedSend {
    pub fn object_ids(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.object_id.clone()).collect()
    }
}

/// A push adapter that records sends instead of delivering them.
///
/// Every device is reported as transmitted unless its token was registered
/// with [`MockPushAdapter::reject_token`]. [`MockPushAdapter::fail_with`]
/// makes every call fail outright.
pub struct MockPushAdapter {
    sends: Arc<Mutex<Vec<RecordedSend>>>,
    rejected_tokens: HashMap<String, String>,
    failure: Option<String>,
    valid_push_types: Vec<String>,
}

impl MockPushAdapter {
    /// Create a mock adapter accepting `ios` and `android` devices.
    pub fn new() -> Self {
        Self {
            sends: Arc::new(Mutex::new(Vec::new())),
            rejected_tokens: HashMap::new(),
            failure: None,
            valid_push_types: vec!["ios".to_string(), "android".to_string()],
        }
    }

    /// Report `token` as not transmitted with the given transport error.
    pub fn reject_token(mut self, token: impl Into<String>, error: impl Into<String>) -> Self {
        self.rejected_tokens.insert(token.into(), error.into());
        self
    }

    /// Fail every call with an adapter error.
    pub fn fail_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn with_valid_push_types(mut self, types: &[&str]) -> Self {
        self.valid_push_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    /// All recorded sends, in call order.
    pub async fn sends(&self) -> Vec<RecordedSend> {
        self.sends.lock().await.clone()
    }

    /// Total number of devices handed to the adapter.
    pub async fn delivered_count(&self) -> usize {
        self.sends.lock().await.iter().map(|s| s.devices.len()).sum()
    }
}

impl Default for MockPushAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockPushAdapter {
    fn name(&self) -> &str {
        "mock-push"
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
impl PushAdapter for MockPushAdapter {
    async fn send(
        &self,
        body: &Value,
        devices: &[Device],
        push_status_id: &str,
    ) -> Result<Vec<PushResult>, PushError> {
        self.sends.lock().await.push(RecordedSend {
            body: body.clone(),
            devices: devices.to_vec(),
            push_status_id: push_status_id.to_string(),
        });

        if let Some(message) = &self.failure {
            return Err(PushError::adapter(message.clone()));
        }

        Ok(devices
            .iter()
            .map(|device| {
                let rejection = device
                    .device_token
                    .as_ref()
                    .and_then(|t| self.rejected_tokens.get(t));
                match rejection {
                    Some(error) => PushResult::failed(device, error.clone()),
                    None => PushResult::sent(device),
                }
            })
            .collect())
    }

    fn valid_push_types(&self) -> Vec<String> {
        self.valid_push_types.clone()
    }
}
