// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery adapter trait for platform push services (APNs, FCM, etc.).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PushError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Device, PushResult};

/// Adapter that hands a payload to a platform push service.
#[async_trait]
pub trait PushAdapter: PluginAdapter {
    /// Deliver `body` to every device. Returns one result per device, in order.
    async fn send(
        &self,
        body: &Value,
        devices: &[Device],
        push_status_id: &str,
    ) -> Result<Vec<PushResult>, PushError>;

    /// Device types this adapter can deliver to.
    fn valid_push_types(&self) -> Vec<String>;
}
