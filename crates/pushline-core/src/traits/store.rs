// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device-table and tenant lookup traits.

use async_trait::async_trait;

use crate::error::PushError;
use crate::types::{AppConfig, Auth, FindOptions, FindResponse, Where};

/// Executes device-table queries.
///
/// Ordering by a comma-separated field list must be deterministic across
/// repeated calls against an unchanged table; pagination depends on it.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn find(
        &self,
        config: &AppConfig,
        auth: &Auth,
        class_name: &str,
        where_: &Where,
        options: &FindOptions,
    ) -> Result<FindResponse, PushError>;
}

/// Resolves tenant configuration from an application id.
pub trait AppResolver: Send + Sync {
    fn resolve(&self, application_id: &str) -> Result<AppConfig, PushError>;
}
