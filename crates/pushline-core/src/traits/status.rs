// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push status tracking traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PushError;
use crate::types::{AppConfig, PushResult};

/// Mutable aggregate tracking one push request across all of its batches.
///
/// Many batches and badge groups report into the same handle concurrently,
/// so `track_sent` must add to counts rather than overwrite them.
#[async_trait]
pub trait PushStatusHandle: Send + Sync {
    fn object_id(&self) -> &str;

    /// Record the number of devices the push is expected to reach.
    async fn set_running(&self, total: u64) -> Result<(), PushError>;

    /// Accumulate the results of one adapter call.
    async fn track_sent(&self, results: &[PushResult]) -> Result<(), PushError>;

    /// Mark the push as finished.
    async fn complete(&self) -> Result<(), PushError>;

    /// Mark the push as failed.
    async fn fail(&self, reason: &str) -> Result<(), PushError>;
}

/// Resolves status handles by push status id.
pub trait StatusStore: Send + Sync {
    fn handle(&self, config: &AppConfig, object_id: &str) -> Arc<dyn PushStatusHandle>;
}
