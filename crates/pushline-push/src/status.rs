// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory push status tracking.
//!
//! [`MemoryPushStatus`] aggregates the results reported by every batch and
//! fan-out group of one push. All counters are atomics so concurrent
//! `track_sent` calls merge without coordination.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use strum::Display;
use tracing::debug;

use pushline_core::{AppConfig, PushError, PushResult, PushStatusHandle, StatusStore};

/// Transport errors that mean the device token is permanently invalid.
pub const REMOVABLE_TOKEN_ERRORS: [&str; 5] = [
    "NotRegistered",
    "InvalidRegistration",
    "Unregistered",
    "BadDeviceToken",
    "messaging/registration-token-not-registered",
];

/// Lifecycle of a push status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PushState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Point-in-time copy of a [`MemoryPushStatus`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushStatusSnapshot {
    pub object_id: String,
    pub state: PushState,
    pub num_sent: u64,
    pub num_failed: u64,
    pub remaining: u64,
    pub sent_per_type: BTreeMap<String, u64>,
    pub failed_per_type: BTreeMap<String, u64>,
    pub devices_to_remove: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status record of a single push.
#[derive(Debug)]
pub struct MemoryPushStatus {
    object_id: String,
    state: Mutex<PushState>,
    error: Mutex<Option<String>>,
    running_calls: AtomicU64,
    expected: AtomicU64,
    remaining: AtomicU64,
    num_sent: AtomicU64,
    num_failed: AtomicU64,
    sent_per_type: DashMap<String, u64>,
    failed_per_type: DashMap<String, u64>,
    devices_to_remove: Mutex<Vec<String>>,
}

impl MemoryPushStatus {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            state: Mutex::new(PushState::Pending),
            error: Mutex::new(None),
            running_calls: AtomicU64::new(0),
            expected: AtomicU64::new(0),
            remaining: AtomicU64::new(0),
            num_sent: AtomicU64::new(0),
            num_failed: AtomicU64::new(0),
            sent_per_type: DashMap::new(),
            failed_per_type: DashMap::new(),
            devices_to_remove: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> PushState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of times `set_running` was called.
    pub fn running_calls(&self) -> u64 {
        self.running_calls.load(Ordering::SeqCst)
    }

    /// Total announced by the last `set_running`.
    pub fn expected(&self) -> u64 {
        self.expected.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn num_sent(&self) -> u64 {
        self.num_sent.load(Ordering::SeqCst)
    }

    pub fn num_failed(&self) -> u64 {
        self.num_failed.load(Ordering::SeqCst)
    }

    pub fn devices_to_remove(&self) -> Vec<String> {
        self.devices_to_remove
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn snapshot(&self) -> PushStatusSnapshot {
        let collect = |map: &DashMap<String, u64>| -> BTreeMap<String, u64> {
            map.iter().map(|e| (e.key().clone(), *e.value())).collect()
        };
        PushStatusSnapshot {
            object_id: self.object_id.clone(),
            state: self.state(),
            num_sent: self.num_sent(),
            num_failed: self.num_failed(),
            remaining: self.remaining(),
            sent_per_type: collect(&self.sent_per_type),
            failed_per_type: collect(&self.failed_per_type),
            devices_to_remove: self.devices_to_remove(),
            error: self.error.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }

    /// Move to `next` unless the record already reached a terminal state.
    fn transition(&self, next: PushState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*state, PushState::Succeeded | PushState::Failed) {
            return;
        }
        *state = next;
    }
}

#[async_trait]
impl PushStatusHandle for MemoryPushStatus {
    fn object_id(&self) -> &str {
        &self.object_id
    }

    async fn set_running(&self, total: u64) -> Result<(), PushError> {
        self.running_calls.fetch_add(1, Ordering::SeqCst);
        self.expected.store(total, Ordering::SeqCst);
        self.remaining.store(total, Ordering::SeqCst);
        self.transition(PushState::Running);
        debug!(push_status = %self.object_id, total, "push status running");
        Ok(())
    }

    async fn track_sent(&self, results: &[PushResult]) -> Result<(), PushError> {
        for result in results {
            let device_type = result.device.device_type.clone();
            if result.transmitted {
                self.num_sent.fetch_add(1, Ordering::SeqCst);
                *self.sent_per_type.entry(device_type).or_insert(0) += 1;
            } else {
                self.num_failed.fetch_add(1, Ordering::SeqCst);
                *self.failed_per_type.entry(device_type).or_insert(0) += 1;

                let removable = result
                    .error()
                    .is_some_and(|e| REMOVABLE_TOKEN_ERRORS.contains(&e));
                if let (true, Some(token)) = (removable, result.device.device_token.as_ref()) {
                    self.devices_to_remove
                        .lock()
                        .map_err(|_| PushError::Status("device removal list poisoned".into()))?
                        .push(token.clone());
                }
            }
        }

        let count = results.len() as u64;
        let previous = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| {
                Some(r.saturating_sub(count))
            })
            .unwrap_or(0);

        let running = self.state() == PushState::Running;
        if running && previous > 0 && previous <= count {
            self.transition(PushState::Succeeded);
            debug!(push_status = %self.object_id, "push status succeeded");
        }
        Ok(())
    }

    async fn complete(&self) -> Result<(), PushError> {
        self.transition(PushState::Succeeded);
        Ok(())
    }

    async fn fail(&self, reason: &str) -> Result<(), PushError> {
        {
            let mut error = self
                .error
                .lock()
                .map_err(|_| PushError::Status("error slot poisoned".into()))?;
            *error = Some(reason.to_string());
        }
        self.transition(PushState::Failed);
        Ok(())
    }
}

/// Keeps one [`MemoryPushStatus`] per `(application id, object id)`.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    statuses: DashMap<(String, String), Arc<MemoryPushStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The concrete record, for inspection.
    pub fn get(&self, config: &AppConfig, object_id: &str) -> Arc<MemoryPushStatus> {
        let key = (config.application_id.clone(), object_id.to_string());
        Arc::clone(
            self.statuses
                .entry(key)
                .or_insert_with(|| Arc::new(MemoryPushStatus::new(object_id)))
                .value(),
        )
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

impl StatusStore for MemoryStatusStore {
    fn handle(&self, config: &AppConfig, object_id: &str) -> Arc<dyn PushStatusHandle> {
        self.get(config, object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushline_core::Device;

    fn ios(token: &str) -> Device {
        Device::new(token, "ios", token)
    }

    #[tokio::test]
    async fn succeeds_once_all_expected_results_arrive() {
        let status = MemoryPushStatus::new("s1");
        status.set_running(3).await.unwrap();
        assert_eq!(status.state(), PushState::Running);

        status
            .track_sent(&[PushResult::sent(&ios("a")), PushResult::sent(&ios("b"))])
            .await
            .unwrap();
        assert_eq!(status.remaining(), 1);
        assert_eq!(status.state(), PushState::Running);

        status.track_sent(&[PushResult::sent(&ios("c"))]).await.unwrap();
        assert_eq!(status.remaining(), 0);
        assert_eq!(status.state(), PushState::Succeeded);
        assert_eq!(status.num_sent(), 3);
    }

    #[tokio::test]
    async fn remaining_saturates_at_zero() {
        let status = MemoryPushStatus::new("s1");
        status.set_running(1).await.unwrap();
        status
            .track_sent(&[PushResult::sent(&ios("a")), PushResult::sent(&ios("b"))])
            .await
            .unwrap();
        assert_eq!(status.remaining(), 0);
        assert_eq!(status.num_sent(), 2);
    }

    #[tokio::test]
    async fn failures_are_counted_per_type() {
        let status = MemoryPushStatus::new("s1");
        status.set_running(2).await.unwrap();
        let android = Device::new("x", "android", "tok-x");
        status
            .track_sent(&[
                PushResult::sent(&ios("a")),
                PushResult::failed(&android, "timeout"),
            ])
            .await
            .unwrap();

        let snapshot = status.snapshot();
        assert_eq!(snapshot.num_failed, 1);
        assert_eq!(snapshot.sent_per_type.get("ios"), Some(&1));
        assert_eq!(snapshot.failed_per_type.get("android"), Some(&1));
        assert!(snapshot.devices_to_remove.is_empty());
    }

    #[tokio::test]
    async fn invalid_tokens_are_collected_for_removal() {
        let status = MemoryPushStatus::new("s1");
        status.set_running(3).await.unwrap();
        status
            .track_sent(&[
                PushResult::failed(&ios("gone"), "BadDeviceToken"),
                PushResult::failed(
                    &Device::new("f", "android", "fcm-gone"),
                    "messaging/registration-token-not-registered",
                ),
                PushResult::failed(&ios("flaky"), "ServiceUnavailable"),
            ])
            .await
            .unwrap();

        assert_eq!(status.devices_to_remove(), vec!["gone", "fcm-gone"]);
    }

    #[tokio::test]
    async fn failed_is_terminal() {
        let status = MemoryPushStatus::new("s1");
        status.set_running(0).await.unwrap();
        status.fail("adapter exploded").await.unwrap();
        status.complete().await.unwrap();

        let snapshot = status.snapshot();
        assert_eq!(snapshot.state, PushState::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("adapter exploded"));
    }

    #[tokio::test]
    async fn complete_on_empty_push() {
        let status = MemoryPushStatus::new("s1");
        status.set_running(0).await.unwrap();
        status.complete().await.unwrap();
        assert_eq!(status.state(), PushState::Succeeded);
        assert_eq!(status.running_calls(), 1);
    }

    #[test]
    fn store_returns_same_record_for_same_key() {
        let store = MemoryStatusStore::new();
        let app = AppConfig::new("app");
        let a = store.get(&app, "s1");
        let b = store.get(&app, "s1");
        assert!(Arc::ptr_eq(&a, &b));

        let other = store.get(&AppConfig::new("other"), "s1");
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn state_displays_lowercase() {
        assert_eq!(PushState::Succeeded.to_string(), "succeeded");
    }
}
