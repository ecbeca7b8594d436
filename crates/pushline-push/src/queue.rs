// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Producer side of the pipeline.
//!
//! [`PushQueue`] counts the devices a push targets and publishes one
//! [`WorkItem`] per page of `batch_size` devices. It never loads the devices
//! themselves; workers re-run the query for their page.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use pushline_config::model::QueueConfig;
use pushline_core::types::INSTALLATION_CLASS;
use pushline_core::{
    AppConfig, Auth, DeviceStore, FindOptions, PageQuery, PushError, PushStatusHandle,
    PushStatusRef, Publisher, Where, WorkItem,
};

use crate::utils::{apply_device_token_exists, is_push_incrementing};

/// Sort order for pushes that do not touch badges.
pub const DEFAULT_ORDER: &str = "createdAt";

/// Sort order for badge-incrementing pushes, so each page holds runs of equal badges.
pub const BADGE_ORDER: &str = "badge,createdAt";

/// Splits a push into work items and publishes them on the bus.
pub struct PushQueue {
    channel: String,
    batch_size: u64,
    publisher: Arc<dyn Publisher>,
    devices: Arc<dyn DeviceStore>,
}

impl PushQueue {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        devices: Arc<dyn DeviceStore>,
        channel: impl Into<String>,
        batch_size: u64,
    ) -> Result<Self, PushError> {
        if batch_size == 0 {
            return Err(PushError::Config(
                "queue batch_size must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            channel: channel.into(),
            batch_size,
            publisher,
            devices,
        })
    }

    pub fn from_config(
        config: &QueueConfig,
        publisher: Arc<dyn Publisher>,
        devices: Arc<dyn DeviceStore>,
    ) -> Result<Self, PushError> {
        Self::new(publisher, devices, config.channel.clone(), config.batch_size)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Count the targeted devices, mark the push running, and publish one
    /// work item per page in ascending `skip` order.
    ///
    /// A push matching no device is marked complete immediately. Errors from
    /// the count query are returned before the status is touched.
    #[instrument(skip_all, fields(push_status = %push_status.object_id(), channel = %self.channel))]
    pub async fn enqueue(
        &self,
        body: &Value,
        where_: &Where,
        config: &AppConfig,
        auth: &Auth,
        push_status: &dyn PushStatusHandle,
    ) -> Result<(), PushError> {
        let order = if is_push_incrementing(body) {
            BADGE_ORDER
        } else {
            DEFAULT_ORDER
        };
        let where_ = apply_device_token_exists(where_);

        let response = self
            .devices
            .find(
                config,
                auth,
                INSTALLATION_CLASS,
                &where_,
                &FindOptions::count_only(),
            )
            .await?;
        if response.results.is_none() {
            return Err(PushError::Query("no results in query".to_string()));
        }
        let count = response.count.unwrap_or(0);

        push_status.set_running(count).await?;
        if count == 0 {
            debug!("no devices match, completing push");
            return push_status.complete().await;
        }

        let mut skip = 0;
        let mut batches = 0u64;
        while skip < count {
            let item = WorkItem {
                body: body.clone(),
                query: PageQuery {
                    where_: where_.clone(),
                    limit: self.batch_size,
                    skip,
                    order: order.to_string(),
                },
                push_status: PushStatusRef {
                    object_id: push_status.object_id().to_string(),
                },
                application_id: config.application_id.clone(),
            };
            let message = serde_json::to_string(&item)?;
            self.publisher.publish(&self.channel, &message)?;
            debug!(skip, limit = self.batch_size, "work item published");

            skip += self.batch_size;
            batches += 1;
        }

        info!(devices = count, batches, order, "push enqueued");
        Ok(())
    }
}

impl std::fmt::Debug for PushQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushQueue")
            .field("channel", &self.channel)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pushline_core::{Device, FindResponse};
    use serde_json::json;
    use tracing_test::traced_test;

    use crate::status::{MemoryPushStatus, PushState};
    use crate::store::MemoryDeviceStore;

    #[derive(Default)]
    struct CapturingPublisher {
        sent: Mutex<Vec<(String, String)>>,
        fail_after: Option<usize>,
    }

    impl CapturingPublisher {
        fn items(&self) -> Vec<WorkItem> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, m)| serde_json::from_str(m).unwrap())
                .collect()
        }
    }

    impl Publisher for CapturingPublisher {
        fn publish(&self, channel: &str, message: &str) -> Result<(), PushError> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_after.is_some_and(|n| sent.len() >= n) {
                return Err(PushError::bus("broker unavailable"));
            }
            sent.push((channel.to_string(), message.to_string()));
            Ok(())
        }
    }

    /// Returns a canned response for every query.
    struct CannedStore(FindResponse);

    #[async_trait]
    impl DeviceStore for CannedStore {
        async fn find(
            &self,
            _: &AppConfig,
            _: &Auth,
            _: &str,
            _: &Where,
            _: &FindOptions,
        ) -> Result<FindResponse, PushError> {
            Ok(self.0.clone())
        }
    }

    fn store_with(n: usize) -> Arc<MemoryDeviceStore> {
        Arc::new(MemoryDeviceStore::with_devices(
            (0..n).map(|i| Device::new(format!("d{i}"), "ios", format!("t{i}"))),
        ))
    }

    async fn enqueue_with(
        store: Arc<dyn DeviceStore>,
        publisher: Arc<CapturingPublisher>,
        batch_size: u64,
        body: Value,
    ) -> (Result<(), PushError>, MemoryPushStatus) {
        let queue = PushQueue::new(publisher, store, "push", batch_size).unwrap();
        let status = MemoryPushStatus::new("status-1");
        let result = queue
            .enqueue(
                &body,
                &Where::new(),
                &AppConfig::new("app"),
                &Auth::Master,
                &status,
            )
            .await;
        (result, status)
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = PushQueue::new(
            Arc::new(CapturingPublisher::default()),
            store_with(0),
            "push",
            0,
        )
        .unwrap_err();
        assert!(matches!(err, PushError::Config(_)));
    }

    #[tokio::test]
    async fn publishes_one_item_per_page() {
        let publisher = Arc::new(CapturingPublisher::default());
        let (result, status) =
            enqueue_with(store_with(250), publisher.clone(), 100, json!({"data": {"alert": "hi"}}))
                .await;
        result.unwrap();

        let items = publisher.items();
        let skips: Vec<u64> = items.iter().map(|i| i.query.skip).collect();
        assert_eq!(skips, vec![0, 100, 200]);
        assert!(items.iter().all(|i| i.query.limit == 100));
        assert!(items.iter().all(|i| i.query.order == DEFAULT_ORDER));
        assert!(items.iter().all(|i| i.push_status.object_id == "status-1"));
        assert!(items.iter().all(|i| i.application_id == "app"));
        assert_eq!(
            items[0].query.where_["deviceToken"],
            json!({"$exists": true})
        );
        assert!(publisher.sent.lock().unwrap().iter().all(|(c, _)| c == "push"));
        assert_eq!(status.expected(), 250);
        assert_eq!(status.state(), PushState::Running);
    }

    #[tokio::test]
    #[traced_test]
    async fn enqueue_logs_batch_summary() {
        let publisher = Arc::new(CapturingPublisher::default());
        let (result, _) = enqueue_with(store_with(7), publisher, 3, json!({})).await;
        result.unwrap();
        assert!(logs_contain("push enqueued"));
        assert!(logs_contain("batches=3"));
    }

    #[tokio::test]
    async fn incrementing_push_orders_by_badge() {
        let publisher = Arc::new(CapturingPublisher::default());
        let (result, _) = enqueue_with(
            store_with(5),
            publisher.clone(),
            100,
            json!({"data": {"badge": "Increment"}}),
        )
        .await;
        result.unwrap();
        assert_eq!(publisher.items()[0].query.order, BADGE_ORDER);
    }

    #[tokio::test]
    async fn empty_push_completes_without_publishing() {
        let publisher = Arc::new(CapturingPublisher::default());
        let (result, status) =
            enqueue_with(store_with(0), publisher.clone(), 10, json!({"data": {}})).await;
        result.unwrap();
        assert!(publisher.items().is_empty());
        assert_eq!(status.running_calls(), 1);
        assert_eq!(status.state(), PushState::Succeeded);
    }

    #[tokio::test]
    async fn missing_results_is_a_query_error() {
        let publisher = Arc::new(CapturingPublisher::default());
        let store = Arc::new(CannedStore(FindResponse {
            results: None,
            count: Some(5),
        }));
        let (result, status) = enqueue_with(store, publisher.clone(), 10, json!({})).await;
        assert!(matches!(result, Err(PushError::Query(m)) if m == "no results in query"));
        assert_eq!(status.running_calls(), 0);
        assert!(publisher.items().is_empty());
    }

    #[tokio::test]
    async fn missing_count_is_zero() {
        let publisher = Arc::new(CapturingPublisher::default());
        let store = Arc::new(CannedStore(FindResponse {
            results: Some(vec![]),
            count: None,
        }));
        let (result, status) = enqueue_with(store, publisher.clone(), 10, json!({})).await;
        result.unwrap();
        assert_eq!(status.expected(), 0);
        assert!(publisher.items().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_stops_remaining_batches() {
        let publisher = Arc::new(CapturingPublisher {
            fail_after: Some(1),
            ..Default::default()
        });
        let (result, _) = enqueue_with(store_with(30), publisher.clone(), 10, json!({})).await;
        assert!(matches!(result, Err(PushError::Bus { .. })));
        assert_eq!(publisher.items().len(), 1);
    }

    mod batching {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn skips_cover_the_count_exactly(count in 0usize..60, batch in 1u64..15) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let publisher = Arc::new(CapturingPublisher::default());
                let (result, _) = rt.block_on(enqueue_with(
                    store_with(count),
                    publisher.clone(),
                    batch,
                    json!({}),
                ));
                prop_assert!(result.is_ok());

                let skips: Vec<u64> = publisher.items().iter().map(|i| i.query.skip).collect();
                let expected_batches = (count as u64).div_ceil(batch);
                prop_assert_eq!(skips.len() as u64, expected_batches);
                for (i, skip) in skips.iter().enumerate() {
                    prop_assert_eq!(*skip, i as u64 * batch);
                    prop_assert!(*skip < count as u64);
                }
            }
        }
    }
}
