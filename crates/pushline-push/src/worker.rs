// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consumer side of the pipeline.
//!
//! A [`PushWorker`] receives work items from its subscriber, re-runs the
//! device query for the item's page, and hands the devices to the delivery
//! adapter. Locale variants and badge values are fanned out into separate
//! adapter calls so every device receives the payload meant for it.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use pushline_config::model::WorkerConfig;
use pushline_core::types::INSTALLATION_CLASS;
use pushline_core::{
    AppResolver, Auth, Device, DeviceStore, FindOptions, PageQuery, PushAdapter, PushError,
    PushResult, PushStatusHandle, StatusStore, Subscriber, WorkItem,
};

use crate::utils::{
    apply_device_token_exists, bodies_per_locales, get_locales_from_push,
    group_by_locale_identifier, is_push_incrementing,
};

/// The only device type whose payload carries a badge.
const BADGE_DEVICE_TYPE: &str = "ios";

/// Collaborators a worker needs to process a work item.
#[derive(Clone)]
pub struct WorkerDeps {
    pub apps: Arc<dyn AppResolver>,
    pub devices: Arc<dyn DeviceStore>,
    pub statuses: Arc<dyn StatusStore>,
}

/// Badge partition of devices for an incrementing push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BadgeGroup {
    /// Devices whose stored badge is this value.
    Badge(i64),
    /// Devices that do not display badges.
    Unsupported,
}

impl BadgeGroup {
    pub fn of(device: &Device) -> Self {
        if device.device_type == BADGE_DEVICE_TYPE {
            BadgeGroup::Badge(device.badge.unwrap_or(0))
        } else {
            BadgeGroup::Unsupported
        }
    }

    /// The payload for this group: an explicit badge, or none at all.
    pub fn apply(self, body: &Value) -> Value {
        let mut body = body.clone();
        if let Some(data) = body.get_mut("data").and_then(Value::as_object_mut) {
            match self {
                BadgeGroup::Badge(n) => {
                    data.insert("badge".to_string(), json!(n));
                }
                BadgeGroup::Unsupported => {
                    data.remove("badge");
                }
            }
        }
        body
    }
}

/// Partition devices by [`BadgeGroup`].
pub fn group_by_badge(devices: &[Device]) -> BTreeMap<BadgeGroup, Vec<Device>> {
    let mut groups: BTreeMap<BadgeGroup, Vec<Device>> = BTreeMap::new();
    for device in devices {
        groups
            .entry(BadgeGroup::of(device))
            .or_default()
            .push(device.clone());
    }
    groups
}

/// Subscribes to the push channel and delivers each work item it receives.
pub struct PushWorker {
    adapter: Arc<dyn PushAdapter>,
    subscriber: Box<dyn Subscriber>,
    deps: WorkerDeps,
    channel: String,
}

impl PushWorker {
    /// Build a worker and subscribe it to `channel`.
    pub fn new(
        adapter: Arc<dyn PushAdapter>,
        subscriber: Box<dyn Subscriber>,
        deps: WorkerDeps,
        channel: impl Into<String>,
    ) -> Result<Self, PushError> {
        let channel = channel.into();
        subscriber.subscribe(&channel)?;
        debug!(channel = %channel, adapter = adapter.name(), "push worker subscribed");
        Ok(Self {
            adapter,
            subscriber,
            deps,
            channel,
        })
    }

    pub fn from_config(
        config: &WorkerConfig,
        adapter: Arc<dyn PushAdapter>,
        subscriber: Box<dyn Subscriber>,
        deps: WorkerDeps,
    ) -> Result<Self, PushError> {
        Self::new(adapter, subscriber, deps, config.channel.clone())
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Spawn the dispatch loop.
    ///
    /// Every received work item is processed in its own task; the loop does
    /// not wait for it. The loop ends when the subscriber is closed.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = self.subscriber.recv().await {
                let item: WorkItem = match serde_json::from_str(&message.payload) {
                    Ok(item) => item,
                    Err(e) => {
                        warn!(channel = %message.channel, error = %e, "dropping malformed work item");
                        continue;
                    }
                };

                let worker = Arc::clone(&self);
                tokio::spawn(async move {
                    let push_status = item.push_status.object_id.clone();
                    if let Err(e) = worker.run(item).await {
                        error!(push_status = %push_status, error = %e, "work item failed");
                    }
                });
            }
            debug!(channel = %self.channel, "push worker dispatch loop stopped");
        })
    }

    /// Stop receiving new work items. Runs already in flight continue.
    pub fn unsubscribe(&self) -> Result<(), PushError> {
        self.subscriber.unsubscribe(&self.channel)
    }

    /// Release the subscription and end the dispatch loop.
    pub fn close(&self) {
        self.subscriber.close();
    }

    /// Deliver one work item.
    ///
    /// An empty page is not an error: devices may have been removed since
    /// the push was counted.
    #[instrument(skip_all, fields(push_status = %work_item.push_status.object_id, skip = work_item.query.skip))]
    pub async fn run(&self, work_item: WorkItem) -> Result<(), PushError> {
        let config = self.deps.apps.resolve(&work_item.application_id)?;
        let auth = Auth::Master;

        let PageQuery {
            where_,
            limit,
            skip,
            order,
        } = work_item.query;
        let where_ = apply_device_token_exists(&where_);

        let response = self
            .deps
            .devices
            .find(
                &config,
                &auth,
                INSTALLATION_CLASS,
                &where_,
                &FindOptions::page(limit, skip, order),
            )
            .await?;
        let devices = response.results.unwrap_or_default();
        if devices.is_empty() {
            debug!("page is empty, nothing to send");
            return Ok(());
        }

        let push_status = self
            .deps
            .statuses
            .handle(&config, &work_item.push_status.object_id);
        let results = self
            .send_to_adapter(&work_item.body, &devices, push_status.as_ref())
            .await?;
        debug!(devices = devices.len(), results = results.len(), "work item delivered");
        Ok(())
    }

    /// Send `body` to `devices`, splitting by locale and then by badge.
    ///
    /// Groups are sent concurrently. Every group runs to completion; the
    /// first error encountered is returned afterwards.
    pub fn send_to_adapter<'a>(
        &'a self,
        body: &'a Value,
        devices: &'a [Device],
        push_status: &'a dyn PushStatusHandle,
    ) -> BoxFuture<'a, Result<Vec<PushResult>, PushError>> {
        async move {
            let locales = get_locales_from_push(body);
            if !locales.is_empty() {
                let bodies = bodies_per_locales(body, &locales);
                let groups = group_by_locale_identifier(devices, &locales);
                let sends = groups
                    .iter()
                    .filter(|(_, group)| !group.is_empty())
                    .filter_map(|(locale, group)| {
                        bodies
                            .get(locale)
                            .map(|body| self.send_to_adapter(body, group, push_status))
                    });
                return merge_group_results(join_all(sends).await);
            }

            if !is_push_incrementing(body) {
                let results = self
                    .adapter
                    .send(body, devices, push_status.object_id())
                    .await?;
                push_status.track_sent(&results).await?;
                return Ok(results);
            }

            let groups: Vec<(Value, Vec<Device>)> = group_by_badge(devices)
                .into_iter()
                .map(|(group, devices)| (group.apply(body), devices))
                .collect();
            let sends = groups
                .iter()
                .map(|(body, group)| self.send_to_adapter(body, group, push_status));
            merge_group_results(join_all(sends).await)
        }
        .boxed()
    }
}

impl std::fmt::Debug for PushWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushWorker")
            .field("channel", &self.channel)
            .field("adapter", &self.adapter.name())
            .finish_non_exhaustive()
    }
}

fn merge_group_results(
    outcomes: Vec<Result<Vec<PushResult>, PushError>>,
) -> Result<Vec<PushResult>, PushError> {
    let mut results = Vec::new();
    let mut first_error = None;
    for outcome in outcomes {
        match outcome {
            Ok(group) => results.extend(group),
            Err(e) if first_error.is_none() => first_error = Some(e),
            Err(e) => warn!(error = %e, "additional push group failed"),
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(results),
    }
}
