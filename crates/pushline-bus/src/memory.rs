// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process reference message bus.
//!
//! An [`EventHub`] owns the channel registry for one process. Publishers and
//! subscribers created by the same [`InProcessBus`] share the hub through an
//! `Arc`. Each channel has at most one active subscriber: subscribing to a
//! channel that already has one replaces it.
//!
//! Delivery is ordered per channel, with no durability. A publish is dropped
//! only when the channel has no subscriber or the subscriber is closed. Queues
//! are unbounded; a backlog past `queue_capacity` is reported at `warn`, once
//! each time it crosses the threshold.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pushline_core::traits::adapter::PluginAdapter;
use pushline_core::traits::bus::{MessageBusAdapter, Publisher, Subscriber};
use pushline_core::types::{AdapterType, BusMessage, BusOptions, HealthStatus};
use pushline_core::PushError;

/// Name under which the in-process backend is registered.
pub const IN_PROCESS_ADAPTER: &str = "in-process";

/// Sending half of one subscriber's queue, with its backlog counter.
#[derive(Clone)]
struct Inbox {
    tx: mpsc::UnboundedSender<BusMessage>,
    backlog: Arc<AtomicUsize>,
    warn_at: usize,
}

struct Route {
    subscriber_id: u64,
    inbox: Inbox,
}

/// Channel registry shared by every publisher and subscriber of one bus.
#[derive(Default)]
pub struct EventHub {
    routes: Mutex<HashMap<String, Route>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether the channel currently has an active subscriber.
    pub fn has_subscriber(&self, channel: &str) -> bool {
        self.routes
            .lock()
            .map(|routes| routes.contains_key(channel))
            .unwrap_or(false)
    }

    fn next_subscriber_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Route `channel` to a subscriber, returning the id of the one it replaced.
    fn register(
        &self,
        channel: &str,
        subscriber_id: u64,
        inbox: Inbox,
    ) -> Result<Option<u64>, PushError> {
        let mut routes = self
            .routes
            .lock()
            .map_err(|_| PushError::bus("event hub lock poisoned"))?;
        let previous = routes.insert(
            channel.to_string(),
            Route {
                subscriber_id,
                inbox,
            },
        );
        Ok(previous
            .map(|route| route.subscriber_id)
            .filter(|id| *id != subscriber_id))
    }

    /// Remove the route for `channel` if it belongs to `subscriber_id`.
    fn deregister(&self, channel: &str, subscriber_id: u64) -> Result<bool, PushError> {
        let mut routes = self
            .routes
            .lock()
            .map_err(|_| PushError::bus("event hub lock poisoned"))?;
        let owned = routes
            .get(channel)
            .is_some_and(|route| route.subscriber_id == subscriber_id);
        if owned {
            routes.remove(channel);
        }
        Ok(owned)
    }

    /// Hand a message to the channel's subscriber. Returns whether it was queued.
    fn dispatch(&self, channel: &str, payload: &str) -> Result<bool, PushError> {
        let mut routes = self
            .routes
            .lock()
            .map_err(|_| PushError::bus("event hub lock poisoned"))?;

        let Some(route) = routes.get(channel) else {
            debug!(channel, "no subscriber on channel, dropping message");
            return Ok(false);
        };

        let message = BusMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        };
        let inbox = &route.inbox;
        if inbox.tx.send(message).is_err() {
            debug!(channel, "subscriber closed, removing route");
            routes.remove(channel);
            return Ok(false);
        }
        let backlog = inbox.backlog.fetch_add(1, Ordering::Relaxed) + 1;
        if backlog == inbox.warn_at {
            warn!(channel, backlog, "subscriber backlog reached queue capacity");
        }
        Ok(true)
    }
}

/// The default message-bus backend: a single-node, in-memory hub.
pub struct InProcessBus {
    hub: Arc<EventHub>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::with_hub(EventHub::new())
    }

    /// Build a bus over an existing hub, e.g. to share it across registries.
    pub fn with_hub(hub: Arc<EventHub>) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for InProcessBus {
    fn name(&self) -> &str {
        IN_PROCESS_ADAPTER
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::MessageBus
    }

    async fn health_check(&self) -> Result<HealthStatus, PushError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PushError> {
        Ok(())
    }
}

impl MessageBusAdapter for InProcessBus {
    fn create_publisher(&self, _options: &BusOptions) -> Result<Arc<dyn Publisher>, PushError> {
        Ok(Arc::new(InProcessPublisher {
            hub: Arc::clone(&self.hub),
        }))
    }

    fn create_subscriber(&self, options: &BusOptions) -> Result<Box<dyn Subscriber>, PushError> {
        if options.queue_capacity == 0 {
            return Err(PushError::Config(
                "in-process subscriber queue capacity must be greater than 0".to_string(),
            ));
        }
        Ok(Box::new(InProcessSubscriber::new(
            Arc::clone(&self.hub),
            options.queue_capacity,
        )))
    }
}

/// Publisher half of the in-process bus.
pub struct InProcessPublisher {
    hub: Arc<EventHub>,
}

impl Publisher for InProcessPublisher {
    fn publish(&self, channel: &str, message: &str) -> Result<(), PushError> {
        self.hub.dispatch(channel, message)?;
        Ok(())
    }
}

/// Subscriber half of the in-process bus.
///
/// Messages for every subscribed channel land in one queue, drained through
/// [`Subscriber::recv`].
pub struct InProcessSubscriber {
    id: u64,
    hub: Arc<EventHub>,
    inbox: Inbox,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<BusMessage>>,
    channels: Mutex<HashSet<String>>,
    closed: CancellationToken,
}

impl InProcessSubscriber {
    fn new(hub: Arc<EventHub>, warn_at: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id: hub.next_subscriber_id(),
            hub,
            inbox: Inbox {
                tx,
                backlog: Arc::new(AtomicUsize::new(0)),
                warn_at,
            },
            rx: tokio::sync::Mutex::new(rx),
            channels: Mutex::new(HashSet::new()),
            closed: CancellationToken::new(),
        }
    }

    /// Messages queued but not yet received.
    pub fn backlog(&self) -> usize {
        self.inbox.backlog.load(Ordering::Relaxed)
    }

    fn release_all(&self) {
        let channels = match self.channels.lock() {
            Ok(mut channels) => std::mem::take(&mut *channels),
            Err(_) => return,
        };
        for channel in channels {
            if let Err(e) = self.hub.deregister(&channel, self.id) {
                warn!(channel = %channel, error = %e, "failed to release channel");
            }
        }
    }
}

#[async_trait]
impl Subscriber for InProcessSubscriber {
    fn subscribe(&self, channel: &str) -> Result<(), PushError> {
        if self.closed.is_cancelled() {
            return Err(PushError::bus("subscriber is closed"));
        }
        if let Some(replaced) = self.hub.register(channel, self.id, self.inbox.clone())? {
            debug!(channel, replaced, "replaced previous subscriber on channel");
        }
        self.channels
            .lock()
            .map_err(|_| PushError::bus("subscriber lock poisoned"))?
            .insert(channel.to_string());
        Ok(())
    }

    fn unsubscribe(&self, channel: &str) -> Result<(), PushError> {
        self.hub.deregister(channel, self.id)?;
        self.channels
            .lock()
            .map_err(|_| PushError::bus("subscriber lock poisoned"))?
            .remove(channel);
        Ok(())
    }

    fn close(&self) {
        self.release_all();
        self.closed.cancel();
    }

    async fn recv(&self) -> Option<BusMessage> {
        let mut rx = self.rx.lock().await;
        let msg = tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            msg = rx.recv() => msg,
        };
        if msg.is_some() {
            self.inbox.backlog.fetch_sub(1, Ordering::Relaxed);
        }
        msg
    }
}

impl Drop for InProcessSubscriber {
    fn drop(&mut self) {
        self.release_all();
    }
}
