// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish/subscribe traits for the message bus.
//!
//! The interface itself defines no delivery guarantee. Callers may only
//! assume that a published message reaches the current subscriber of its
//! channel at most once, in publish order, or not at all.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PushError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{BusMessage, BusOptions};

/// A message-bus backend able to create publishers and subscribers.
pub trait MessageBusAdapter: PluginAdapter {
    /// Create a publisher bound to this backend.
    fn create_publisher(&self, options: &BusOptions) -> Result<Arc<dyn Publisher>, PushError>;

    /// Create a subscriber bound to this backend.
    fn create_subscriber(&self, options: &BusOptions) -> Result<Box<dyn Subscriber>, PushError>;
}

/// Publishes string messages on named channels. Fire-and-forget.
pub trait Publisher: Send + Sync {
    fn publish(&self, channel: &str, message: &str) -> Result<(), PushError>;
}

/// Receives messages from the channels it is subscribed to.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Register interest in a channel.
    fn subscribe(&self, channel: &str) -> Result<(), PushError>;

    /// Remove interest in a channel. Safe to call when not subscribed.
    fn unsubscribe(&self, channel: &str) -> Result<(), PushError>;

    /// Release every channel and make `recv` return `None`.
    fn close(&self);

    /// Wait for the next message. Returns `None` once the subscriber is closed.
    async fn recv(&self) -> Option<BusMessage>;
}
