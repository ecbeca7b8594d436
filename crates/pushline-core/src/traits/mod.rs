// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the pluggable seams of the push pipeline.
//!
//! Adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod bus;
pub mod push;
pub mod status;
pub mod store;

pub use adapter::PluginAdapter;
pub use bus::{MessageBusAdapter, Publisher, Subscriber};
pub use push::PushAdapter;
pub use status::{PushStatusHandle, StatusStore};
pub use store::{AppResolver, DeviceStore};
