// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message bus for distributing push work items.
//!
//! Ships the in-process reference backend ([`InProcessBus`]) and the
//! [`BusRegistry`] that resolves the configured backend once at startup.
//! Production deployments register a durable backend behind the same
//! [`MessageBusAdapter`](pushline_core::MessageBusAdapter) trait.

pub mod memory;
pub mod registry;

pub use memory::{EventHub, InProcessBus, IN_PROCESS_ADAPTER};
pub use registry::{create_publisher, create_subscriber, BusRegistry};
