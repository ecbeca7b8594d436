// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push batching and delivery.
//!
//! [`PushQueue`] turns a push request into paginated work items on the
//! message bus; [`PushWorker`] consumes them and calls the delivery adapter.
//! The in-memory stores are reference implementations of the collaborator
//! traits, used by tests and the `simulate` command.

pub mod queue;
pub mod status;
pub mod store;
pub mod utils;
pub mod worker;

pub use queue::PushQueue;
pub use status::{MemoryPushStatus, MemoryStatusStore, PushState, PushStatusSnapshot};
pub use store::{MemoryDeviceStore, StaticAppResolver};
pub use worker::{BadgeGroup, PushWorker, WorkerDeps};
