// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Pushline push pipeline.
//!
//! This crate provides the trait definitions, error type, and common types
//! shared by the message bus, the push queue, and the push worker. Every
//! pluggable collaborator (bus backend, delivery adapter, device table,
//! status tracker) is expressed as a trait here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::PushError;
pub use types::{
    AdapterType, AppConfig, Auth, BusMessage, BusOptions, Device, DeviceRef, FindOptions,
    FindResponse, HealthStatus, PageQuery, PushResult, PushStatusRef, Where, WorkItem,
};

pub use traits::{
    AppResolver, DeviceStore, MessageBusAdapter, PluginAdapter, PushAdapter, PushStatusHandle,
    Publisher, StatusStore, Subscriber,
};
