// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Pushline push pipeline.

use thiserror::Error;

/// The primary error type used across all Pushline adapter traits and core operations.
#[derive(Debug, Error)]
pub enum PushError {
    /// Configuration errors (unknown adapter, zero batch size).
    #[error("configuration error: {0}")]
    Config(String),

    /// Requested adapter was not found in the registry.
    #[error("adapter not found: {adapter_type}/{name}")]
    AdapterNotFound { adapter_type: String, name: String },

    /// Message bus errors (publish failure, closed hub).
    #[error("message bus error: {message}")]
    Bus {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Device query failures, including malformed executor responses.
    #[error("query error: {0}")]
    Query(String),

    /// Delivery adapter errors (transport failure, rejected payload).
    #[error("push adapter error: {message}")]
    Adapter {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Push status tracking errors.
    #[error("push status error: {0}")]
    Status(String),

    /// The push request targets a device type no adapter supports.
    #[error("push misconfigured: {0}")]
    PushMisconfigured(String),

    /// A work item referenced an application id that cannot be resolved.
    #[error("unknown application: {0}")]
    UnknownApplication(String),

    /// Work item (de)serialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PushError {
    /// Convenience constructor for bus errors without an underlying source.
    pub fn bus(message: impl Into<String>) -> Self {
        PushError::Bus {
            message: message.into(),
            source: None,
        }
    }

    /// Convenience constructor for adapter errors without an underlying source.
    pub fn adapter(message: impl Into<String>) -> Self {
        PushError::Adapter {
            message: message.into(),
            source: None,
        }
    }
}
