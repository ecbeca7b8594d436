// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as a non-zero batch size and a known log level.

use crate::diagnostic::ConfigError;
use crate::model::PushlineConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &PushlineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.service.application_id.trim().is_empty() {
        errors.push(ConfigError::invalid("service.application_id", "must not be empty"));
    }

    if !LOG_LEVELS.contains(&config.service.log_level.to_lowercase().as_str()) {
        errors.push(ConfigError::invalid(
            "service.log_level",
            format!(
                "`{}` is not one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config.queue.batch_size == 0 {
        errors.push(ConfigError::invalid("queue.batch_size", "must be greater than 0"));
    }

    for (key, channel) in [
        ("queue.channel", &config.queue.channel),
        ("worker.channel", &config.worker.channel),
    ] {
        if channel.trim().is_empty() {
            errors.push(ConfigError::invalid(key, "must not be empty"));
        }
    }

    if config.bus.queue_capacity == 0 {
        errors.push(ConfigError::invalid("bus.queue_capacity", "must be greater than 0"));
    }

    if config.bus.adapter.as_deref().is_some_and(|a| a.trim().is_empty()) {
        errors.push(ConfigError::invalid(
            "bus.adapter",
            "must not be empty when set; omit it for the in-process bus",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
