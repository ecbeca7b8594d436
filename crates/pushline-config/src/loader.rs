// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./pushline.toml` > `~/.config/pushline/pushline.toml` > `/etc/pushline/pushline.toml`
//! with environment variable overrides via `PUSHLINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PushlineConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pushline/pushline.toml` (system-wide)
/// 3. `~/.config/pushline/pushline.toml` (user XDG config)
/// 4. `./pushline.toml` (local directory)
/// 5. `PUSHLINE_*` environment variables
pub fn load_config() -> Result<PushlineConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PushlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PushlineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PushlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PushlineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files in merge order, lowest precedence first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/pushline/pushline.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("pushline/pushline.toml"));
    }
    paths.push(PathBuf::from("pushline.toml"));
    paths
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    config_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(PushlineConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Top-level config sections addressable from the environment.
const SECTIONS: [&str; 4] = ["service", "queue", "worker", "bus"];

/// Environment provider mapping `PUSHLINE_<SECTION>_<KEY>` to `section.key`.
///
/// Only the leading section name is split off, so keys may themselves contain
/// underscores or section names: `PUSHLINE_BUS_QUEUE_CAPACITY` becomes
/// `bus.queue_capacity`.
fn env_provider() -> Env {
    Env::prefixed("PUSHLINE_").map(|key| env_key_to_path(key.as_str()).into())
}

fn env_key_to_path(key: &str) -> String {
    SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|rest| format!("{section}.{rest}"))
        })
        .unwrap_or_else(|| key.to_string())
}
