// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Pushline push pipeline.
//!
//! [`PushlineConfig`] is merged from compiled defaults, the `pushline.toml`
//! files returned by [`loader::config_paths`], and `PUSHLINE_<SECTION>_<KEY>`
//! environment variables. The `load_and_validate*` entry points also run
//! [`validation::validate_config`] and report every problem as a
//! [`ConfigError`] diagnostic, located in the TOML source when possible.

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{render_errors, ConfigError, SourceFile};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::PushlineConfig;

/// Name given to configuration passed as a string.
pub const INLINE_SOURCE: &str = "<inline>";

/// Load from the standard file locations and the environment, then validate.
pub fn load_and_validate() -> Result<PushlineConfig, Vec<ConfigError>> {
    checked(loader::load_config(), || {
        loader::config_paths()
            .iter()
            .filter_map(|path| SourceFile::read(path))
            .collect()
    })
}

/// Load from one file and the environment, then validate.
pub fn load_and_validate_path(path: &Path) -> Result<PushlineConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        SourceFile::read(path).into_iter().collect()
    })
}

/// Load from a TOML string, then validate.
pub fn load_and_validate_str(toml_content: &str) -> Result<PushlineConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![SourceFile::new(INLINE_SOURCE, toml_content)]
    })
}

/// Turn a load result into diagnostics. Sources are only read on failure.
fn checked(
    loaded: Result<PushlineConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<SourceFile>,
) -> Result<PushlineConfig, Vec<ConfigError>> {
    let config = match loaded {
        Ok(config) => config,
        Err(err) => return Err(diagnostic::from_figment(err, &sources())),
    };
    if let Err(errors) = validation::validate_config(&config) {
        let sources = sources();
        return Err(errors.into_iter().map(|e| e.locate_in(&sources)).collect());
    }
    Ok(config)
}
