// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Miette diagnostics for configuration errors.
//!
//! Every diagnostic names the dotted key it concerns (`queue.batch_size`).
//! When that key can be found in one of the TOML files that were loaded, the
//! diagnostic also carries a labelled span into the file.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::path::Path;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Keys accepted in each table of `pushline.toml`. `""` is the top level.
pub const SCHEMA: &[(&str, &[&str])] = &[
    ("", &["service", "queue", "worker", "bus"]),
    ("service", &["application_id", "log_level"]),
    ("queue", &["channel", "batch_size"]),
    ("worker", &["channel"]),
    ("bus", &["adapter", "queue_capacity", "options"]),
];

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Keys accepted in `section`, empty for free-form tables such as `bus.options`.
pub fn section_keys(section: &str) -> &'static [&'static str] {
    SCHEMA
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
        .unwrap_or(&[])
}

/// The section other than `section` that accepts `key`, if exactly spelled.
fn home_section(section: &str, key: &str) -> Option<&'static str> {
    SCHEMA
        .iter()
        .find(|(name, keys)| *name != section && !name.is_empty() && keys.contains(&key))
        .map(|(name, _)| *name)
}

/// Closest valid key to `unknown`, if any is similar enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

fn dotted(section: &str, key: &str) -> String {
    if section.is_empty() {
        key.to_string()
    } else {
        format!("{section}.{key}")
    }
}

/// A TOML document the configuration was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a file, naming it by its canonical path. `None` if unreadable.
    pub fn read(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        let name = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Some(Self::new(name.display().to_string(), content))
    }

    /// Span of `key` inside the `[section]` table, or at the top level when
    /// `section` is empty. A key that is itself a table matches its header.
    pub fn locate(&self, section: &str, key: &str) -> Option<SourceSpan> {
        let table = dotted(section, key);
        let mut current = String::new();
        let mut offset = 0;

        for line in self.content.split_inclusive('\n') {
            let body = line.trim_start();
            let indent = line.len() - body.len();

            if let Some(header) = body.trim_end().strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                current = header.trim().to_string();
                if current == table {
                    let name_at = indent + 1 + (header.len() - header.trim_start().len());
                    return Some(SourceSpan::new((offset + name_at).into(), table.len()));
                }
            } else if current == section {
                if let Some((name, _)) = body.split_once('=') {
                    if name.trim_end() == key {
                        return Some(SourceSpan::new((offset + indent).into(), key.len()));
                    }
                }
            }
            offset += line.len();
        }
        None
    }

    fn named(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.content.clone())
    }
}

/// Find `section.key` in `sources`, preferring the file the error came from.
fn label(
    sources: &[SourceFile],
    origin: Option<&str>,
    section: &str,
    key: &str,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    sources
        .iter()
        .filter(|source| origin.is_none_or(|o| o == source.name))
        .find_map(|source| source.locate(section, key).map(|span| (span, source)))
        .map_or((None, None), |(span, source)| (Some(span), Some(source.named())))
}

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key that no section of the config accepts.
    #[error("unknown configuration key `{key}` in {}", table_name(.section))]
    #[diagnostic(
        code(pushline::config::unknown_key),
        help("{}", unknown_key_help(section, key, suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Dotted path of the table holding the key, empty at the top level.
        section: String,
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys the table accepts.
        valid_keys: String,
        #[label("not recognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong TOML type.
    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(pushline::config::invalid_type), help("`{key}` expects {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(pushline::config::missing_key),
        help("set `{key}` in pushline.toml or through PUSHLINE_* variables")
    )]
    MissingKey { key: String },

    /// A well-typed value that fails a semantic check.
    #[error("invalid value for `{key}`: {message}")]
    #[diagnostic(code(pushline::config::invalid_value))]
    Invalid {
        key: String,
        message: String,
        #[label("{message}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(pushline::config::other))]
    Other(String),
}

impl ConfigError {
    /// A semantic error on the dotted key `key`, not yet tied to a source.
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            message: message.into(),
            span: None,
            src: None,
        }
    }

    /// Point an [`ConfigError::Invalid`] at its key in `sources`, when present.
    pub fn locate_in(self, sources: &[SourceFile]) -> Self {
        match self {
            ConfigError::Invalid {
                key,
                message,
                span: None,
                ..
            } => {
                let (section, field) = key.rsplit_once('.').unwrap_or(("", key.as_str()));
                let (span, src) = label(sources, None, section, field);
                ConfigError::Invalid {
                    key,
                    message,
                    span,
                    src,
                }
            }
            other => other,
        }
    }
}

fn table_name(section: &str) -> String {
    if section.is_empty() {
        "the top level".to_string()
    } else {
        format!("[{section}]")
    }
}

fn unknown_key_help(section: &str, key: &str, suggestion: Option<&str>, valid_keys: &str) -> String {
    if let Some(home) = home_section(section, key) {
        return format!("`{key}` belongs in [{home}]");
    }
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {} accepts: {valid_keys}", table_name(section)),
        None => format!("{} accepts: {valid_keys}", table_name(section)),
    }
}

/// Convert every error carried by a `figment::Error` into a diagnostic.
pub fn from_figment(err: figment::Error, sources: &[SourceFile]) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let origin = error
                .metadata
                .as_ref()
                .and_then(|m| m.source.as_ref())
                .and_then(|s| match s {
                    figment::Source::File(path) => Some(path.display().to_string()),
                    _ => None,
                });
            let origin = origin.as_deref();

            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let section = error.path.join(".");
                    let known = section_keys(&section);
                    let valid: &[&str] = if known.is_empty() { *expected } else { known };
                    let (span, src) = label(sources, origin, &section, field);
                    ConfigError::UnknownKey {
                        suggestion: suggest_key(field, valid),
                        valid_keys: valid.join(", "),
                        key: field.clone(),
                        section,
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: dotted(&error.path.join("."), field),
                },
                Kind::InvalidType(found, expected) => {
                    let (section, field) = match error.path.split_last() {
                        Some((field, parents)) => (parents.join("."), field.clone()),
                        None => (String::new(), String::new()),
                    };
                    let (span, src) = label(sources, origin, &section, &field);
                    ConfigError::InvalidType {
                        key: dotted(&section, &field),
                        found: found.to_string(),
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Render diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        if handler.render_report(&mut out, error).is_err() {
            out.push_str(&format!("error: {error}\n"));
        }
    }
    eprint!("{out}");
}
