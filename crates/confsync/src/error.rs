//! Error types for settings, rendering and delivery.
//!
//! Backend failures live in [`crate::backend::error`]; [`SyncError`] wraps
//! all of them for callers that drive whole objects.

use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendError;
use crate::format::Format;

/// Any failure while syncing a configuration object.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A watch in a supervised group failed; `key` names its object.
    #[error("Watch for '{key}' failed: {source}")]
    ObjectFailed {
        key: String,
        #[source]
        source: Box<SyncError>,
    },

    /// A watch task panicked or was aborted.
    #[error("Watch task failed: {0}")]
    TaskFailed(String),
}

/// Problems with the settings file or what it points at.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key is absent; `key` is its dotted path, e.g. `objects.app.dest.path`.
    #[error("Missing key: {key}")]
    MissingKey { key: String },

    /// A key is present but holds the wrong kind of value.
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Unknown backend '{0}' (expected one of: appconfig, local, secretsmanager)")]
    UnknownBackend(String),

    #[error("Unknown format '{0}' (expected one of: raw, json, toml, yaml, yml)")]
    UnknownFormat(String),

    /// No entry under `objects` has this key.
    #[error("No configuration object named '{0}'")]
    UnknownObject(String),

    /// Settings discovery found nothing; `searched` lists every candidate in order.
    #[error("Could not find settings file at any of: {}", display_paths(.searched))]
    SettingsNotFound { searched: Vec<PathBuf> },

    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Failed to read template '{path}': {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template failed to compile.
    #[error("Invalid template '{path}': {source}")]
    TemplateSyntax {
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },
}

/// Failures turning raw content into destination content.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to decode {format} content: {message}")]
    Decode { format: Format, message: String },

    #[error("Failed to encode {format} content: {message}")]
    Encode { format: Format, message: String },

    /// Only a value shaped `{content: <string>}` can be written as `raw`.
    #[error("The raw format requires a string 'content' key")]
    MissingContent,

    #[error("Template rendering failed: {0}")]
    Template(#[from] minijinja::Error),
}

/// Failures delivering rendered content.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to standard output: {0}")]
    Stdout(#[source] std::io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for crate operations.
pub type Result<T> = std::result::Result<T, SyncError>;
