//! Keep local configuration files in sync with remote configuration services.
//!
//! A settings file names configuration objects. Each object pairs a source,
//! a [`Backend`] plus the [`Format`] its raw content is decoded with, with a
//! destination ([`DestSpec`]) that renders the decoded value through a
//! serializer or a template. A [`Controller`] runs that pipeline for one
//! object, once or for every change, and the [`WatchSupervisor`] keeps a
//! group of controllers running until one fails or the caller cancels.
//!
//! Backends:
//!
//! - [`AppConfigBackend`]: AWS AppConfig long-poll sessions.
//! - [`SecretsManagerBackend`]: an AWS Secrets Manager secret.
//! - [`LocalBackend`]: a file on disk, watched for changes.

pub mod backend;
pub mod controller;
pub mod dest;
pub mod error;
pub mod format;
pub mod logging;
pub mod settings;
pub mod supervisor;

pub use backend::{
    AppConfigBackend, Backend, BackendError, BackendKind, ChangeStream, LocalBackend,
    SecretsManagerBackend,
};
pub use controller::{Controller, FileSink, Sink, Stdout};
pub use dest::{CompiledTemplate, DestFormat, DestSpec};
pub use error::{ConfigError, RenderError, Result, StorageError, SyncError};
pub use format::Format;
pub use settings::{resolve_settings_path, ObjectEntry, Settings};
pub use supervisor::WatchSupervisor;
