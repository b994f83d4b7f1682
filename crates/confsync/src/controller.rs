//! Per-object synchronization: fetch, decode, render, deliver.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::dest::DestSpec;
use crate::error::{RenderError, Result, StorageError};
use crate::format::Format;
use crate::settings::{ObjectEntry, Settings};

/// Where rendered content ends up.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, content: &str) -> std::result::Result<(), StorageError>;
}

/// Prints rendered content to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stdout;

#[async_trait]
impl Sink for Stdout {
    async fn deliver(&self, content: &str) -> std::result::Result<(), StorageError> {
        let mut out = tokio::io::stdout();
        out.write_all(content.as_bytes())
            .await
            .map_err(StorageError::Stdout)?;
        out.write_all(b"\n").await.map_err(StorageError::Stdout)?;
        out.flush().await.map_err(StorageError::Stdout)
    }
}

/// Overwrites a file with rendered content.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn deliver(&self, content: &str) -> std::result::Result<(), StorageError> {
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|source| StorageError::WriteFile {
                path: self.path.clone(),
                source,
            })
    }
}

/// Binds one backend to one destination.
pub struct Controller {
    key: String,
    src_format: Format,
    backend: Box<dyn Backend>,
    dest: DestSpec,
    interval: Duration,
}

impl Controller {
    /// `interval` falls back to the backend's default when `None`.
    pub fn new(
        key: impl Into<String>,
        src_format: Format,
        backend: Box<dyn Backend>,
        dest: DestSpec,
        interval: Option<Duration>,
    ) -> Self {
        let interval = interval.unwrap_or_else(|| backend.default_interval());
        Self {
            key: key.into(),
            src_format,
            backend,
            dest,
            interval,
        }
    }

    /// Builds the backend and destination described by `entry`.
    pub async fn from_entry(entry: &ObjectEntry) -> Result<Self> {
        let backend = entry.source.backend.build(&entry.source.construct).await?;
        let dest = DestSpec::new(&entry.dest.path, &entry.dest.format)?;

        Ok(Self::new(
            entry.key.clone(),
            entry.source.format,
            backend,
            dest,
            entry.source.interval,
        ))
    }

    /// Builds the controller for the object named `key`.
    pub async fn from_settings(settings: &Settings, key: &str) -> Result<Self> {
        let entry = settings.object(key)?;
        Self::from_entry(&entry).await
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn dest(&self) -> &DestSpec {
        &self.dest
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One-line summary, e.g. `Apply app: LocalBackend(path='a.yaml') (yaml) -> out.json (json)`.
    pub fn describe(&self) -> String {
        format!(
            "Apply {}: {} ({}) -> {}",
            self.key, self.backend, self.src_format, self.dest
        )
    }

    /// Decodes a raw backend value and renders it for the destination.
    pub fn render(&self, raw: &str) -> std::result::Result<String, RenderError> {
        let data = self.src_format.loads(raw)?;
        self.dest.render(&data)
    }

    /// Creates the destination's parent directory.
    pub async fn prepare_destination(&self) -> std::result::Result<(), StorageError> {
        prepare_parent(self.dest.path()).await
    }

    /// Fetches once and delivers to `sink`.
    pub async fn get(&self, sink: &dyn Sink) -> Result<()> {
        let raw = self.backend.get().await?;
        let content = self.render(&raw)?;
        sink.deliver(&content).await?;
        Ok(())
    }

    /// Fetches once and overwrites the destination file.
    pub async fn write(&self) -> Result<()> {
        self.get(&FileSink::new(self.dest.path())).await?;
        info!(key = %self.key, path = %self.dest.path().display(), "wrote destination");
        Ok(())
    }

    /// Delivers to `sink` every time the source changes, until cancelled.
    ///
    /// Each value is fully rendered and delivered before the backend is
    /// polled again.
    pub async fn watch_get(&self, sink: &dyn Sink, cancel: &CancellationToken) -> Result<()> {
        let mut changes = self.backend.poll(self.interval);
        info!(
            key = %self.key,
            interval_secs = self.interval.as_secs_f64(),
            "watching for changes"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(key = %self.key, "watch cancelled");
                    return Ok(());
                }
                next = changes.next() => next,
            };

            let raw = match next {
                Some(raw) => raw?,
                None => return Ok(()),
            };
            let content = self.render(&raw)?;
            sink.deliver(&content).await?;
            debug!(key = %self.key, "delivered update");
        }
    }

    /// Like [`watch_get`](Self::watch_get), writing to the destination file.
    pub async fn watch_write(&self, cancel: &CancellationToken) -> Result<()> {
        self.watch_get(&FileSink::new(self.dest.path()), cancel).await
    }
}

async fn prepare_parent(path: &Path) -> std::result::Result<(), StorageError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            }),
        _ => Ok(()),
    }
}
