//! Use a local file as the configuration source.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::error::{BackendError, Result};
use crate::backend::{Backend, ChangeStream};
use crate::error::ConfigError;
use crate::settings::Params;

/// Debounce window used when the settings do not set an interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Shortest debounce window handed to the watcher.
const MIN_DEBOUNCE: Duration = Duration::from_millis(50);

/// Reads configuration from a file on disk and watches it for changes.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    path: PathBuf,
}

impl LocalBackend {
    /// Creates the backend. A missing file is not an error until it is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !path.is_file() {
            warn!(path = %path.display(), "could not read file");
        }
        Self { path }
    }

    pub fn from_params(params: &Params) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(params.require_str("path")?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for LocalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalBackend(path='{}')", self.path.display())
    }
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Like [`read_file`], but a missing file reads as `None`.
async fn read_if_present(path: &Path) -> Result<Option<String>> {
    match read_file(path).await {
        Ok(content) => Ok(Some(content)),
        Err(BackendError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Directory to watch for changes to `path`.
fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

type EventReceiver = mpsc::UnboundedReceiver<DebounceEventResult>;

/// Watches the parent directory of `path`, forwarding debounced events.
fn start_watcher(
    path: &Path,
    debounce: Duration,
) -> Result<(Debouncer<RecommendedWatcher>, EventReceiver)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut debouncer = new_debouncer(debounce.max(MIN_DEBOUNCE), move |res| {
        let _ = tx.send(res);
    })
    .map_err(|e| BackendError::Watch(e.to_string()))?;

    let dir = watch_dir(path);
    debouncer
        .watcher()
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|e| BackendError::Watch(format!("{}: {}", dir.display(), e)))?;

    debug!(dir = %dir.display(), "watching for changes");
    Ok((debouncer, rx))
}

struct Watching {
    path: PathBuf,
    // Dropping the debouncer stops the watch.
    _debouncer: Debouncer<RecommendedWatcher>,
    events: EventReceiver,
    last: Option<String>,
}

impl Watching {
    async fn next_change(&mut self) -> Result<Option<String>> {
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        while let Some(result) = self.events.recv().await {
            let events = result.map_err(|e| BackendError::Watch(e.to_string()))?;
            let touched = events
                .iter()
                .any(|event| event.path.file_name().map(|n| n.to_os_string()) == file_name);
            if !touched {
                continue;
            }

            info!(path = %self.path.display(), "detected change");
            let Some(content) = read_if_present(&self.path).await? else {
                debug!(path = %self.path.display(), "file removed");
                continue;
            };
            if self.last.as_deref() == Some(content.as_str()) {
                continue;
            }
            self.last = Some(content.clone());
            return Ok(Some(content));
        }

        Ok(None)
    }
}

enum WatchState {
    Start { path: PathBuf, debounce: Duration },
    Watching(Watching),
    Done,
}

#[async_trait]
impl Backend for LocalBackend {
    async fn get(&self) -> Result<String> {
        read_file(&self.path).await
    }

    /// Emits the current content first (when the file exists), then the
    /// content after every debounced change that alters it.
    fn poll(&self, interval: Duration) -> ChangeStream {
        let start = WatchState::Start {
            path: self.path.clone(),
            debounce: interval,
        };

        stream::unfold(start, |state| async move {
            let mut watching = match state {
                WatchState::Start { path, debounce } => {
                    let (debouncer, events) = match start_watcher(&path, debounce) {
                        Ok(watcher) => watcher,
                        Err(e) => return Some((Err(e), WatchState::Done)),
                    };
                    let current = match read_if_present(&path).await {
                        Ok(current) => current,
                        Err(e) => return Some((Err(e), WatchState::Done)),
                    };
                    let watching = Watching {
                        path,
                        _debouncer: debouncer,
                        events,
                        last: current.clone(),
                    };
                    if let Some(content) = current {
                        return Some((Ok(content), WatchState::Watching(watching)));
                    }
                    watching
                }
                WatchState::Watching(watching) => watching,
                WatchState::Done => return None,
            };

            match watching.next_change().await {
                Ok(Some(content)) => Some((Ok(content), WatchState::Watching(watching))),
                Ok(None) => Some((
                    Err(BackendError::Watch("file watcher stopped".to_string())),
                    WatchState::Done,
                )),
                Err(e) => Some((Err(e), WatchState::Done)),
            }
        })
        .boxed()
    }

    fn default_interval(&self) -> Duration {
        DEFAULT_INTERVAL
    }
}
