//! Run many continuous watches as one group.

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::controller::Controller;
use crate::error::{Result, SyncError};

/// Runs the continuous write of every controller concurrently.
///
/// The first watch to fail cancels the rest. [`run`](Self::run) returns only
/// after every watch has finished, with the first failure attributed to its
/// object.
pub struct WatchSupervisor {
    controllers: Vec<Controller>,
}

impl WatchSupervisor {
    pub fn new(controllers: Vec<Controller>) -> Self {
        Self { controllers }
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Watches until every controller stops. Cancelling `cancel` stops them all.
    pub async fn run(self, cancel: &CancellationToken) -> Result<()> {
        let group = cancel.child_token();
        let mut tasks = JoinSet::new();

        for controller in self.controllers {
            let token = group.clone();
            tasks.spawn(async move {
                let result = controller.watch_write(&token).await;
                (controller.key().to_string(), result)
            });
        }
        info!(count = tasks.len(), "started watches");

        let mut first_error: Option<SyncError> = None;
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((key, Ok(()))) => {
                    info!(key = %key, "watch stopped");
                    continue;
                }
                Ok((key, Err(e))) => {
                    error!(key = %key, "watch failed: {}", e);
                    SyncError::ObjectFailed {
                        key,
                        source: Box::new(e),
                    }
                }
                Err(e) => {
                    error!("watch task failed: {}", e);
                    SyncError::TaskFailed(e.to_string())
                }
            };

            if first_error.is_none() {
                warn!("cancelling remaining watches");
                group.cancel();
                first_error = Some(failure);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
