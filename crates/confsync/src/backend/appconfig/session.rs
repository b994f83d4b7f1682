//! Long-poll session against the configuration data plane.
//!
//! A session holds the current configuration token and the poll interval in
//! effect. Every successful fetch replaces both with the values the server
//! returns. A "too early" rejection keeps the token and retries after half
//! the current interval. Any other failure ends the session.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::client::{ConfigDataApi, SessionTarget};
use crate::backend::error::{BackendError, Result};
use crate::backend::ChangeStream;

/// State owned by one in-flight poll.
pub struct PollSession {
    client: Arc<dyn ConfigDataApi>,
    token: String,
    interval: Duration,
    /// Wait owed before the next fetch.
    pending_wait: Option<Duration>,
    last_emitted: Option<String>,
}

impl PollSession {
    /// Opens a session, requesting `interval` as the minimum poll interval.
    pub async fn open(
        client: Arc<dyn ConfigDataApi>,
        target: &SessionTarget,
        interval: Duration,
    ) -> Result<Self> {
        let token = client.start_session(target, interval).await?;
        debug!(
            application_id = %target.application_id,
            interval_secs = interval.as_secs_f64(),
            "opened configuration session"
        );

        Ok(Self {
            client,
            token,
            interval,
            pending_wait: None,
            last_emitted: None,
        })
    }

    /// Token the next fetch will send.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Poll interval currently in effect.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Polls until the configuration changes and returns the new content.
    ///
    /// Waits owed from the previous call are served first, so the caller's
    /// processing of one value always finishes before the next fetch.
    pub async fn next_change(&mut self) -> Result<String> {
        loop {
            if let Some(wait) = self.pending_wait.take() {
                tokio::time::sleep(wait).await;
            }

            debug!("polling for configuration changes");
            let response = match self.client.latest_configuration(&self.token).await {
                Ok(response) => response,
                Err(e) if e.is_too_early() => {
                    let backoff = self.interval / 2;
                    warn!(
                        backoff_secs = backoff.as_secs_f64(),
                        "polled too early, retrying with the same token"
                    );
                    self.pending_wait = Some(backoff);
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.token = response.next_token;
            self.interval = response.next_interval;
            self.pending_wait = Some(self.interval);

            if response.content.is_empty() {
                debug!("no configuration changes");
                continue;
            }

            let content = String::from_utf8(response.content).map_err(|e| {
                BackendError::InvalidResponse(format!("configuration is not valid UTF-8: {}", e))
            })?;

            if self.last_emitted.as_deref() == Some(content.as_str()) {
                debug!("configuration content unchanged");
                continue;
            }

            self.last_emitted = Some(content.clone());
            return Ok(content);
        }
    }
}

enum StreamState {
    Start {
        client: Arc<dyn ConfigDataApi>,
        target: SessionTarget,
        interval: Duration,
    },
    Polling(PollSession),
    Done,
}

/// Wraps a session in a lazy stream that opens it on first poll and ends
/// after the first fatal error.
pub fn change_stream(
    client: Arc<dyn ConfigDataApi>,
    target: SessionTarget,
    interval: Duration,
) -> ChangeStream {
    let start = StreamState::Start {
        client,
        target,
        interval,
    };

    stream::unfold(start, |state| async move {
        let mut session = match state {
            StreamState::Start {
                client,
                target,
                interval,
            } => match PollSession::open(client, &target, interval).await {
                Ok(session) => session,
                Err(e) => return Some((Err(e), StreamState::Done)),
            },
            StreamState::Polling(session) => session,
            StreamState::Done => return None,
        };

        match session.next_change().await {
            Ok(content) => Some((Ok(content), StreamState::Polling(session))),
            Err(e) => Some((Err(e), StreamState::Done)),
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::appconfig::testing::{FakeDataClient, Step};
    use tokio::time::Instant;

    fn target() -> SessionTarget {
        SessionTarget {
            application_id: "app-id".to_string(),
            configuration_profile_id: "conf-id".to_string(),
            environment_id: "env-id".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_only_changes() {
        let client = Arc::new(FakeDataClient::new(vec![
            Step::content("t1", 10, "v1"),
            Step::unchanged("t2", 10),
            Step::content("t3", 10, "v2"),
        ]));
        let mut stream = change_stream(client.clone(), target(), Duration::from_secs(10));

        assert_eq!(stream.next().await.unwrap().unwrap(), "v1");
        assert_eq!(stream.next().await.unwrap().unwrap(), "v2");

        let tokens: Vec<String> = client.requests().into_iter().map(|r| r.token).collect();
        assert_eq!(tokens, vec!["t0", "t1", "t2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_content_is_not_re_emitted() {
        let client = Arc::new(FakeDataClient::new(vec![
            Step::content("t1", 5, "same"),
            Step::content("t2", 5, "same"),
            Step::content("t3", 5, "different"),
        ]));
        let mut stream = change_stream(client, target(), Duration::from_secs(5));

        assert_eq!(stream.next().await.unwrap().unwrap(), "same");
        assert_eq!(stream.next().await.unwrap().unwrap(), "different");
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_token_comes_from_current_response() {
        let client = Arc::new(FakeDataClient::new(vec![
            Step::content("alpha", 1, "v1"),
            Step::content("beta", 1, "v2"),
        ]));
        let mut session = PollSession::open(client.clone(), &target(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(session.token(), "t0");

        session.next_change().await.unwrap();
        assert_eq!(session.token(), "alpha");
        session.next_change().await.unwrap();
        assert_eq!(session.token(), "beta");

        let tokens: Vec<String> = client.requests().into_iter().map(|r| r.token).collect();
        assert_eq!(tokens, vec!["t0", "alpha"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_early_retries_same_token_after_half_interval() {
        let client = Arc::new(FakeDataClient::new(vec![
            Step::content("t1", 20, "v1"),
            Step::too_early(),
            Step::content("t2", 20, "v2"),
        ]));
        let mut stream = change_stream(client.clone(), target(), Duration::from_secs(60));

        assert_eq!(stream.next().await.unwrap().unwrap(), "v1");
        assert_eq!(stream.next().await.unwrap().unwrap(), "v2");

        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].token, "t1");
        assert_eq!(requests[2].token, "t1");
        assert_eq!(requests[1].at - requests[0].at, Duration::from_secs(20));
        assert_eq!(requests[2].at - requests[1].at, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_early_before_first_response_uses_requested_interval() {
        let client = Arc::new(FakeDataClient::new(vec![
            Step::too_early(),
            Step::content("t1", 30, "v1"),
        ]));
        let started = Instant::now();
        let mut stream = change_stream(client.clone(), target(), Duration::from_secs(8));

        assert_eq!(stream.next().await.unwrap().unwrap(), "v1");

        let requests = client.requests();
        assert_eq!(requests[0].token, "t0");
        assert_eq!(requests[1].token, "t0");
        assert_eq!(requests[0].at - started, Duration::ZERO);
        assert_eq!(requests[1].at - requests[0].at, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_end_the_stream() {
        let client = Arc::new(FakeDataClient::new(vec![
            Step::content("t1", 1, "v1"),
            Step::error(BackendError::BadRequest {
                message: "Invalid configuration token".to_string(),
            }),
        ]));
        let mut stream = change_stream(client, target(), Duration::from_secs(1));

        assert_eq!(stream.next().await.unwrap().unwrap(), "v1");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, BackendError::BadRequest { .. }));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_is_opened_lazily_with_requested_interval() {
        let client = Arc::new(FakeDataClient::new(vec![Step::content("t1", 1, "v1")]));
        let mut stream = change_stream(client.clone(), target(), Duration::from_secs(45));
        assert!(client.sessions().is_empty());

        stream.next().await.unwrap().unwrap();
        assert_eq!(client.sessions(), vec![(target(), Duration::from_secs(45))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_adjusts_interval() {
        let client = Arc::new(FakeDataClient::new(vec![
            Step::content("t1", 90, "v1"),
            Step::content("t2", 15, "v2"),
        ]));
        let mut session = PollSession::open(client.clone(), &target(), Duration::from_secs(60))
            .await
            .unwrap();

        session.next_change().await.unwrap();
        assert_eq!(session.interval(), Duration::from_secs(90));
        session.next_change().await.unwrap();
        assert_eq!(session.interval(), Duration::from_secs(15));

        let requests = client.requests();
        assert_eq!(requests[1].at - requests[0].at, Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_utf8_content_is_an_error() {
        let client = Arc::new(FakeDataClient::new(vec![Step::bytes("t1", 1, vec![0xff, 0xfe])]));
        let mut stream = change_stream(client, target(), Duration::from_secs(1));
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }
}
