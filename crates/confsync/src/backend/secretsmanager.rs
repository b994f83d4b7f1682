//! Use an AWS Secrets Manager secret as the configuration source.
//!
//! Secrets have no change notification, so `poll` re-reads the secret every
//! interval and emits when its version or value changes.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use aws_config::SdkConfig;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::backend::aws::{request_failed, AwsParams};
use crate::backend::error::{BackendError, Result};
use crate::backend::{Backend, ChangeStream};
use crate::error::SyncError;
use crate::settings::Params;

/// Re-read interval used when the settings do not set one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// One read of a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub secret_string: String,
    pub version_id: Option<String>,
}

/// Read access to secrets.
#[async_trait]
pub trait SecretsApi: Send + Sync {
    async fn get_secret_value(&self, secret_id: &str) -> Result<SecretValue>;
}

/// Secrets Manager client.
#[derive(Debug, Clone)]
pub struct SdkSecretsClient {
    client: aws_sdk_secretsmanager::Client,
}

impl SdkSecretsClient {
    pub fn new(config: &SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_secretsmanager::config::Builder::from(config);
        if let Some(url) = endpoint {
            builder = builder.endpoint_url(url);
        }
        Self {
            client: aws_sdk_secretsmanager::Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl SecretsApi for SdkSecretsClient {
    async fn get_secret_value(&self, secret_id: &str) -> Result<SecretValue> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .is_some_and(|service| service.is_resource_not_found_exception());
                if missing {
                    BackendError::NotFound {
                        operation: "get_secret_value".to_string(),
                        name: secret_id.to_string(),
                    }
                } else {
                    request_failed("get_secret_value", e)
                }
            })?;

        let secret_string = output
            .secret_string()
            .ok_or_else(|| {
                BackendError::InvalidResponse(format!("secret '{}' has no string value", secret_id))
            })?
            .to_string();

        Ok(SecretValue {
            secret_string,
            version_id: output.version_id().map(str::to_string),
        })
    }
}

/// Reads one secret's string value.
pub struct SecretsManagerBackend {
    client: Arc<dyn SecretsApi>,
    secret_id: String,
    /// Version seen by the most recent read.
    version_id: Arc<Mutex<Option<String>>>,
}

impl SecretsManagerBackend {
    pub fn new(client: Arc<dyn SecretsApi>, secret_id: impl Into<String>) -> Self {
        let secret_id = secret_id.into();
        debug!(secret_id = %secret_id, "initialize secrets backend");
        Self {
            client,
            secret_id,
            version_id: Arc::new(Mutex::new(None)),
        }
    }

    /// Builds a backend from the `secret_id` setting plus the optional
    /// `region`, `profile` and `endpoint` settings.
    pub async fn from_params(params: &Params) -> std::result::Result<Self, SyncError> {
        let secret_id = params.require_str("secret_id")?;
        let endpoint = params.optional_str("endpoint")?;
        let config = AwsParams::from_params(params)?.load().await;

        let client = Arc::new(SdkSecretsClient::new(&config, endpoint.as_deref()));
        Ok(Self::new(client, secret_id))
    }

    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }

    pub fn version_id(&self) -> Option<String> {
        self.version_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Reads the secret and records the version it came from.
async fn read_secret(
    client: &dyn SecretsApi,
    secret_id: &str,
    version_id: &Mutex<Option<String>>,
) -> Result<SecretValue> {
    let value = client.get_secret_value(secret_id).await?;
    *version_id.lock().unwrap_or_else(PoisonError::into_inner) = value.version_id.clone();
    Ok(value)
}

impl fmt::Display for SecretsManagerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version_id() {
            Some(version) => write!(f, "{} (version: {})", self.secret_id, version),
            None => f.write_str(&self.secret_id),
        }
    }
}

struct Polling {
    client: Arc<dyn SecretsApi>,
    secret_id: String,
    version_id: Arc<Mutex<Option<String>>>,
    interval: Duration,
    last: Option<SecretValue>,
}

impl Polling {
    async fn next_change(&mut self) -> Result<String> {
        loop {
            if self.last.is_some() {
                tokio::time::sleep(self.interval).await;
            }

            let value = read_secret(self.client.as_ref(), &self.secret_id, &self.version_id).await?;
            if self.last.as_ref() == Some(&value) {
                debug!(secret_id = %self.secret_id, "secret unchanged");
                continue;
            }

            if self.last.is_some() {
                info!(secret_id = %self.secret_id, version = ?value.version_id, "secret changed");
            }
            let content = value.secret_string.clone();
            self.last = Some(value);
            return Ok(content);
        }
    }
}

#[async_trait]
impl Backend for SecretsManagerBackend {
    async fn get(&self) -> Result<String> {
        let value = read_secret(self.client.as_ref(), &self.secret_id, &self.version_id).await?;
        Ok(value.secret_string)
    }

    /// Emits the current value first, then every later value that differs.
    fn poll(&self, interval: Duration) -> ChangeStream {
        let polling = Polling {
            client: Arc::clone(&self.client),
            secret_id: self.secret_id.clone(),
            version_id: Arc::clone(&self.version_id),
            interval,
            last: None,
        };

        stream::unfold(Some(polling), |state| async move {
            let mut polling = state?;
            match polling.next_change().await {
                Ok(content) => Some((Ok(content), Some(polling))),
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }

    fn default_interval(&self) -> Duration {
        DEFAULT_INTERVAL
    }
}
