//! Sources of configuration data.
//!
//! A [`Backend`] hands out the current value of one remote configuration
//! object as a raw string, and a lazy [`ChangeStream`] of new values as the
//! object changes. Concrete backends are selected by [`BackendKind`], the tag
//! written in the settings file.

pub mod appconfig;
pub mod aws;
pub mod error;
pub mod local;
pub mod secretsmanager;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::{ConfigError, SyncError};
use crate::settings::Construct;

pub use appconfig::AppConfigBackend;
pub use error::{BackendError, Result};
pub use local::LocalBackend;
pub use secretsmanager::SecretsManagerBackend;

/// Unbounded sequence of changed configuration values.
///
/// Each element differs from the one before it. The stream only ends after
/// yielding a fatal error; dropping it ends the poll session.
pub type ChangeStream = BoxStream<'static, Result<String>>;

/// A source of configuration snapshots and change notifications.
#[async_trait]
pub trait Backend: fmt::Display + Send + Sync {
    /// Fetches the current value once.
    async fn get(&self) -> Result<String>;

    /// Opens a fresh poll session that yields the value whenever it changes.
    ///
    /// The session is opened lazily, on the first poll of the stream.
    fn poll(&self, interval: Duration) -> ChangeStream;

    /// Interval used when the settings do not override it.
    fn default_interval(&self) -> Duration;
}

/// The backend kinds that can be named in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    AppConfig,
    Local,
    SecretsManager,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::AppConfig => "appconfig",
            BackendKind::Local => "local",
            BackendKind::SecretsManager => "secretsmanager",
        }
    }

    /// Constructs a backend of this kind from settings parameters.
    ///
    /// `Construct::New` goes through the backend's name-resolving factory,
    /// which may call out to the remote service.
    pub async fn build(&self, construct: &Construct) -> std::result::Result<Box<dyn Backend>, SyncError> {
        let backend: Box<dyn Backend> = match (self, construct) {
            (BackendKind::AppConfig, Construct::Init(params)) => {
                Box::new(AppConfigBackend::from_params(params).await?)
            }
            (BackendKind::AppConfig, Construct::New(params)) => {
                Box::new(AppConfigBackend::from_name_params(params).await?)
            }
            (BackendKind::Local, construct) => {
                Box::new(LocalBackend::from_params(construct.params())?)
            }
            (BackendKind::SecretsManager, construct) => {
                Box::new(SecretsManagerBackend::from_params(construct.params()).await?)
            }
        };
        Ok(backend)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "appconfig" => Ok(BackendKind::AppConfig),
            "local" => Ok(BackendKind::Local),
            "secretsmanager" => Ok(BackendKind::SecretsManager),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Params;

    #[test]
    fn test_backend_kind_round_trip() {
        for kind in [
            BackendKind::AppConfig,
            BackendKind::Local,
            BackendKind::SecretsManager,
        ] {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
        assert!(matches!(
            "vault".parse::<BackendKind>(),
            Err(ConfigError::UnknownBackend(_))
        ));
    }

    #[tokio::test]
    async fn test_build_local_backend() {
        let params = Params::from_pairs("objects.x.source.init", [("path", "/tmp/settings.yaml")]);
        let backend = BackendKind::Local
            .build(&Construct::Init(params))
            .await
            .unwrap();
        assert_eq!(backend.to_string(), "LocalBackend(path='/tmp/settings.yaml')");
    }

    #[tokio::test]
    async fn test_build_appconfig_from_ids() {
        let params = Params::from_pairs(
            "objects.x.source.init",
            [
                ("application_id", "app-id"),
                ("configuration_profile_id", "conf-id"),
                ("environment_id", "env-id"),
                ("region", "eu-west-1"),
            ],
        );
        let backend = BackendKind::AppConfig
            .build(&Construct::Init(params))
            .await
            .unwrap();
        assert_eq!(
            backend.to_string(),
            "AppConfigBackend(app_id='app-id', conf_profile_id='conf-id', env_id='env-id')"
        );
    }

    #[tokio::test]
    async fn test_build_secretsmanager_backend() {
        let params = Params::from_pairs(
            "objects.x.source.new",
            [("secret_id", "docker-config"), ("region", "us-west-2")],
        );
        let backend = BackendKind::SecretsManager
            .build(&Construct::New(params))
            .await
            .unwrap();
        assert_eq!(backend.to_string(), "docker-config");
        assert_eq!(backend.default_interval(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_build_reports_missing_param() {
        let params = Params::from_pairs("objects.x.source.init", [("application_id", "app-id")]);
        let err = BackendKind::AppConfig
            .build(&Construct::Init(params))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SyncError::Config(ConfigError::MissingKey { key })
                if key == "objects.x.source.init.configuration_profile_id"
        ));
    }
}
