//! Retrieve deployed configuration from AWS AppConfig.
//!
//! The backend talks to the AppConfig data plane through long-poll sessions
//! (see [`session`]) and, when objects are configured by display name, to the
//! control plane to resolve those names into identifiers. Both go through the
//! AWS SDK with credentials from the standard provider chain.

pub mod client;
pub mod session;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use self::client::{
    CatalogApi, ConfigDataApi, ListOperation, SdkCatalogClient, SdkConfigDataClient,
    SessionTarget,
};
use crate::backend::aws::AwsParams;
use crate::backend::error::{BackendError, Result};
use crate::backend::{Backend, ChangeStream};
use crate::error::{ConfigError, SyncError};
use crate::settings::Params;

/// Smallest poll interval the service accepts, in seconds.
pub const MINIMUM_POLL_INTERVAL_SECONDS: u64 = 60;

/// Endpoint overrides for the two AppConfig services, e.g. a local emulator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    pub data: Option<String>,
    pub catalog: Option<String>,
}

impl Endpoints {
    /// Reads `data_endpoint` and `catalog_endpoint` from settings.
    pub fn from_params(params: &Params) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            data: params.optional_str("data_endpoint")?,
            catalog: params.optional_str("catalog_endpoint")?,
        })
    }
}

/// Result of resolving a display name to an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMatch {
    /// The identifier that will be used.
    pub id: String,
    /// Other identifiers sharing the same name, in server order.
    pub ignored: Vec<String>,
}

impl IdMatch {
    /// Picks the first of `ids`; zero ids is a not-found error.
    pub fn first_of(operation: &str, name: &str, mut ids: Vec<String>) -> Result<Self> {
        if ids.is_empty() {
            return Err(BackendError::NotFound {
                operation: operation.to_string(),
                name: name.to_string(),
            });
        }
        let id = ids.remove(0);
        Ok(Self { id, ignored: ids })
    }

    pub fn is_ambiguous(&self) -> bool {
        !self.ignored.is_empty()
    }

    /// Warning emitted when more than one identifier matched.
    pub fn ambiguity_warning(&self, operation: &str, name: &str) -> String {
        format!(
            "'{}' found {} results for Name='{}'; '{}' will be used and the others ignored: {:?}",
            operation,
            self.ignored.len() + 1,
            name,
            self.id,
            self.ignored
        )
    }
}

/// Searches every page of `operation` for items named `name`.
///
/// Multiple matches are not an error: the first one in server order wins and
/// a warning names the rest.
pub async fn resolve_id(
    catalog: &dyn CatalogApi,
    operation: &ListOperation,
    name: &str,
) -> Result<String> {
    let mut ids = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        let page = catalog.list_page(operation, next_token.as_deref()).await?;
        ids.extend(
            page.items
                .into_iter()
                .filter(|item| item.name == name)
                .map(|item| item.id),
        );
        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }

    let found = IdMatch::first_of(operation.name(), name, ids)?;
    if found.is_ambiguous() {
        warn!("{}", found.ambiguity_warning(operation.name(), name));
    }
    Ok(found.id)
}

/// Backend for one AppConfig configuration profile deployed to one environment.
pub struct AppConfigBackend {
    client: Arc<dyn ConfigDataApi>,
    target: SessionTarget,
}

impl AppConfigBackend {
    pub fn new(
        client: Arc<dyn ConfigDataApi>,
        application_id: impl Into<String>,
        configuration_profile_id: impl Into<String>,
        environment_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            target: SessionTarget {
                application_id: application_id.into(),
                configuration_profile_id: configuration_profile_id.into(),
                environment_id: environment_id.into(),
            },
        }
    }

    /// Builds a backend from `application_id`, `configuration_profile_id`
    /// and `environment_id` settings.
    pub async fn from_params(params: &Params) -> std::result::Result<Self, SyncError> {
        let application_id = params.require_str("application_id")?;
        let configuration_profile_id = params.require_str("configuration_profile_id")?;
        let environment_id = params.require_str("environment_id")?;
        let endpoints = Endpoints::from_params(params)?;
        let config = AwsParams::from_params(params)?.load().await;

        let client = Arc::new(SdkConfigDataClient::new(&config, endpoints.data.as_deref()));
        Ok(Self::new(
            client,
            application_id,
            configuration_profile_id,
            environment_id,
        ))
    }

    /// Builds a backend from `application_name`, `configuration_profile_name`
    /// and `environment_name` settings, resolving each name remotely.
    pub async fn from_name_params(params: &Params) -> std::result::Result<Self, SyncError> {
        let application_name = params.require_str("application_name")?;
        let configuration_profile_name = params.require_str("configuration_profile_name")?;
        let environment_name = params.require_str("environment_name")?;
        let endpoints = Endpoints::from_params(params)?;
        let config = AwsParams::from_params(params)?.load().await;

        let catalog = SdkCatalogClient::new(&config, endpoints.catalog.as_deref());
        let client = Arc::new(SdkConfigDataClient::new(&config, endpoints.data.as_deref()));

        Ok(Self::from_names(
            &catalog,
            client,
            &application_name,
            &configuration_profile_name,
            &environment_name,
        )
        .await?)
    }

    /// Resolves display names to identifiers and builds the backend.
    pub async fn from_names(
        catalog: &dyn CatalogApi,
        client: Arc<dyn ConfigDataApi>,
        application_name: &str,
        configuration_profile_name: &str,
        environment_name: &str,
    ) -> Result<Self> {
        info!(
            app = application_name,
            conf = configuration_profile_name,
            env = environment_name,
            "creating AppConfig backend from names"
        );

        let application_id =
            resolve_id(catalog, &ListOperation::Applications, application_name).await?;
        let configuration_profile_id = resolve_id(
            catalog,
            &ListOperation::ConfigurationProfiles {
                application_id: application_id.clone(),
            },
            configuration_profile_name,
        )
        .await?;
        let environment_id = resolve_id(
            catalog,
            &ListOperation::Environments {
                application_id: application_id.clone(),
            },
            environment_name,
        )
        .await?;

        Ok(Self::new(
            client,
            application_id,
            configuration_profile_id,
            environment_id,
        ))
    }

    pub fn target(&self) -> &SessionTarget {
        &self.target
    }
}

impl fmt::Display for AppConfigBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AppConfigBackend(app_id='{}', conf_profile_id='{}', env_id='{}')",
            self.target.application_id,
            self.target.configuration_profile_id,
            self.target.environment_id
        )
    }
}

#[async_trait]
impl Backend for AppConfigBackend {
    async fn get(&self) -> Result<String> {
        let token = self
            .client
            .start_session(
                &self.target,
                Duration::from_secs(MINIMUM_POLL_INTERVAL_SECONDS),
            )
            .await?;
        let response = self.client.latest_configuration(&token).await?;

        String::from_utf8(response.content).map_err(|e| {
            BackendError::InvalidResponse(format!("configuration is not valid UTF-8: {}", e))
        })
    }

    fn poll(&self, interval: Duration) -> ChangeStream {
        session::change_stream(Arc::clone(&self.client), self.target.clone(), interval)
    }

    fn default_interval(&self) -> Duration {
        Duration::from_secs(MINIMUM_POLL_INTERVAL_SECONDS)
    }
}
