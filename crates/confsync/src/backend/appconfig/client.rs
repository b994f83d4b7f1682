//! Clients for the AppConfig data plane and control plane.
//!
//! The data plane hands out configuration through token-based sessions; the
//! control plane is only used to look up identifiers by display name. Both
//! are behind traits so the poll state machine can be driven by fakes.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_appconfigdata::operation::get_latest_configuration::GetLatestConfigurationError;
use log::debug;

use crate::backend::aws::request_failed;
use crate::backend::error::{BackendError, Result};

/// Page size requested from list operations.
const LIST_PAGE_SIZE: i32 = 50;

/// Identifiers of one deployed configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub application_id: String,
    pub configuration_profile_id: String,
    pub environment_id: String,
}

/// Response to a configuration fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestConfiguration {
    /// Token to use for the next fetch.
    pub next_token: String,
    /// How long to wait before the next fetch.
    pub next_interval: Duration,
    /// New content, or empty if unchanged since the previous fetch.
    pub content: Vec<u8>,
}

/// Session-based access to deployed configuration.
#[async_trait]
pub trait ConfigDataApi: Send + Sync {
    /// Opens a session and returns the initial configuration token.
    async fn start_session(&self, target: &SessionTarget, min_interval: Duration)
        -> Result<String>;

    /// Fetches the configuration for `token`.
    async fn latest_configuration(&self, token: &str) -> Result<LatestConfiguration>;
}

/// Paginated listing operations used for name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOperation {
    Applications,
    ConfigurationProfiles { application_id: String },
    Environments { application_id: String },
}

impl ListOperation {
    /// Operation name used in messages.
    pub fn name(&self) -> &'static str {
        match self {
            ListOperation::Applications => "list_applications",
            ListOperation::ConfigurationProfiles { .. } => "list_configuration_profiles",
            ListOperation::Environments { .. } => "list_environments",
        }
    }
}

/// One item of a list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
}

impl CatalogItem {
    /// Items the service returned without an id or a name are skipped.
    fn from_parts(id: Option<&str>, name: Option<&str>) -> Option<Self> {
        Some(Self {
            id: id?.to_string(),
            name: name?.to_string(),
        })
    }
}

/// One page of a list operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<CatalogItem>,
    pub next_token: Option<String>,
}

/// Control-plane search over applications, profiles and environments.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetches one page; `next_token` is `None` for the first page.
    async fn list_page(&self, operation: &ListOperation, next_token: Option<&str>)
        -> Result<ListPage>;
}

/// Seconds as the service's integer type, saturating.
fn whole_seconds(interval: Duration) -> i32 {
    i32::try_from(interval.as_secs()).unwrap_or(i32::MAX)
}

/// The service message of a `BadRequestException`, which is how the data
/// plane reports both "too early" and malformed tokens.
fn bad_request_message(err: &GetLatestConfigurationError) -> Option<&str> {
    match err {
        GetLatestConfigurationError::BadRequestException(e) => Some(e.message().unwrap_or_default()),
        _ => None,
    }
}

/// AppConfig data-plane client.
#[derive(Debug, Clone)]
pub struct SdkConfigDataClient {
    client: aws_sdk_appconfigdata::Client,
}

impl SdkConfigDataClient {
    /// Builds a client from shared SDK configuration, optionally pointed at
    /// a different endpoint.
    pub fn new(config: &SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_appconfigdata::config::Builder::from(config);
        if let Some(url) = endpoint {
            builder = builder.endpoint_url(url);
        }
        Self {
            client: aws_sdk_appconfigdata::Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl ConfigDataApi for SdkConfigDataClient {
    async fn start_session(
        &self,
        target: &SessionTarget,
        min_interval: Duration,
    ) -> Result<String> {
        debug!(
            "Starting configuration session for {}/{}/{}",
            target.application_id, target.configuration_profile_id, target.environment_id
        );

        let output = self
            .client
            .start_configuration_session()
            .application_identifier(&target.application_id)
            .configuration_profile_identifier(&target.configuration_profile_id)
            .environment_identifier(&target.environment_id)
            .required_minimum_poll_interval_in_seconds(whole_seconds(min_interval))
            .send()
            .await
            .map_err(|e| request_failed("start_configuration_session", e))?;

        output
            .initial_configuration_token()
            .map(str::to_string)
            .ok_or_else(|| {
                BackendError::InvalidResponse("session has no initial configuration token".to_string())
            })
    }

    async fn latest_configuration(&self, token: &str) -> Result<LatestConfiguration> {
        let output = self
            .client
            .get_latest_configuration()
            .configuration_token(token)
            .send()
            .await
            .map_err(|e| {
                let message = e
                    .as_service_error()
                    .and_then(bad_request_message)
                    .map(str::to_string);
                match message {
                    Some(message) => BackendError::BadRequest { message },
                    None => request_failed("get_latest_configuration", e),
                }
            })?;

        let next_token = output
            .next_poll_configuration_token()
            .ok_or_else(|| BackendError::InvalidResponse("missing next poll token".to_string()))?
            .to_string();
        let next_interval =
            Duration::from_secs(u64::try_from(output.next_poll_interval_in_seconds()).unwrap_or(0));
        let content = output
            .configuration()
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default();

        Ok(LatestConfiguration {
            next_token,
            next_interval,
            content,
        })
    }
}

/// AppConfig control-plane client.
#[derive(Debug, Clone)]
pub struct SdkCatalogClient {
    client: aws_sdk_appconfig::Client,
}

impl SdkCatalogClient {
    pub fn new(config: &SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_appconfig::config::Builder::from(config);
        if let Some(url) = endpoint {
            builder = builder.endpoint_url(url);
        }
        Self {
            client: aws_sdk_appconfig::Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl CatalogApi for SdkCatalogClient {
    async fn list_page(
        &self,
        operation: &ListOperation,
        next_token: Option<&str>,
    ) -> Result<ListPage> {
        let next_token = next_token.map(str::to_string);

        let page = match operation {
            ListOperation::Applications => {
                let output = self
                    .client
                    .list_applications()
                    .max_results(LIST_PAGE_SIZE)
                    .set_next_token(next_token)
                    .send()
                    .await
                    .map_err(|e| request_failed(operation.name(), e))?;
                ListPage {
                    items: output
                        .items()
                        .iter()
                        .filter_map(|item| CatalogItem::from_parts(item.id(), item.name()))
                        .collect(),
                    next_token: output.next_token().map(str::to_string),
                }
            }
            ListOperation::ConfigurationProfiles { application_id } => {
                let output = self
                    .client
                    .list_configuration_profiles()
                    .application_id(application_id)
                    .max_results(LIST_PAGE_SIZE)
                    .set_next_token(next_token)
                    .send()
                    .await
                    .map_err(|e| request_failed(operation.name(), e))?;
                ListPage {
                    items: output
                        .items()
                        .iter()
                        .filter_map(|item| CatalogItem::from_parts(item.id(), item.name()))
                        .collect(),
                    next_token: output.next_token().map(str::to_string),
                }
            }
            ListOperation::Environments { application_id } => {
                let output = self
                    .client
                    .list_environments()
                    .application_id(application_id)
                    .max_results(LIST_PAGE_SIZE)
                    .set_next_token(next_token)
                    .send()
                    .await
                    .map_err(|e| request_failed(operation.name(), e))?;
                ListPage {
                    items: output
                        .items()
                        .iter()
                        .filter_map(|item| CatalogItem::from_parts(item.id(), item.name()))
                        .collect(),
                    next_token: output.next_token().map(str::to_string),
                }
            }
        };

        debug!(
            "'{}' page returned {} items (more: {})",
            operation.name(),
            page.items.len(),
            page.next_token.is_some()
        );
        Ok(page)
    }
}
