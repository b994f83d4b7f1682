//! Shared AWS plumbing: SDK configuration from settings and error mapping.
//!
//! Credentials come from the standard AWS provider chain (environment,
//! shared profile files, SSO, container and instance metadata), so every
//! request the SDK clients send is SigV4-signed.

use std::error::Error as StdError;

use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_appconfigdata::config::http::HttpResponse;
use aws_sdk_appconfigdata::error::{DisplayErrorContext, SdkError};
use tracing::debug;

use crate::backend::error::BackendError;
use crate::error::ConfigError;
use crate::settings::Params;

/// Region used when neither the settings nor the environment name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings shared by the AWS backends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsParams {
    /// Overrides the region from the environment and profile.
    pub region: Option<String>,
    /// Named profile from the shared configuration files.
    pub profile: Option<String>,
}

impl AwsParams {
    pub fn from_params(params: &Params) -> Result<Self, ConfigError> {
        Ok(Self {
            region: params.optional_str("region")?,
            profile: params.optional_str("profile")?,
        })
    }

    /// Loads the SDK configuration, falling back to [`DEFAULT_REGION`].
    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        loader = match &self.region {
            Some(region) => loader.region(Region::new(region.clone())),
            None => loader.region(RegionProviderChain::default_provider().or_else(DEFAULT_REGION)),
        };

        let config = loader.load().await;
        debug!(region = ?config.region(), profile = ?self.profile, "loaded AWS configuration");
        config
    }
}

/// Maps an SDK failure that has no more specific meaning to a [`BackendError`].
pub(crate) fn request_failed<E>(operation: &str, err: SdkError<E, HttpResponse>) -> BackendError
where
    E: StdError + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(service) => BackendError::Status {
            status: service.raw().status().as_u16(),
            message: format!("'{}': {}", operation, DisplayErrorContext(service.err())),
        },
        _ => BackendError::Http(format!("'{}' request failed: {}", operation, DisplayErrorContext(&err))),
    }
}
