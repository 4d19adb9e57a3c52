//! S3 storage backend

use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, ConfigLoader, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::config::Environment;
use crate::{Error, Result};

use super::ObjectStore;

/// Region that rejects an explicit location constraint on bucket creation.
const DEFAULT_REGION: &str = "us-east-1";

/// Access key accepted by the local emulator.
const EMULATOR_ACCESS_KEY: &str = "test";

#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub region: Option<String>,
    /// Endpoint override for deployed S3-compatible stores
    pub endpoint: Option<String>,
    /// Emulator endpoint used when the environment is local
    pub local_endpoint: String,
}

/// S3 storage backend
///
/// Writes go through a signed client. URLs are generated by an anonymous
/// client so they are plain object links that need no credentials.
pub struct S3Storage {
    client: Client,
    url_client: Client,
    region: Option<String>,
}

impl S3Storage {
    pub async fn new(settings: &S3Settings, environment: &Environment) -> Result<Self> {
        let local = environment.is_local();

        let region = if local {
            Some(
                settings
                    .region
                    .clone()
                    .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            )
        } else {
            settings.region.clone()
        };

        let endpoint = if local {
            Some(settings.local_endpoint.clone())
        } else {
            settings.endpoint.clone()
        };

        let mut loader = config_loader(region.as_deref());
        if local {
            loader = loader.credentials_provider(Credentials::new(
                EMULATOR_ACCESS_KEY,
                EMULATOR_ACCESS_KEY,
                None,
                None,
                "localstack",
            ));
        }
        let config = loader.load().await;
        let url_config = config_loader(region.as_deref())
            .no_credentials()
            .load()
            .await;

        let storage = Self::from_clients(
            build_client(&config, endpoint.as_deref()),
            build_client(&url_config, endpoint.as_deref()),
        );

        tracing::info!(
            %environment,
            endpoint = endpoint.as_deref().unwrap_or("default"),
            region = region.as_deref().unwrap_or("default"),
            "S3 client initialised",
        );

        Ok(storage)
    }

    /// Wrap already configured clients: `client` for writes, `url_client` for URLs.
    pub fn from_clients(client: Client, url_client: Client) -> Self {
        let region = client.config().region().map(|r| r.as_ref().to_string());
        Self {
            client,
            url_client,
            region,
        }
    }

    fn location_constraint(&self) -> Option<CreateBucketConfiguration> {
        let region = self.region.as_deref().filter(|r| *r != DEFAULT_REGION)?;
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build(),
        )
    }
}

fn config_loader(region: Option<&str>) -> ConfigLoader {
    let loader = aws_config::defaults(BehaviorVersion::latest());
    match region {
        Some(region) => loader.region(Region::new(region.to_string())),
        None => loader,
    }
}

fn build_client(config: &SdkConfig, endpoint: Option<&str>) -> Client {
    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(config);

    if let Some(endpoint_url) = endpoint {
        s3_config_builder = s3_config_builder
            .endpoint_url(endpoint_url)
            .force_path_style(true);
    }

    Client::from_conf(s3_config_builder.build())
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if let Some(configuration) = self.location_constraint() {
            request = request.create_bucket_configuration(configuration);
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_bucket_already_owned_by_you() {
                    tracing::debug!(bucket, "Bucket already exists");
                    return Ok(());
                }
                Err(Error::storage(format!(
                    "S3 create bucket failed: {}",
                    DisplayErrorContext(&err)
                )))
            }
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Error::storage(format!("S3 put failed: {}", DisplayErrorContext(&e))))?;

        Ok(())
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| Error::config(format!("invalid presign expiry: {}", e)))?;

        let request = self
            .url_client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                Error::storage(format!("S3 presign failed: {}", DisplayErrorContext(&e)))
            })?;

        Ok(request.uri().to_string())
    }
}
