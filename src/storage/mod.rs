//! Storage abstraction layer
//!
//! Narrow capability interface over an object store, with an S3 backend
//! and an in-process backend for local bring-up and tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::Environment;
use crate::Result;

pub mod memory;
pub mod s3;

/// Object store capability used by the adapter
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket; succeeds if the caller already owns it
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Write object to a bucket
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;

    /// Ask the provider for a GET URL valid for `expires_in`
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String>;
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    S3 {
        environment: Environment,
        region: Option<String>,
        endpoint: Option<String>,
        local_endpoint: String,
    },
    Memory {
        base_url: String,
    },
}

/// Create storage backend from config
pub async fn create_storage(config: StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config {
        StorageConfig::S3 {
            environment,
            region,
            endpoint,
            local_endpoint,
        } => {
            let settings = s3::S3Settings {
                region,
                endpoint,
                local_endpoint,
            };
            let backend = s3::S3Storage::new(&settings, &environment).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::Memory { base_url } => Ok(Arc::new(memory::MemoryStorage::new(base_url))),
    }
}
