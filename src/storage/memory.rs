//! In-process storage backend

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::{Error, Result};

use super::ObjectStore;

/// In-memory object store following S3 bucket semantics
pub struct MemoryStorage {
    base_url: String,
    buckets: DashMap<String, HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            buckets: DashMap::new(),
        }
    }

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.buckets.contains_key(bucket)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.buckets
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.get(bucket).map_or(0, |objects| objects.len())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LOCAL_ENDPOINT)
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        self.buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        validate_bucket_name(bucket)?;
        let mut objects = self
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::BucketNotFound(bucket.to_string()))?;
        objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String> {
        validate_bucket_name(bucket)?;
        Ok(format!(
            "{}/{}/{}?X-Amz-Expires={}",
            self.base_url,
            bucket,
            key,
            expires_in.as_secs()
        ))
    }
}

/// S3 bucket naming: 3-63 chars of `[a-z0-9.-]`, alphanumeric at both ends.
fn validate_bucket_name(bucket: &str) -> Result<()> {
    let bytes = bucket.as_bytes();
    let valid_len = (3..=63).contains(&bytes.len());
    let valid_chars = bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'.' || *b == b'-');
    let valid_ends = bytes
        .first()
        .zip(bytes.last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if valid_len && valid_chars && valid_ends {
        Ok(())
    } else {
        Err(Error::InvalidBucketName(bucket.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::default();

        storage.create_bucket("fridge-images").await.unwrap();
        storage.create_bucket("fridge-images").await.unwrap();
        assert!(storage.bucket_exists("fridge-images"));

        let data = Bytes::from("hello world");
        storage
            .put_object("fridge-images", "file.txt", data.clone())
            .await
            .unwrap();

        assert_eq!(storage.object("fridge-images", "file.txt"), Some(data));
        assert_eq!(storage.object_count("fridge-images"), 1);
    }

    #[tokio::test]
    async fn test_put_into_missing_bucket() {
        let storage = MemoryStorage::default();

        let err = storage
            .put_object("missing", "file.txt", Bytes::from_static(b"x"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BucketNotFound(name) if name == "missing"));
        assert!(!storage.bucket_exists("missing"));
    }

    #[tokio::test]
    async fn test_presign_format() {
        let storage = MemoryStorage::new("http://localstack:4566/");

        let url = storage
            .presign_get("bucket", "abc.png", Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(url, "http://localstack:4566/bucket/abc.png?X-Amz-Expires=0");
    }

    #[test]
    fn test_bucket_names() {
        for name in ["abc", "fridge-images", "my.bucket.01"] {
            assert!(validate_bucket_name(name).is_ok(), "{name} should be valid");
        }
        for name in ["ab", "Upper", "-lead", "trail.", "under_score", ""] {
            assert!(validate_bucket_name(name).is_err(), "{name} should be invalid");
        }
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
    }
}
