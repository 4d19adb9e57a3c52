//! cfm-storage - Object storage adapter for binary uploads
//!
//! Provides:
//! - Idempotent bucket creation
//! - Blob writes under generated `<uuid>.<ext>` keys
//! - Presigned retrieval URLs, rewritten for the host machine in local mode
//! - S3 (aws-sdk-s3) and in-memory backends behind one capability trait

pub mod adapter;
pub mod config;
pub mod error;
pub mod storage;

pub use adapter::Storage;
pub use config::Environment;
pub use error::{Error, Result};
