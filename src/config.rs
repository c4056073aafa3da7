//! Component factory for object-store construction
//!
//! Builds the object store a pipeline runs against from a [`StorageConfig`],
//! pulling provider credentials and endpoints from the environment.

use crate::{CloudProvider, Error, Result, StorageConfig};

use object_store::{aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, ObjectStore};
use std::sync::Arc;
use tracing::info;

pub struct ComponentFactory;

impl ComponentFactory {
    /// Resolve storage settings from optional CLI values.
    pub fn resolve_storage_config(
        provider: Option<&str>,
        bucket: Option<&str>,
        local_root: Option<&std::path::Path>,
    ) -> Result<StorageConfig> {
        let defaults = StorageConfig::default();
        let provider = match provider {
            Some(raw) => raw.parse::<CloudProvider>().map_err(Error::Config)?,
            None => defaults.provider,
        };
        let bucket = bucket
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or(defaults.bucket);

        Ok(StorageConfig {
            provider,
            bucket,
            local_root: local_root.map(|p| p.to_path_buf()),
        })
    }

    /// Create an object store for `storage`.
    ///
    /// Environment variables (aws only):
    /// - S3_REGION: S3 region (default: us-east-1)
    /// - S3_ENDPOINT: Custom S3 endpoint (optional, for MinIO)
    /// - AWS_ACCESS_KEY_ID: AWS credentials (optional, uses IAM role if not set)
    /// - AWS_SECRET_ACCESS_KEY: AWS credentials (optional)
    pub async fn create_object_store_for(storage: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
        match storage.provider {
            CloudProvider::Memory => {
                info!("Using in-memory object store (development mode)");
                Ok(Arc::new(InMemory::new()))
            }
            CloudProvider::Local => {
                let root = storage.local_root.as_ref().ok_or_else(|| {
                    Error::Config("a local root directory is required for the local provider".to_string())
                })?;
                info!(root = %root.display(), "Using local filesystem object store");
                Ok(Arc::new(LocalFileSystem::new_with_prefix(root)?))
            }
            CloudProvider::Aws => {
                let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());

                info!(
                    "Using S3 object store: {}://{}, region={}",
                    storage.provider.object_store_scheme(),
                    storage.bucket,
                    region
                );

                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&storage.bucket)
                    .with_region(&region);

                // MinIO, LocalStack
                if let Ok(endpoint) = std::env::var("S3_ENDPOINT") {
                    info!("Using custom S3 endpoint: {}", endpoint);
                    builder = builder.with_endpoint(&endpoint).with_allow_http(true);
                }

                if let Ok(key) = std::env::var("AWS_ACCESS_KEY_ID") {
                    builder = builder.with_access_key_id(&key);
                }
                if let Ok(secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
                    builder = builder.with_secret_access_key(&secret);
                }

                Ok(Arc::new(builder.build()?))
            }
        }
    }
}
