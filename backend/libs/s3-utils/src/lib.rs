/// S3 utilities for the feed service
///
/// Provides the AWS S3 client wrapper, configuration, and the presigning
/// operations used when clients upload post media directly to storage.
use aws_sdk_s3::Client;
use std::sync::Arc;
use thiserror::Error;

pub mod config;
pub mod operations;

pub use config::S3Config;
pub use operations::S3Operations;

/// Errors surfaced by S3 operations
#[derive(Debug, Error)]
pub enum S3Error {
    #[error("invalid presigning configuration: {0}")]
    PresignConfig(String),

    #[error("S3 request failed: {0}")]
    Request(String),
}

/// Shared S3 client wrapper
#[derive(Clone)]
pub struct S3Client {
    client: Arc<Client>,
    config: S3Config,
}

impl S3Client {
    /// Create new S3 client with custom configuration
    pub async fn with_config(config: S3Config) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        tracing::debug!(bucket = %config.bucket, region = %config.region, "S3 client configured");

        Self {
            client: Arc::new(Client::from_conf(builder.build())),
            config,
        }
    }

    /// Operations bound to this client and bucket
    pub fn operations(&self) -> S3Operations {
        S3Operations::new(self.client.clone(), self.config.clone())
    }
}
