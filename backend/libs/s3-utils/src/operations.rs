/// S3 presigning operations for direct-to-storage media uploads
use crate::config::S3Config;
use crate::S3Error;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct S3Operations {
    client: Arc<Client>,
    config: S3Config,
}

impl S3Operations {
    pub fn new(client: Arc<Client>, config: S3Config) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// Generate presigned URL for uploading.
    ///
    /// The URL is bound to the content type and ACL; the client must send the
    /// same `Content-Type` and `x-amz-acl` headers with its PUT.
    pub async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
        acl: &str,
    ) -> Result<String, S3Error> {
        let presigner = PresigningConfig::expires_in(Duration::from_secs(
            self.config.presigned_url_expiration_secs,
        ))
        .map_err(|e| S3Error::PresignConfig(e.to_string()))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .acl(ObjectCannedAcl::from(acl))
            .presigned(presigner)
            .await
            .map_err(|e| S3Error::Request(e.to_string()))?;

        Ok(request.uri().to_string())
    }

    /// Public URL for an uploaded object
    pub fn public_url(&self, key: &str) -> String {
        self.config.object_url(key)
    }
}
