use async_trait::async_trait;
use s3_utils::{S3Client, S3Operations};

use super::MediaLocator;
use crate::error::StorageError;

/// Media locator over S3 presigned PUTs
#[derive(Clone)]
pub struct S3MediaLocator {
    ops: S3Operations,
}

impl S3MediaLocator {
    pub fn new(client: &S3Client) -> Self {
        Self {
            ops: client.operations(),
        }
    }
}

#[async_trait]
impl MediaLocator for S3MediaLocator {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        acl: &str,
    ) -> Result<String, StorageError> {
        self.ops
            .get_presigned_upload_url(key, content_type, acl)
            .await
            .map_err(|e| StorageError::Presign {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    fn default_acl(&self) -> &str {
        &self.ops.config().upload_acl
    }

    fn public_url(&self, key: &str) -> String {
        self.ops.public_url(key)
    }
}
