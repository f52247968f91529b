/// S3 configuration for media storage
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Base URL for public access (CDN domain). Empty means the bucket URL is used.
    pub base_url: String,
    /// Custom endpoint for S3-compatible stores (MinIO, R2)
    pub endpoint: Option<String>,
    /// Whether to use path-style URLs (false = virtual-hosted-style)
    pub path_style: bool,
    /// Presigned URL expiration in seconds
    pub presigned_url_expiration_secs: u64,
    /// Canned ACL attached to presigned uploads
    pub upload_acl: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "nova-media".to_string(),
            region: "us-east-1".to_string(),
            base_url: String::new(),
            endpoint: None,
            path_style: false,
            presigned_url_expiration_secs: 3600,
            upload_acl: "public-read".to_string(),
        }
    }
}

impl S3Config {
    /// Load S3 configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bucket: std::env::var("S3_BUCKET").unwrap_or(defaults.bucket),
            region: std::env::var("AWS_REGION").unwrap_or(defaults.region),
            base_url: std::env::var("S3_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            endpoint: std::env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),
            path_style: std::env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.path_style),
            presigned_url_expiration_secs: std::env::var("S3_PRESIGNED_URL_EXPIRATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.presigned_url_expiration_secs),
            upload_acl: std::env::var("S3_UPLOAD_ACL").unwrap_or(defaults.upload_acl),
        }
    }

    /// Build the public URL of an object
    pub fn object_url(&self, key: &str) -> String {
        if !self.base_url.is_empty() {
            return self.cdn_url(key);
        }
        if self.path_style {
            let endpoint = self
                .endpoint
                .clone()
                .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region));
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            )
        }
    }

    /// Get CDN URL for object
    pub fn cdn_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}
