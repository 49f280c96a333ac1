use anyhow::{Context, Result};
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::region::Region;
use s3::Bucket;
use tracing::debug;

use super::{base_name, timestamp_millis, ImageStore};
use crate::config::Config;

/// Image store that uploads to an S3 bucket.
///
/// Files are written to `original/{millis}_{name}`. The returned URL points at
/// `thumb/` instead, where the resized copy is published.
#[derive(Clone)]
pub struct S3ImageStore {
    bucket: Box<Bucket>,
    region: String,
    endpoint: Option<String>,
}

impl S3ImageStore {
    /// Create a new S3 image store from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing or the bucket handle cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let access_key = config
            .s3_access_key_id
            .as_deref()
            .context("S3_ACCESS_KEY_ID not set")?;
        let secret_key = config
            .s3_secret_access_key
            .as_deref()
            .context("S3_SECRET_ACCESS_KEY not set")?;

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .context("Failed to create S3 credentials")?;

        let region = resolve_region(&config.s3_region, config.s3_endpoint.as_deref())
            .context("Invalid S3_REGION")?;

        let bucket = Bucket::new(&config.s3_bucket, region, credentials)
            .context("Failed to create S3 bucket")?;

        // Use path-style for custom endpoints (MinIO, R2, etc.)
        let bucket = if config.s3_endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        Ok(Self {
            bucket,
            region: config.s3_region.clone(),
            endpoint: config.s3_endpoint.clone(),
        })
    }

    /// Get the public URL for an object.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        object_url(
            self.endpoint.as_deref(),
            &self.bucket.name(),
            &self.region,
            key,
        )
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, file_name: &str, content_type: &str, data: &[u8]) -> Result<String> {
        let key = original_key(file_name, timestamp_millis());

        debug!(key = %key, content_type = %content_type, size = data.len(), "Uploading image to S3");

        self.bucket
            .put_object_with_content_type(&key, data, content_type)
            .await
            .context("Failed to upload image to S3")?;

        Ok(thumbnail_url(&self.public_url(&key)))
    }
}

impl std::fmt::Debug for S3ImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ImageStore")
            .field("bucket", &self.bucket.name())
            .field("region", &self.region)
            .finish()
    }
}

/// Region for the bucket handle.
///
/// Without a custom endpoint the name must be a known AWS region.
fn resolve_region(region: &str, endpoint: Option<&str>) -> Result<Region> {
    if let Some(endpoint) = endpoint {
        return Ok(Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        });
    }

    let parsed: Region = region
        .parse()
        .map_err(|e| anyhow::anyhow!("Cannot parse region '{region}': {e}"))?;
    if matches!(parsed, Region::Custom { .. }) {
        anyhow::bail!("Unknown AWS region '{region}'; set S3_ENDPOINT for custom regions");
    }
    Ok(parsed)
}

/// Object key for a freshly uploaded original.
fn original_key(file_name: &str, millis: i64) -> String {
    format!("original/{millis}_{}", base_name(file_name))
}

/// Public URL of an object, with the key percent-encoded per path segment.
fn object_url(endpoint: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    let encoded = encoded.join("/");

    match endpoint {
        Some(endpoint) => format!("{}/{bucket}/{encoded}", endpoint.trim_end_matches('/')),
        None => format!("https://{bucket}.s3.{region}.amazonaws.com/{encoded}"),
    }
}

/// Swap the `/original/` segment for `/thumb/`.
fn thumbnail_url(url: &str) -> String {
    url.replacen("/original/", "/thumb/", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_region() {
        assert!(matches!(
            resolve_region("ap-northeast-2", None).unwrap(),
            Region::ApNortheast2
        ));
        assert!(matches!(
            resolve_region("us-east-1", Some("http://minio:9000")).unwrap(),
            Region::Custom { .. }
        ));
        assert!(resolve_region("seoul-please", None).is_err());
        assert!(resolve_region("", None).is_err());
    }

    #[test]
    fn test_original_key() {
        assert_eq!(
            original_key("cat.png", 1_700_000_000_000),
            "original/1700000000000_cat.png"
        );
        assert_eq!(
            original_key("../secret/cat.png", 1),
            "original/1_cat.png"
        );
    }

    #[test]
    fn test_object_url_aws() {
        assert_eq!(
            object_url(None, "bucket", "ap-northeast-2", "original/1_my cat.png"),
            "https://bucket.s3.ap-northeast-2.amazonaws.com/original/1_my%20cat.png"
        );
    }

    #[test]
    fn test_object_url_custom_endpoint() {
        assert_eq!(
            object_url(Some("http://minio:9000/"), "bucket", "us-east-1", "original/1_a.png"),
            "http://minio:9000/bucket/original/1_a.png"
        );
    }

    #[test]
    fn test_thumbnail_url() {
        assert_eq!(
            thumbnail_url("https://b.s3.amazonaws.com/original/1_a.png"),
            "https://b.s3.amazonaws.com/thumb/1_a.png"
        );
        // Only the first occurrence is rewritten.
        assert_eq!(
            thumbnail_url("https://b/original/1_original/.png"),
            "https://b/thumb/1_original/.png"
        );
    }
}
