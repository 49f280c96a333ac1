//! Image storage for uploads.
//!
//! Uploaded files go through an [`ImageStore`], which persists the bytes and
//! returns the `src` the client should reference in its post.

mod local;
mod s3;

pub use local::LocalImageStore;
pub use s3::S3ImageStore;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::config::{Config, StorageBackend};

/// Backend that persists uploaded images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Short identifier for logging.
    fn name(&self) -> &'static str;

    /// Store one uploaded file and return the `src` the client should use.
    async fn put(&self, file_name: &str, content_type: &str, data: &[u8]) -> Result<String>;
}

/// Build the configured image store.
///
/// # Errors
///
/// Returns an error if the backend cannot be initialized.
pub async fn from_config(config: &Config) -> Result<Arc<dyn ImageStore>> {
    match config.storage_backend {
        StorageBackend::S3 => Ok(Arc::new(S3ImageStore::new(config)?)),
        StorageBackend::Local => {
            let store = LocalImageStore::new(&config.uploads_dir).await?;
            info!(dir = %store.dir().display(), "Storing uploads on local disk");
            Ok(Arc::new(store))
        }
    }
}

/// The final path component of a client-supplied file name.
///
/// Directory parts and names that are empty or `..` are dropped, falling back
/// to `image`.
#[must_use]
pub fn base_name(file_name: &str) -> String {
    let last = file_name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if last.is_empty() || last == "." || last == ".." {
        return "image".to_string();
    }
    last.to_string()
}

/// Milliseconds since the Unix epoch, used to keep stored names unique.
#[must_use]
pub fn timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Content type for an upload, guessed from the name when the client sent none.
#[must_use]
pub fn content_type_for(file_name: &str, declared: Option<&str>) -> String {
    match declared {
        Some(ct) if !ct.is_empty() => ct.to_string(),
        _ => mime_guess::from_path(Path::new(file_name))
            .first_or_octet_stream()
            .to_string(),
    }
}
