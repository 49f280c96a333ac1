use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{base_name, timestamp_millis, ImageStore};

/// Image store that writes into the uploads directory, which the server also
/// serves statically at `/`.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    dir: PathBuf,
}

impl LocalImageStore {
    /// Create the store, creating the directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn new(dir: &Path) -> Result<Self> {
        if tokio::fs::metadata(dir).await.is_err() {
            info!(dir = %dir.display(), "Uploads directory missing, creating it");
        }
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create uploads directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(&self, file_name: &str, _content_type: &str, data: &[u8]) -> Result<String> {
        let stored = stored_name(file_name, timestamp_millis());
        let path = self.dir.join(&stored);

        debug!(path = %path.display(), size = data.len(), "Writing image to disk");

        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write upload: {}", path.display()))?;

        Ok(stored)
    }
}

/// `{stem}_{millis}{.ext}` for an uploaded file name.
fn stored_name(file_name: &str, millis: i64) -> String {
    let base = base_name(file_name);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{millis}.{ext}"),
        _ => format!("{base}_{millis}"),
    }
}
