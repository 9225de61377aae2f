//! Screenshot file storage

use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_EXTENSION: &str = "jpg";

/// Image storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded images are written to
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    /// Largest accepted upload in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_upload_path() -> String {
    "./data/uploads".to_string()
}

fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

impl StorageConfig {
    /// Create a new StorageConfig from environment variables
    ///
    /// # Environment Variables
    /// - `IMAGE_UPLOAD_PATH`: Upload directory (default: ./data/uploads)
    /// - `IMAGE_MAX_BYTES`: Upload size limit (default: 10 MiB)
    pub fn from_env() -> Result<Self, common::config::ConfigError> {
        common::config::from_env("IMAGE")
    }
}

/// Writes uploaded images to a directory, one file per image id
#[derive(Debug, Clone)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location for an image, keeping the extension of the uploaded name
    pub fn path_for(&self, image_id: &str, original_filename: &str) -> PathBuf {
        let extension = Path::new(original_filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or(DEFAULT_EXTENSION)
            .to_ascii_lowercase();

        self.root.join(format!("{}.{}", image_id, extension))
    }

    /// Write an image, creating the directory when needed
    pub async fn save(
        &self,
        image_id: &str,
        original_filename: &str,
        bytes: &[u8],
    ) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.path_for(image_id, original_filename);
        tokio::fs::write(&path, bytes).await?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Read a stored image, `None` when the file is gone
    pub async fn read(&self, path: impl AsRef<Path>) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// MIME type for an image path, by extension
pub fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => "image/jpeg",
    }
}
