//! Object storage for generated images.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;

use crate::provider::GenerationError;

/// Sub-directory of the public dir that holds generated tiles.
pub const GENERATED_DIR: &str = "generated";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            other => Err(format!("Unknown STORAGE_PROVIDER '{other}'. Supported: local")),
        }
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `filename` and return the public path or URL.
    async fn upload(&self, bytes: &[u8], filename: &str) -> Result<String, GenerationError>;
}

/// A fresh, collision-free file name for a generated PNG.
pub fn new_png_filename() -> String {
    format!("{}.png", uuid::Uuid::new_v4())
}

/// Writes files to `<public_dir>/generated/` and serves them as
/// `/generated/<file>`. Only suitable for a single instance.
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn new(public_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: public_dir.as_ref().join(GENERATED_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(&self, bytes: &[u8], filename: &str) -> Result<String, GenerationError> {
        let valid = !filename.is_empty()
            && !filename.starts_with('.')
            && !filename.contains(['/', '\\']);
        if !valid {
            return Err(GenerationError::InvalidPath(filename.to_string()));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(filename), bytes).await?;
        tracing::debug!(filename, bytes = bytes.len(), "Stored generated image");
        Ok(format!("/{GENERATED_DIR}/{filename}"))
    }
}
