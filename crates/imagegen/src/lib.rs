//! Image generation and storage backends.
//!
//! - [`ImageGenerator`]: the seam the expansion lifecycle calls.
//! - [`MockGenerator`]: renders a solid tile after a configurable delay.
//! - [`Dalle2Generator`]: OpenAI DALL·E 2 edits and generations.
//! - [`ObjectStorage`] / [`LocalStorage`]: where generated PNGs land.
//!
//! Backends are chosen once at startup from [`GeneratorKind`] and
//! [`StorageKind`]; see [`build_generator`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod dalle2;
pub mod mask;
pub mod mock;
pub mod provider;
pub mod reference;
pub mod storage;

pub use dalle2::Dalle2Generator;
pub use mock::MockGenerator;
pub use provider::{
    ExpandRequest, GeneratedImage, GenerationError, GeneratorKind, ImageGenerator, InitialRequest,
};
pub use storage::{LocalStorage, ObjectStorage, StorageKind};

/// Everything needed to construct the configured backends.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub generator: GeneratorKind,
    pub storage: StorageKind,
    /// Root of the publicly served directory (`public/`).
    pub public_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub mock_delay: Duration,
}

/// Construct the configured storage backend.
pub fn build_storage(config: &ProviderConfig) -> Arc<dyn ObjectStorage> {
    match config.storage {
        StorageKind::Local => Arc::new(LocalStorage::new(&config.public_dir)),
    }
}

/// Construct the configured generator on top of the configured storage.
pub fn build_generator(config: &ProviderConfig) -> Result<Arc<dyn ImageGenerator>, GenerationError> {
    let storage = build_storage(config);
    let generator: Arc<dyn ImageGenerator> = match config.generator {
        GeneratorKind::Mock => Arc::new(
            MockGenerator::new(storage, config.mock_delay).with_public_dir(&config.public_dir),
        ),
        GeneratorKind::Dalle2 => {
            let api_key = config
                .openai_api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    GenerationError::Config("OPENAI_API_KEY must be set for the dalle2 provider".into())
                })?;
            Arc::new(Dalle2Generator::new(api_key, storage, config.public_dir.clone())?)
        }
    };
    tracing::info!(generator = generator.name(), storage = ?config.storage, "Image provider ready");
    Ok(generator)
}
