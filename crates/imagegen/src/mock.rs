//! Offline generator for development and tests.
//!
//! Sleeps for the configured delay, then renders a solid tile whose colour
//! is derived from the prompt. Expansion tiles copy a strip of the reference
//! image along the shared edge so neighbouring tiles visibly line up.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use jigsaw_core::expansion::Prompt;
use jigsaw_core::grid::Direction;

use crate::mask::encode_png;
use crate::provider::{
    normalize_size, ExpandRequest, GeneratedImage, GenerationError, ImageGenerator, InitialRequest,
};
use crate::reference::resolve_public_path;
use crate::storage::{new_png_filename, ObjectStorage};

/// Width of the edge strip copied from the reference, as a fraction of the tile.
const SEAM_DIVISOR: u32 = 8;

pub struct MockGenerator {
    storage: Arc<dyn ObjectStorage>,
    delay: Duration,
    public_dir: Option<PathBuf>,
}

impl MockGenerator {
    pub fn new(storage: Arc<dyn ObjectStorage>, delay: Duration) -> Self {
        Self {
            storage,
            delay,
            public_dir: None,
        }
    }

    /// Read local reference tiles from `public_dir` to draw the seam strip.
    pub fn with_public_dir(mut self, public_dir: impl Into<PathBuf>) -> Self {
        self.public_dir = Some(public_dir.into());
        self
    }

    async fn store(&self, tile: RgbaImage) -> Result<GeneratedImage, GenerationError> {
        let bytes = encode_png(DynamicImage::ImageRgba8(tile))?;
        let image_path = self.storage.upload(&bytes, &new_png_filename()).await?;
        Ok(GeneratedImage { image_path })
    }

    /// The reference tile, if it is a readable local image.
    async fn load_reference(&self, url: &str, size: u32) -> Option<RgbaImage> {
        let public_dir = self.public_dir.as_ref()?;
        let path = resolve_public_path(public_dir, url).ok()?;
        let bytes = tokio::fs::read(path).await.ok()?;
        let decoded = image::load_from_memory(&bytes).ok()?;
        Some(decoded.resize_exact(size, size, imageops::FilterType::Nearest).to_rgba8())
    }
}

/// Deterministic opaque colour for a prompt.
pub fn prompt_color(prompt: &Prompt) -> Rgba<u8> {
    let mut hasher = DefaultHasher::new();
    prompt.render().hash(&mut hasher);
    let [r, g, b, ..] = hasher.finish().to_le_bytes();
    Rgba([r, g, b, 255])
}

/// Copy the strip of `reference` that touches the new tile onto the
/// opposite edge of `tile`.
fn paint_seam(tile: &mut RgbaImage, reference: &RgbaImage, direction: Direction) {
    let size = tile.width();
    let strip = (size / SEAM_DIVISOR).max(1);
    let far = size - strip;
    let (src_x, src_y, w, h, dst_x, dst_y) = match direction {
        Direction::East => (far, 0, strip, size, 0, 0),
        Direction::West => (0, 0, strip, size, far, 0),
        Direction::South => (0, far, size, strip, 0, 0),
        Direction::North => (0, 0, size, strip, 0, far),
    };
    let view = imageops::crop_imm(reference, src_x, src_y, w, h).to_image();
    imageops::replace(tile, &view, i64::from(dst_x), i64::from(dst_y));
}

#[async_trait]
impl ImageGenerator for MockGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, request: &ExpandRequest) -> Result<GeneratedImage, GenerationError> {
        tokio::time::sleep(self.delay).await;

        let size = normalize_size(request.size);
        let mut tile = RgbaImage::from_pixel(size, size, prompt_color(&request.prompt));
        if let Some(reference) = self.load_reference(&request.reference_image_url, size).await {
            paint_seam(&mut tile, &reference, request.direction);
        }
        tracing::debug!(
            direction = %request.direction,
            neighbours = request.adjacent_images.len(),
            "Mock expansion rendered"
        );
        self.store(tile).await
    }

    async fn generate_initial(
        &self,
        request: &InitialRequest,
    ) -> Result<GeneratedImage, GenerationError> {
        tokio::time::sleep(self.delay).await;

        let size = normalize_size(request.size);
        self.store(RgbaImage::from_pixel(size, size, prompt_color(&request.prompt)))
            .await
    }
}
