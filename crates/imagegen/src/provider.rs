//! The generator seam and its request/response types.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use jigsaw_core::expansion::Prompt;
use jigsaw_core::grid::Direction;
use serde::Serialize;

/// Edge lengths the DALL·E 2 endpoints accept for our tiles.
pub const SMALL_TILE: u32 = 256;
pub const LARGE_TILE: u32 = 512;

/// Snap a configured tile size to a supported edge length.
pub fn normalize_size(size: u32) -> u32 {
    if size <= SMALL_TILE {
        SMALL_TILE
    } else {
        LARGE_TILE
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Generate the tile adjacent to an existing one.
#[derive(Debug, Clone)]
pub struct ExpandRequest {
    /// Image of the source tile (a public path like `/generated/x.png` or an
    /// absolute http(s) URL).
    pub reference_image_url: String,
    /// Direction from the source tile to the new one.
    pub direction: Direction,
    pub prompt: Prompt,
    pub size: u32,
    /// Images of tiles already placed next to the target, keyed by the
    /// direction leading from the target to them.
    pub adjacent_images: HashMap<Direction, String>,
}

/// Generate a room's first tile from a prompt alone.
#[derive(Debug, Clone)]
pub struct InitialRequest {
    pub prompt: Prompt,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedImage {
    /// Public path or URL of the stored PNG.
    pub image_path: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The image API returned a non-2xx status code.
    #[error("Image API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Image API response did not contain an image URL")]
    MissingImage,

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A reference path escaped the public directory or was malformed.
    #[error("Invalid image path: {0}")]
    InvalidPath(String),

    #[error("Provider misconfigured: {0}")]
    Config(String),
}

impl GenerationError {
    /// Rate limits and server errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// ImageGenerator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &ExpandRequest) -> Result<GeneratedImage, GenerationError>;

    async fn generate_initial(
        &self,
        request: &InitialRequest,
    ) -> Result<GeneratedImage, GenerationError>;
}

// ---------------------------------------------------------------------------
// GeneratorKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Mock,
    Dalle2,
}

impl FromStr for GeneratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "dalle2" => Ok(Self::Dalle2),
            other => Err(format!(
                "Unknown IMAGE_GEN_PROVIDER '{other}'. Supported: mock, dalle2"
            )),
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mock => "mock",
            Self::Dalle2 => "dalle2",
        })
    }
}
