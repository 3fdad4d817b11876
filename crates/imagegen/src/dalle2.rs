//! OpenAI DALL·E 2 backend.
//!
//! Expansions use `POST /v1/images/edits` with the source tile as the image
//! and a half-transparent mask (see [`crate::mask`]); initial tiles use
//! `POST /v1/images/generations`. Rate limits and server errors are retried
//! with exponential backoff. The returned image URL is downloaded and
//! re-stored through [`ObjectStorage`], since OpenAI URLs expire.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::mask::{edit_mask, encode_png, prepare_reference};
use crate::provider::{
    normalize_size, ExpandRequest, GeneratedImage, GenerationError, ImageGenerator, InitialRequest,
};
use crate::reference::load_reference;
use crate::storage::{new_png_filename, ObjectStorage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const MODEL: &str = "dall-e-2";

/// Total attempts per API call.
const MAX_ATTEMPTS: u32 = 3;

/// Backoff before retry `n` (0-based) is `BASE_BACKOFF * 2^n`.
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// HTTP timeout for a single request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

pub struct Dalle2Generator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    storage: Arc<dyn ObjectStorage>,
    public_dir: PathBuf,
}

impl Dalle2Generator {
    pub fn new(
        api_key: String,
        storage: Arc<dyn ObjectStorage>,
        public_dir: PathBuf,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            storage,
            public_dir,
        })
    }

    /// Point the client at a different API host (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn edit(
        &self,
        reference_png: &[u8],
        mask_png: &[u8],
        prompt: &str,
        size: u32,
    ) -> Result<String, GenerationError> {
        let form = Form::new()
            .text("model", MODEL)
            .text("prompt", prompt.to_string())
            .text("n", "1")
            .text("size", size_param(size))
            .part(
                "image",
                Part::bytes(reference_png.to_vec())
                    .file_name("reference.png")
                    .mime_str("image/png")?,
            )
            .part(
                "mask",
                Part::bytes(mask_png.to_vec())
                    .file_name("mask.png")
                    .mime_str("image/png")?,
            );

        let response = self
            .client
            .post(format!("{}/v1/images/edits", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        Self::image_url(response).await
    }

    async fn create(&self, prompt: &str, size: u32) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": MODEL,
            "prompt": prompt,
            "n": 1,
            "size": size_param(size),
        });
        let response = self
            .client
            .post(format!("{}/v1/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        Self::image_url(response).await
    }

    /// Download the generated image and store it.
    async fn persist(&self, url: &str) -> Result<GeneratedImage, GenerationError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: "Failed to download generated image".to_string(),
            });
        }
        let bytes = response.bytes().await?;
        let image_path = self.storage.upload(&bytes, &new_png_filename()).await?;
        Ok(GeneratedImage { image_path })
    }

    // ---- private helpers ----

    async fn image_url(response: reqwest::Response) -> Result<String, GenerationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: ImagesResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or(GenerationError::MissingImage)
    }
}

fn size_param(size: u32) -> String {
    format!("{size}x{size}")
}

pub(crate) fn backoff_for(attempt: u32) -> Duration {
    BASE_BACKOFF * 2u32.pow(attempt)
}

/// Run `op` up to [`MAX_ATTEMPTS`] times, sleeping between retryable failures.
async fn with_retry<T, F, Fut>(what: &str, mut op: F) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                let delay = backoff_for(attempt);
                tracing::warn!(
                    what,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Image API call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[async_trait]
impl ImageGenerator for Dalle2Generator {
    fn name(&self) -> &'static str {
        "dalle2"
    }

    async fn generate(&self, request: &ExpandRequest) -> Result<GeneratedImage, GenerationError> {
        let size = normalize_size(request.size);
        let raw = load_reference(&self.client, &self.public_dir, &request.reference_image_url).await?;
        let reference_png = prepare_reference(&raw, size)?;
        let mask_png = encode_png(DynamicImage::ImageRgba8(edit_mask(size, request.direction)))?;
        let prompt = request.prompt.render();

        let url = with_retry("images.edit", || {
            self.edit(&reference_png, &mask_png, &prompt, size)
        })
        .await?;
        self.persist(&url).await
    }

    async fn generate_initial(
        &self,
        request: &InitialRequest,
    ) -> Result<GeneratedImage, GenerationError> {
        let size = normalize_size(request.size);
        let prompt = request.prompt.render();

        let url = with_retry("images.generate", || self.create(&prompt, size)).await?;
        self.persist(&url).await
    }
}
