//! Image generation via the OpenAI images API.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use tracing::info;

use crate::config;

const OPENAI_API_BASE: &str = "https://api.openai.com/";

/// Seam for the image-generation service; the main loop and tests talk to
/// this, not to the concrete client.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image for `prompt` and return its raw bytes.
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: Url,
    api_key: String,
    model: String,
    size: String,
    quality: String,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageResult>,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, cfg: &config::OpenAi) -> Self {
        let base_url = Url::parse(OPENAI_API_BASE).expect("valid default OpenAI URL");
        Self::with_base_url(api_key, cfg, base_url)
    }

    pub fn with_base_url(api_key: String, cfg: &config::OpenAi, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("birdbot/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            api_key,
            model: cfg.model.clone(),
            size: cfg.size.clone(),
            quality: cfg.quality.clone(),
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        info!(prompt, "generating image");
        let endpoint = self
            .base_url
            .join("v1/images/generations")
            .context("invalid image API base URL")?;
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "size": self.size,
            "quality": self.quality,
            "n": 1,
        });

        let res = self
            .http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("failed to reach image API")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("image generation failed {}: {}", status, body));
        }

        let payload: ImagesResponse = res
            .json()
            .await
            .context("invalid image API response JSON")?;
        let first = payload
            .data
            .first()
            .ok_or_else(|| anyhow!("image API returned no results"))?;

        info!(url = %first.url, "image generated; downloading");
        let download = self
            .http
            .get(&first.url)
            .send()
            .await
            .context("failed to download image")?
            .error_for_status()
            .context("image download returned an error status")?;
        let bytes = download
            .bytes()
            .await
            .context("failed to read image bytes")?;
        info!(len = bytes.len(), "image downloaded");
        Ok(bytes.to_vec())
    }
}
