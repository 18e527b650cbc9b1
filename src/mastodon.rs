//! Publishing to Mastodon: media upload followed by a status post.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use tracing::info;

/// Seam for the posting service.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    /// Upload `image` with `alt_text`, then publish `status` referencing it.
    /// The two steps are dependent; an upload failure must prevent the post.
    async fn post_image(&self, image: &[u8], status: &str, alt_text: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct MastodonClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for MastodonClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MastodonClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    id: String,
}

impl MastodonClient {
    pub fn new(base_url: &str, token: String) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid Mastodon base URL")?;
        let http = Client::builder()
            .user_agent("birdbot/0.1")
            .build()
            .expect("reqwest client");
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    async fn upload_media(&self, image: &[u8], alt_text: &str) -> Result<String> {
        let endpoint = self
            .base_url
            .join("api/v2/media")
            .context("invalid Mastodon base URL")?;
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(image.to_vec())
                    .file_name("image.png")
                    .mime_str("image/png")?,
            )
            .text("description", alt_text.to_string());

        let res = self
            .http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .multipart(form)
            .send()
            .await
            .context("failed to upload media")?;

        // 202 means the attachment is still processing; for a PNG it is
        // usable immediately, so any 2xx is accepted.
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("media upload failed {}: {}", status, body));
        }

        let payload: MediaUploadResponse = res
            .json()
            .await
            .context("invalid media upload response JSON")?;
        Ok(payload.id)
    }

    async fn create_status(&self, status: &str, media_id: &str) -> Result<()> {
        let endpoint = self
            .base_url
            .join("api/v1/statuses")
            .context("invalid Mastodon base URL")?;
        let body = json!({
            "status": status,
            "media_ids": [media_id],
        });

        let res = self
            .http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await
            .context("failed to post status")?;

        if !res.status().is_success() {
            let status_code = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("status post failed {}: {}", status_code, body));
        }
        Ok(())
    }
}

#[async_trait]
impl StatusPublisher for MastodonClient {
    async fn post_image(&self, image: &[u8], status: &str, alt_text: &str) -> Result<()> {
        info!("uploading image to Mastodon");
        let media_id = self.upload_media(image, alt_text).await?;
        info!(%media_id, "image uploaded; posting status");
        self.create_status(status, &media_id).await?;
        info!("status posted");
        Ok(())
    }
}
