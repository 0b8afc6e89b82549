use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use tracing::debug;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("cannot identify image file: {0}")]
    Decode(String),
    #[error("{0}")]
    Generation(String),
}

// ── Image intake ─────────────────────────────────────────────────────────────

/// Decode an image from disk and convert it to RGB.
pub async fn open_image(path: &Path) -> Result<DynamicImage, CaptionError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(&path).map_err(|e| CaptionError::Decode(e.to_string()))?;
        let image =
            image::load_from_memory(&bytes).map_err(|e| CaptionError::Decode(e.to_string()))?;
        Ok::<_, CaptionError>(DynamicImage::ImageRgb8(image.to_rgb8()))
    })
    .await
    .map_err(|e| CaptionError::Decode(e.to_string()))?
}

// ── Generator seam ───────────────────────────────────────────────────────────

#[async_trait]
pub trait CaptionGenerator: Send + Sync {
    async fn describe(&self, image: &DynamicImage) -> Result<String, CaptionError>;
}

// ── Hugging Face inference ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

/// Captioner backed by a hosted BLIP model. Built once at startup and
/// shared across requests; the underlying client is safe for concurrent use.
pub struct HfCaptioner {
    client: reqwest::Client,
    model_url: String,
    token: Option<String>,
}

impl HfCaptioner {
    pub fn new(
        endpoint: &str,
        model: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CaptionError> {
        let client = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .map_err(|e| CaptionError::Generation(e.to_string()))?;

        Ok(Self {
            client,
            model_url: format!("{}/{}", endpoint.trim_end_matches('/'), model),
            token,
        })
    }

    pub fn model_url(&self) -> &str {
        &self.model_url
    }
}

#[async_trait]
impl CaptionGenerator for HfCaptioner {
    async fn describe(&self, image: &DynamicImage) -> Result<String, CaptionError> {
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .map_err(|e| CaptionError::Generation(e.to_string()))?;

        let mut request = self
            .client
            .post(&self.model_url)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CaptionError::Generation(format!("TimeoutError: {}", e))
            } else {
                CaptionError::Generation(format!("RequestError: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("caption model responded {}: {}", status, body);
            return Err(CaptionError::Generation(format!(
                "model returned HTTP {}",
                status.as_u16()
            )));
        }

        let outputs: Vec<GeneratedText> = response
            .json()
            .await
            .map_err(|e| CaptionError::Generation(format!("unexpected model output: {}", e)))?;
        debug!("caption model returned {} candidate(s)", outputs.len());

        outputs
            .into_iter()
            .map(|o| o.generated_text.trim().to_string())
            .find(|text| !text.is_empty())
            .ok_or_else(|| CaptionError::Generation("model returned no caption".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use image::RgbImage;

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([200, 20, 20])))
    }

    fn captioner(server: &MockServer, token: Option<&str>) -> HfCaptioner {
        HfCaptioner::new(
            &server.url("/models"),
            "Salesforce/blip-image-captioning-base",
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_jpeg_and_reads_generated_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/Salesforce/blip-image-captioning-base")
                    .header("content-type", "image/jpeg")
                    .header("authorization", "Bearer hf_test");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"[{"generated_text": " a man wearing a red shirt "}]"#);
            })
            .await;

        let caption = captioner(&server, Some("hf_test"))
            .describe(&red_square())
            .await
            .unwrap();

        assert_eq!(caption, "a man wearing a red shirt");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upstream_error_is_a_generation_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503).body(r#"{"error": "Model is currently loading"}"#);
            })
            .await;

        let err = captioner(&server, None).describe(&red_square()).await.unwrap_err();
        assert!(matches!(err, CaptionError::Generation(ref msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn empty_caption_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).body(r#"[{"generated_text": "   "}]"#);
            })
            .await;

        let err = captioner(&server, None).describe(&red_square()).await.unwrap_err();
        assert!(matches!(err, CaptionError::Generation(_)));
    }

    #[tokio::test]
    async fn malformed_model_output_is_a_generation_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"caption": "not the expected shape"}"#);
            })
            .await;

        let err = captioner(&server, None).describe(&red_square()).await.unwrap_err();
        assert!(matches!(err, CaptionError::Generation(ref msg) if msg.starts_with("unexpected model output")));
    }

    #[tokio::test]
    async fn opens_valid_png_and_rejects_text() {
        let dir = tempfile::tempdir().unwrap();

        let png = dir.path().join("shirt.png");
        red_square().save_with_format(&png, ImageFormat::Png).unwrap();
        let image = open_image(&png).await.unwrap();
        assert_eq!((image.width(), image.height()), (8, 8));

        let fake = dir.path().join("notes.jpg");
        std::fs::write(&fake, b"definitely not an image").unwrap();
        assert!(matches!(open_image(&fake).await, Err(CaptionError::Decode(_))));
    }
}
