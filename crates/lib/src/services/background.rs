//! remove.bg client with bounded pre-send recompression.
//!
//! The API rejects uploads over ~12 MB, so oversized images are re-encoded
//! as JPEG along a fixed descending quality ladder (after capping the longest
//! side at 2048 px, aspect ratio preserved). The ladder bounds the number of
//! attempts; exhausting it returns [`ServiceError::TooLarge`].

use crate::services::{BackgroundRemover, Capability, ServiceError};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.remove.bg/v1.0";
const SERVICE: &str = "remove.bg";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upload limit enforced before sending.
const MAX_UPLOAD_BYTES: usize = 12 * 1024 * 1024;
/// Recompression target, slightly under the upload limit.
const SHRINK_TARGET_BYTES: usize = 10 * 1024 * 1024;
/// Longest side after recompression.
const MAX_DIMENSION: u32 = 2048;
/// JPEG qualities tried in order; the ladder length bounds the attempts.
const QUALITY_LADDER: [u8; 4] = [85, 65, 45, 25];

/// Client for the remove.bg REST API.
#[derive(Clone)]
pub struct RemoveBgClient {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl RemoveBgClient {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            api_key,
            base_url,
            client,
        }
    }
}

impl Capability for RemoveBgClient {
    fn service_name(&self) -> &'static str {
        SERVICE
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl BackgroundRemover for RemoveBgClient {
    async fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>, ServiceError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(ServiceError::Unavailable { service: SERVICE });
        };
        let payload = if image.len() > MAX_UPLOAD_BYTES {
            shrink_image(image, SHRINK_TARGET_BYTES)?
        } else {
            image.to_vec()
        };

        let part = reqwest::multipart::Part::bytes(payload)
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("size", "auto")
            .text("format", "png")
            .part("image_file", part);

        let url = format!("{}/removebg", self.base_url);
        let res = self
            .client
            .post(&url)
            .header("X-Api-Key", key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ServiceError::Backend {
                service: SERVICE,
                detail: format!("status {}: {}", status, error_title(&body)),
            });
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
        Ok(bytes.to_vec())
    }
}

/// First error title from a remove.bg error body, or a placeholder.
fn error_title(body: &str) -> String {
    serde_json::from_str::<RemoveBgErrorBody>(body)
        .ok()
        .and_then(|b| b.errors.into_iter().next())
        .and_then(|e| e.title)
        .unwrap_or_else(|| "no error detail".to_string())
}

#[derive(Debug, Deserialize)]
struct RemoveBgErrorBody {
    #[serde(default)]
    errors: Vec<RemoveBgErrorItem>,
}

#[derive(Debug, Deserialize)]
struct RemoveBgErrorItem {
    #[serde(default)]
    title: Option<String>,
}

/// Re-encode `data` as JPEG under `max_bytes`: cap the longest side at
/// [`MAX_DIMENSION`] (aspect ratio preserved), then walk the quality ladder.
/// At most `QUALITY_LADDER.len()` encode attempts; still oversized => TooLarge.
pub(crate) fn shrink_image(data: &[u8], max_bytes: usize) -> Result<Vec<u8>, ServiceError> {
    let img = image::load_from_memory(data)
        .map_err(|e| ServiceError::Internal(format!("image decode failed: {}", e)))?;
    let (width, height) = img.dimensions();
    let img = if width > MAX_DIMENSION || height > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };
    // JPEG has no alpha.
    let rgb = img.to_rgb8();

    for quality in QUALITY_LADDER {
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .encode_image(&rgb)
            .map_err(|e| ServiceError::Internal(format!("jpeg encode failed: {}", e)))?;
        if out.len() <= max_bytes {
            log::info!(
                "image recompressed from {} to {} bytes (quality {})",
                data.len(),
                out.len(),
                quality
            );
            return Ok(out);
        }
    }
    Err(ServiceError::TooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .expect("encode png");
        out
    }

    #[test]
    fn shrink_fits_under_generous_limit() {
        let data = png_bytes(64, 64);
        let out = shrink_image(&data, 1024 * 1024).expect("shrink");
        assert!(out.len() <= 1024 * 1024);
        // Output decodes as JPEG.
        let decoded = image::load_from_memory(&out).expect("decode output");
        assert_eq!(decoded.dimensions(), (64, 64));
    }

    #[test]
    fn shrink_caps_longest_side_preserving_aspect() {
        let data = png_bytes(3000, 1500);
        let out = shrink_image(&data, 10 * 1024 * 1024).expect("shrink");
        let decoded = image::load_from_memory(&out).expect("decode output");
        assert_eq!(decoded.dimensions(), (2048, 1024));
    }

    #[test]
    fn shrink_gives_up_after_the_quality_ladder() {
        // No valid JPEG fits in 10 bytes, so every ladder step fails and the
        // call must return TooLarge instead of looping.
        let data = png_bytes(64, 64);
        let err = shrink_image(&data, 10).unwrap_err();
        assert!(matches!(err, ServiceError::TooLarge));
    }

    #[test]
    fn shrink_rejects_undecodable_input() {
        let err = shrink_image(&[0, 1, 2, 3], 1024).unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[test]
    fn error_title_from_api_body() {
        let body = r#"{"errors": [{"title": "Insufficient credits"}]}"#;
        assert_eq!(error_title(body), "Insufficient credits");
        assert_eq!(error_title("not json"), "no error detail");
    }

    #[tokio::test]
    async fn unavailable_without_api_key() {
        let client = RemoveBgClient::new(None, None);
        assert!(!client.available());
        let err = client.remove_background(&[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable { service: "remove.bg" }));
    }
}
