//! Google Vision images:annotate client.
//!
//! One call requests the fixed feature set (labels, text, objects, faces,
//! landmarks, logos, safe-search) and aggregates whatever categories come
//! back into a single summary string. A missing category never fails the
//! call; only a transport failure or an error object on the response does.

use crate::services::{Capability, ImageAnalyzer, ServiceError};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://vision.googleapis.com/v1";
const SERVICE: &str = "vision";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Detected text is truncated to this many characters in the summary.
const MAX_TEXT_CHARS: usize = 200;

/// Client for the Google Vision REST API.
#[derive(Clone)]
pub struct VisionClient {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl VisionClient {
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

impl Capability for VisionClient {
    fn service_name(&self) -> &'static str {
        SERVICE
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl ImageAnalyzer for VisionClient {
    async fn analyze(&self, image: &[u8]) -> Result<String, ServiceError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(ServiceError::Unavailable { service: SERVICE });
        };
        let content = base64::engine::general_purpose::STANDARD.encode(image);
        let body = json!({
            "requests": [{
                "image": { "content": content },
                "features": [
                    { "type": "LABEL_DETECTION", "maxResults": 10 },
                    { "type": "TEXT_DETECTION", "maxResults": 5 },
                    { "type": "OBJECT_LOCALIZATION", "maxResults": 10 },
                    { "type": "FACE_DETECTION", "maxResults": 5 },
                    { "type": "LANDMARK_DETECTION", "maxResults": 5 },
                    { "type": "LOGO_DETECTION", "maxResults": 5 },
                    { "type": "SAFE_SEARCH_DETECTION" }
                ]
            }]
        });
        let url = format!("{}/images:annotate?key={}", self.base_url, key);
        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
        if !res.status().is_success() {
            let status = res.status();
            return Err(ServiceError::Backend {
                service: SERVICE,
                detail: format!("status {}", status),
            });
        }
        let data: BatchAnnotateResponse = res
            .json()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
        let Some(first) = data.responses.into_iter().next() else {
            return Err(ServiceError::Backend {
                service: SERVICE,
                detail: "empty response".to_string(),
            });
        };
        if let Some(error) = &first.error {
            return Err(ServiceError::Backend {
                service: SERVICE,
                detail: error
                    .message
                    .clone()
                    .unwrap_or_else(|| "annotate error".to_string()),
            });
        }
        Ok(summarize(&first))
    }
}

/// Build the one-string summary from whatever categories are present.
fn summarize(res: &AnnotateImageResponse) -> String {
    let mut lines: Vec<String> = Vec::new();

    if !res.label_annotations.is_empty() {
        let labels: Vec<String> = res
            .label_annotations
            .iter()
            .take(5)
            .map(|l| format!("{} ({:.2})", l.description, l.score.unwrap_or(0.0)))
            .collect();
        lines.push(format!("Labels: {}", labels.join(", ")));
    }

    if let Some(text) = res.text_annotations.first() {
        let content = text.description.trim();
        if !content.is_empty() {
            lines.push(format!("Text found: {}", truncate_chars(content, MAX_TEXT_CHARS)));
        }
    }

    if !res.localized_object_annotations.is_empty() {
        let objects: Vec<String> = res
            .localized_object_annotations
            .iter()
            .take(3)
            .map(|o| format!("{} ({:.2})", o.name, o.score.unwrap_or(0.0)))
            .collect();
        lines.push(format!("Objects: {}", objects.join(", ")));
    }

    if !res.face_annotations.is_empty() {
        lines.push(format!("Faces detected: {}", res.face_annotations.len()));
    }

    if !res.landmark_annotations.is_empty() {
        let landmarks: Vec<&str> = res
            .landmark_annotations
            .iter()
            .take(3)
            .map(|l| l.description.as_str())
            .collect();
        lines.push(format!("Landmarks: {}", landmarks.join(", ")));
    }

    if !res.logo_annotations.is_empty() {
        let logos: Vec<&str> = res
            .logo_annotations
            .iter()
            .take(3)
            .map(|l| l.description.as_str())
            .collect();
        lines.push(format!("Logos: {}", logos.join(", ")));
    }

    if let Some(safe) = &res.safe_search_annotation {
        let mut flags: Vec<String> = Vec::new();
        if let Some(level) = flagged_likelihood(safe.adult.as_deref()) {
            flags.push(format!("adult {}", level));
        }
        if let Some(level) = flagged_likelihood(safe.violence.as_deref()) {
            flags.push(format!("violence {}", level));
        }
        if !flags.is_empty() {
            lines.push(format!("Safety: {}", flags.join(", ")));
        }
    }

    if lines.is_empty() {
        "No notable features detected in this image.".to_string()
    } else {
        lines.join("\n")
    }
}

/// Human form of a safe-search likelihood, for POSSIBLE and above.
fn flagged_likelihood(level: Option<&str>) -> Option<&'static str> {
    match level {
        Some("POSSIBLE") => Some("possible"),
        Some("LIKELY") => Some("likely"),
        Some("VERY_LIKELY") => Some("very likely"),
        _ => None,
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

// Response wire types (images:annotate subset).

#[derive(Debug, Deserialize)]
struct BatchAnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    error: Option<ApiStatus>,
    #[serde(default)]
    label_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    localized_object_annotations: Vec<ObjectAnnotation>,
    #[serde(default)]
    face_annotations: Vec<serde_json::Value>,
    #[serde(default)]
    landmark_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    logo_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    safe_search_annotation: Option<SafeSearchAnnotation>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ObjectAnnotation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SafeSearchAnnotation {
    #[serde(default)]
    adult: Option<String>,
    #[serde(default)]
    violence: Option<String>,
}
