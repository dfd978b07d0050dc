//! Gemini generateContent client: conversational replies and multimodal image description.

use crate::services::{Capability, ServiceError, TextGenerator};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_VISION_MODEL: &str = "gemini-2.5-pro";
const SERVICE: &str = "gemini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed framing for image description requests.
const IMAGE_ANALYSIS_PROMPT: &str = "Describe this image: the main subjects and objects, \
the setting, colors and lighting, any visible text, the overall mood, and notable details. \
Keep the description thorough but concise.";

/// Client for the Gemini REST API.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: Option<String>,
    base_url: String,
    text_model: String,
    vision_model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        text_model: Option<String>,
        vision_model: Option<String>,
    ) -> Self {
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
            text_model: text_model.unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            vision_model: vision_model.unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            client,
        }
    }

    fn api_url(&self, model: &str, key: &str) -> String {
        format!("{}/models/{}:generateContent?key={}", self.base_url, model, key)
    }

    /// POST one generateContent request and extract the first candidate's text.
    async fn generate_content(&self, model: &str, parts: Vec<RequestPart>) -> Result<String, ServiceError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(ServiceError::Unavailable { service: SERVICE });
        };
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts,
            }],
        };
        let res = self
            .client
            .post(self.api_url(model, key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ServiceError::Backend {
                service: SERVICE,
                detail: format!("status {}: {}", status, truncate(&body, 300)),
            });
        }
        let data: GenerateContentResponse = res
            .json()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
        let text = data.text();
        if text.is_empty() {
            return Err(ServiceError::Backend {
                service: SERVICE,
                detail: "empty response".to_string(),
            });
        }
        Ok(text)
    }
}

/// Prompt framing for conversational replies; the language hint is appended
/// rather than translated locally.
fn conversational_prompt(text: &str, language_hint: Option<&str>) -> String {
    let mut prompt = format!(
        "You are a helpful assistant. Provide a clear, informative, and friendly reply \
to the following message:\n\n{}\n\nKeep the reply concise but complete.",
        text
    );
    if let Some(lang) = language_hint {
        prompt.push_str(&format!("\nReply in {}.", lang));
    }
    prompt
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

impl Capability for GeminiClient {
    fn service_name(&self) -> &'static str {
        SERVICE
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, language_hint: Option<&str>) -> Result<String, ServiceError> {
        let framed = conversational_prompt(prompt, language_hint);
        self.generate_content(&self.text_model, vec![RequestPart::text(framed)])
            .await
    }

    async fn describe_image(&self, image: &[u8]) -> Result<String, ServiceError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        self.generate_content(
            &self.vision_model,
            vec![
                RequestPart::inline_image("image/jpeg", encoded),
                RequestPart::text(IMAGE_ANALYSIS_PROMPT.to_string()),
            ],
        )
        .await
    }
}

// Request/response wire types (generateContent subset).

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl RequestPart {
    fn text(text: String) -> Self {
        RequestPart::Text { text }
    }

    fn inline_image(mime_type: &str, data: String) -> Self {
        RequestPart::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.to_string(),
                data,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: ResponseContent,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_language_hint() {
        let prompt = conversational_prompt("Hallo", Some("German"));
        assert!(prompt.contains("Hallo"));
        assert!(prompt.contains("Reply in German."));
        let plain = conversational_prompt("hi", None);
        assert!(!plain.contains("Reply in"));
    }

    #[test]
    fn extracts_candidate_text() {
        let json = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "Hi " }, { "text": "there" } ] } }
            ]
        }"#;
        let res: GenerateContentResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(res.text(), "Hi there");
    }

    #[test]
    fn empty_candidates_yield_empty_text() {
        let res: GenerateContentResponse = serde_json::from_str("{}").expect("parse");
        assert_eq!(res.text(), "");
    }

    #[test]
    fn inline_image_serializes_camel_case() {
        let part = RequestPart::inline_image("image/jpeg", "QUJD".to_string());
        let json = serde_json::to_value(&part).expect("serialize");
        assert_eq!(json["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(json["inlineData"]["data"], "QUJD");
    }

    #[tokio::test]
    async fn unavailable_without_api_key() {
        let client = GeminiClient::new(None, None, None, None);
        assert!(!client.available());
        let err = client.generate("hello", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable { service: "gemini" }));
        let err = client.describe_image(&[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable { .. }));
    }
}
