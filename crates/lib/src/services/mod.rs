//! External AI service clients behind a uniform result contract.
//!
//! Each client checks its credential once at construction; calls on an
//! unconfigured client return [`ServiceError::Unavailable`] without touching
//! the network. All other failures map onto the typed error below — clients
//! never panic and never leak raw API bodies to callers' users.

mod background;
mod gemini;
mod vision;

pub use background::RemoveBgClient;
pub use gemini::GeminiClient;
pub use vision::VisionClient;

use async_trait::async_trait;
use thiserror::Error;

/// Typed failure for any service call.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Credential absent; the backend was never contacted.
    #[error("{service} is not configured")]
    Unavailable { service: &'static str },

    /// The per-call timeout elapsed.
    #[error("{service} request timed out")]
    Timeout { service: &'static str },

    /// Non-2xx response or a malformed/empty body. `detail` is for logs only.
    #[error("{service} error: {detail}")]
    Backend { service: &'static str, detail: String },

    /// Background removal only: the image stayed over the upload limit after
    /// every recompression attempt.
    #[error("image is too large even after recompression")]
    TooLarge,

    /// Unexpected local fault (decode failure, request construction).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Map a reqwest error, distinguishing elapsed timeouts.
    pub(crate) fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout { service }
        } else {
            ServiceError::Backend {
                service,
                detail: err.to_string(),
            }
        }
    }
}

/// Presence-of-credential probe shared by all service clients (and the
/// Telegram channel). Checked at construction, re-read on demand by the
/// status reporter.
pub trait Capability: Send + Sync {
    /// Stable name used as the key in availability maps ("gemini", "vision", ...).
    fn service_name(&self) -> &'static str;
    /// True iff the backing credential is configured.
    fn available(&self) -> bool;
}

/// Text generation backend: conversational replies plus a multimodal
/// image-description mode (the analysis fallback).
#[async_trait]
pub trait TextGenerator: Capability {
    /// Generate a reply to `prompt`. The optional language hint is folded into
    /// the prompt context, not translated locally.
    async fn generate(&self, prompt: &str, language_hint: Option<&str>) -> Result<String, ServiceError>;

    /// Describe an image using the backend's multimodal mode.
    async fn describe_image(&self, image: &[u8]) -> Result<String, ServiceError>;
}

/// Vision backend: structured analysis of one image, aggregated to a summary.
#[async_trait]
pub trait ImageAnalyzer: Capability {
    async fn analyze(&self, image: &[u8]) -> Result<String, ServiceError>;
}

/// Background-removal backend: returns the processed image bytes.
#[async_trait]
pub trait BackgroundRemover: Capability {
    async fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>, ServiceError>;
}
