//! Intent classification and routing: one inbound update, one adapter, one reply.
//!
//! Classification depends only on the update's type and caption, so the same
//! update always selects the same adapter. Failures become plain-language
//! apologies; raw backend detail goes to the log, never to the user.

use crate::channels::{CommandKind, InboundUpdate};
use crate::services::{BackgroundRemover, Capability, ImageAnalyzer, ServiceError, TextGenerator};
use crate::status::{RelayStats, StatusReporter};
use std::sync::Arc;

/// Caption phrase that selects background removal for an image (case-insensitive).
const REMOVE_BACKGROUND_PHRASE: &str = "remove background";

const WELCOME_TEXT: &str = "Welcome! I can help you with:\n\
- text conversations\n\
- image analysis (send a photo)\n\
- background removal (send a photo captioned \"remove background\")\n\n\
Commands: /start, /help, /status\n\n\
Send a message or an image to get started.";

const HELP_TEXT: &str = "How to use this bot:\n\n\
Text: send any message and I'll reply.\n\n\
Images: send a photo and I'll describe what's in it. Caption it \
\"remove background\" to get the photo back with the background removed.\n\n\
Supported formats: JPEG, PNG, WebP. Maximum size: 20 MB.\n\n\
Commands: /start, /help, /status";

/// Reply produced for one inbound update. Exactly one per update.
#[derive(Debug, Clone)]
pub enum OutboundReply {
    Text(String),
    Photo { image: Vec<u8>, caption: String },
}

/// What an update asks for. Derived from message type and caption only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Command(CommandKind),
    Chat,
    AnalyzeImage,
    RemoveBackground,
}

/// Candidate backend for image analysis, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisBackend {
    Vision,
    /// The text backend's multimodal mode.
    TextModel,
}

/// Explicit fallback order for image analysis: Vision first, then the text
/// backend's multimodal mode. The first *available* candidate is attempted;
/// there is no second attempt if it fails.
pub const ANALYSIS_ORDER: [AnalysisBackend; 2] = [AnalysisBackend::Vision, AnalysisBackend::TextModel];

/// Classify an update. Pure; the sole source of routing decisions.
pub fn classify(update: &InboundUpdate) -> Intent {
    match update {
        InboundUpdate::Command { command, .. } => Intent::Command(*command),
        InboundUpdate::Text { .. } => Intent::Chat,
        InboundUpdate::Image { caption, .. } => {
            if wants_background_removal(caption.as_deref()) {
                Intent::RemoveBackground
            } else {
                Intent::AnalyzeImage
            }
        }
    }
}

fn wants_background_removal(caption: Option<&str>) -> bool {
    caption
        .map(|c| c.to_lowercase().contains(REMOVE_BACKGROUND_PHRASE))
        .unwrap_or(false)
}

/// Routes one inbound update to exactly one adapter and formats the reply.
pub struct Dispatcher {
    text: Arc<dyn TextGenerator>,
    vision: Arc<dyn ImageAnalyzer>,
    background: Arc<dyn BackgroundRemover>,
    stats: Arc<RelayStats>,
    reporter: Arc<StatusReporter>,
    reply_language: Option<String>,
}

impl Dispatcher {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        vision: Arc<dyn ImageAnalyzer>,
        background: Arc<dyn BackgroundRemover>,
        stats: Arc<RelayStats>,
        reporter: Arc<StatusReporter>,
        reply_language: Option<String>,
    ) -> Self {
        Self {
            text,
            vision,
            background,
            stats,
            reporter,
            reply_language,
        }
    }

    /// Handle one update end-to-end. Commands never touch an adapter.
    pub async fn route(&self, update: InboundUpdate) -> OutboundReply {
        self.stats.record_message();
        match (classify(&update), update) {
            (Intent::Command(command), _) => OutboundReply::Text(self.command_reply(command)),
            (Intent::Chat, InboundUpdate::Text { text, .. }) => self.route_text(&text).await,
            (Intent::RemoveBackground, InboundUpdate::Image { image, .. }) => {
                self.stats.record_image();
                self.route_background_removal(&image).await
            }
            (Intent::AnalyzeImage, InboundUpdate::Image { image, .. }) => {
                self.stats.record_image();
                self.route_image_analysis(&image).await
            }
            // classify is total over the enum; no other pairing occurs.
            (_, _) => OutboundReply::Text(HELP_TEXT.to_string()),
        }
    }

    fn command_reply(&self, command: CommandKind) -> String {
        match command {
            CommandKind::Start => WELCOME_TEXT.to_string(),
            CommandKind::Help | CommandKind::Unknown => HELP_TEXT.to_string(),
            CommandKind::Status => self.reporter.command_text(),
        }
    }

    async fn route_text(&self, text: &str) -> OutboundReply {
        match self.text.generate(text, self.reply_language.as_deref()).await {
            Ok(reply) => OutboundReply::Text(reply),
            Err(err) => self.failure("text chat", err),
        }
    }

    async fn route_image_analysis(&self, image: &[u8]) -> OutboundReply {
        let chosen = ANALYSIS_ORDER.iter().copied().find(|backend| match backend {
            AnalysisBackend::Vision => self.vision.available(),
            AnalysisBackend::TextModel => self.text.available(),
        });
        let result = match chosen {
            Some(AnalysisBackend::Vision) => self.vision.analyze(image).await,
            Some(AnalysisBackend::TextModel) => self.text.describe_image(image).await,
            None => Err(ServiceError::Unavailable {
                service: self.vision.service_name(),
            }),
        };
        match result {
            Ok(summary) => OutboundReply::Text(summary),
            Err(err) => self.failure("image analysis", err),
        }
    }

    async fn route_background_removal(&self, image: &[u8]) -> OutboundReply {
        match self.background.remove_background(image).await {
            Ok(processed) => OutboundReply::Photo {
                image: processed,
                caption: "Background removed!".to_string(),
            },
            Err(err) => self.failure("background removal", err),
        }
    }

    fn failure(&self, capability: &str, err: ServiceError) -> OutboundReply {
        self.stats.record_error();
        log::warn!("{} failed: {}", capability, err);
        OutboundReply::Text(apology(capability, &err))
    }
}

/// User-facing failure text: names the degraded capability, never internals.
fn apology(capability: &str, err: &ServiceError) -> String {
    match err {
        ServiceError::Unavailable { .. } => format!(
            "Sorry, {} is not available right now. Please try again later.",
            capability
        ),
        ServiceError::Timeout { .. } => {
            format!("Sorry, {} took too long to respond. Please try again.", capability)
        }
        ServiceError::TooLarge => {
            "Sorry, that image is too large to process. Please send a smaller one.".to_string()
        }
        ServiceError::Backend { .. } | ServiceError::Internal(_) => {
            format!("Sorry, something went wrong with {}. Please try again.", capability)
        }
    }
}
