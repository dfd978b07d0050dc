//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.ferry/config.json`) and environment.
//! Every backend credential can be supplied via its conventional environment
//! variable, which overrides the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Channel settings (Telegram).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// AI service settings (Gemini, Vision, background removal).
    #[serde(default)]
    pub services: ServicesConfig,
}

/// Gateway bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// HTTP port for the webhook and status endpoints (default 8080).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1"; use "0.0.0.0" behind a reverse proxy).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramChannelConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// Externally reachable URL Telegram should POST updates to. Overridden by
    /// WEBHOOK_URL env. When set, the gateway registers it at startup and
    /// removes it on shutdown.
    pub webhook_url: Option<String>,
    /// Optional secret for webhook verification (X-Telegram-Bot-Api-Secret-Token).
    pub webhook_secret: Option<String>,
    /// Bot API base URL override (for tests or custom endpoints).
    pub api_base: Option<String>,
}

/// AI service credentials and model defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub background_removal: BackgroundRemovalConfig,
}

/// Gemini text-generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiConfig {
    /// API key. Overridden by GEMINI_API_KEY env when set.
    pub api_key: Option<String>,
    /// Model for conversational replies (default "gemini-2.5-flash").
    pub text_model: Option<String>,
    /// Model for multimodal image description (default "gemini-2.5-pro").
    pub vision_model: Option<String>,
    /// When set, replies are requested in this language (e.g. "German").
    pub reply_language: Option<String>,
}

/// Google Vision settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionConfig {
    /// API key. Overridden by GOOGLE_VISION_API_KEY env when set.
    pub api_key: Option<String>,
}

/// Background-removal (remove.bg) settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundRemovalConfig {
    /// API key. Overridden by REMOVE_BG_API_KEY env when set.
    pub api_key: Option<String>,
}

/// Non-empty env var value, trimmed.
fn env_override(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the Telegram bot token: env TELEGRAM_BOT_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    env_override("TELEGRAM_BOT_TOKEN").or_else(|| non_empty(config.channels.telegram.bot_token.as_ref()))
}

/// Resolve the webhook URL: env WEBHOOK_URL overrides config.
pub fn resolve_webhook_url(config: &Config) -> Option<String> {
    env_override("WEBHOOK_URL").or_else(|| non_empty(config.channels.telegram.webhook_url.as_ref()))
}

/// Resolve the Gemini API key: env GEMINI_API_KEY overrides config.
pub fn resolve_gemini_api_key(config: &Config) -> Option<String> {
    env_override("GEMINI_API_KEY").or_else(|| non_empty(config.services.gemini.api_key.as_ref()))
}

/// Resolve the Google Vision API key: env GOOGLE_VISION_API_KEY overrides config.
pub fn resolve_vision_api_key(config: &Config) -> Option<String> {
    env_override("GOOGLE_VISION_API_KEY").or_else(|| non_empty(config.services.vision.api_key.as_ref()))
}

/// Resolve the remove.bg API key: env REMOVE_BG_API_KEY (or the legacy
/// BACKGROUNDBG_API_KEY) overrides config.
pub fn resolve_remove_bg_api_key(config: &Config) -> Option<String> {
    env_override("REMOVE_BG_API_KEY")
        .or_else(|| env_override("BACKGROUNDBG_API_KEY"))
        .or_else(|| non_empty(config.services.background_removal.api_key.as_ref()))
}

/// Resolve the listening port: env FERRY_PORT overrides config.
pub fn resolve_port(config: &Config) -> u16 {
    env_override("FERRY_PORT")
        .and_then(|s| s.parse().ok())
        .unwrap_or(config.gateway.port)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("FERRY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".ferry").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the default path (or FERRY_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 8080);
        assert_eq!(g.bind, "127.0.0.1");
    }

    #[test]
    fn parses_service_credentials() {
        let json = r#"{
            "channels": { "telegram": { "botToken": "t0k3n", "webhookSecret": "s" } },
            "services": {
                "gemini": { "apiKey": "g", "replyLanguage": "German" },
                "backgroundRemoval": { "apiKey": "b" }
            }
        }"#;
        let config: Config = serde_json::from_str(json).expect("parse config");
        assert_eq!(config.channels.telegram.bot_token.as_deref(), Some("t0k3n"));
        assert_eq!(config.channels.telegram.webhook_secret.as_deref(), Some("s"));
        assert_eq!(config.services.gemini.api_key.as_deref(), Some("g"));
        assert_eq!(config.services.gemini.reply_language.as_deref(), Some("German"));
        assert_eq!(config.services.background_removal.api_key.as_deref(), Some("b"));
        assert!(config.services.vision.api_key.is_none());
    }

    #[test]
    fn blank_credentials_resolve_to_none() {
        let mut config = Config::default();
        config.services.vision.api_key = Some("   ".to_string());
        assert_eq!(resolve_vision_api_key(&config), None);
    }
}
