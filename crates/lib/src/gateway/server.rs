//! Gateway HTTP server: webhook intake, reply delivery, and the status surface.

use crate::channels::{ChannelHandle, ChannelRegistry, TelegramChannel, TelegramUpdate};
use crate::config::{
    resolve_gemini_api_key, resolve_port, resolve_remove_bg_api_key, resolve_telegram_token,
    resolve_vision_api_key, resolve_webhook_url, Config,
};
use crate::dispatch::{Dispatcher, OutboundReply};
use crate::services::{Capability, GeminiClient, RemoveBgClient, VisionClient};
use crate::status::{RelayStats, StatusReporter};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared state for the gateway (config, dispatcher, status, channels).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub reporter: Arc<StatusReporter>,
    pub stats: Arc<RelayStats>,
    pub channels: Arc<ChannelRegistry>,
    /// Concrete Telegram connector for webhook normalization (photo download).
    pub telegram: Arc<TelegramChannel>,
}

/// Run the gateway; binds to config.gateway.bind and the resolved port.
/// A Telegram bot token is required — without one the relay cannot deliver
/// replies, so startup fails. Missing AI credentials only disable the
/// corresponding service. Blocks until shutdown (Ctrl+C or SIGTERM).
pub async fn run_gateway(config: Config) -> Result<()> {
    let Some(token) = resolve_telegram_token(&config) else {
        anyhow::bail!(
            "telegram bot token is required (set TELEGRAM_BOT_TOKEN or channels.telegram.botToken)"
        );
    };

    let telegram = Arc::new(TelegramChannel::new(
        Some(token),
        config.channels.telegram.api_base.clone(),
    ));
    let gemini = Arc::new(GeminiClient::new(
        resolve_gemini_api_key(&config),
        None,
        config.services.gemini.text_model.clone(),
        config.services.gemini.vision_model.clone(),
    ));
    let vision = Arc::new(VisionClient::new(resolve_vision_api_key(&config), None));
    let background = Arc::new(RemoveBgClient::new(resolve_remove_bg_api_key(&config), None));

    for (name, configured) in [
        ("gemini", gemini.available()),
        ("vision", vision.available()),
        ("remove.bg", background.available()),
    ] {
        if !configured {
            log::warn!("{} credential not configured; the service is disabled", name);
        }
    }

    let stats = Arc::new(RelayStats::default());
    let reporter = Arc::new(StatusReporter::new(
        stats.clone(),
        vec![
            telegram.clone() as Arc<dyn Capability>,
            gemini.clone() as Arc<dyn Capability>,
            vision.clone() as Arc<dyn Capability>,
            background.clone() as Arc<dyn Capability>,
        ],
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        gemini,
        vision,
        background,
        stats.clone(),
        reporter.clone(),
        config.services.gemini.reply_language.clone(),
    ));

    let channels = Arc::new(ChannelRegistry::new());
    channels
        .register(telegram.id().to_string(), telegram.clone())
        .await;

    // Webhook mode: register the externally reachable URL with Telegram now,
    // remove it again on shutdown.
    let webhook_url = resolve_webhook_url(&config);
    let telegram_for_shutdown = if let Some(ref url) = webhook_url {
        let secret = config.channels.telegram.webhook_secret.as_deref();
        if let Err(e) = telegram.set_webhook(url, secret).await {
            log::warn!("telegram set_webhook failed: {}", e);
        } else {
            log::info!("telegram webhook registered: {}", url);
        }
        Some(telegram.clone())
    } else {
        log::info!("no webhook URL configured; expecting updates on POST /webhook");
        None
    };

    let port = resolve_port(&config);
    let state = GatewayState {
        config: Arc::new(config.clone()),
        dispatcher,
        reporter,
        stats,
        channels,
        telegram,
    };

    let app = Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/webhook", post(webhook))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(telegram_for_shutdown))
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Removes the Telegram webhook registration if one was made at startup.
async fn shutdown_signal(telegram_webhook: Option<Arc<TelegramChannel>>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");

    if let Some(t) = telegram_webhook {
        if let Err(e) = t.delete_webhook().await {
            log::debug!("telegram delete_webhook on shutdown: {}", e);
        }
    }
}

/// POST /webhook — receives a Telegram update, verifies the optional secret,
/// and processes it synchronously: normalize, dispatch, deliver the reply.
async fn webhook(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if let Some(ref expected) = state.config.channels.telegram.webhook_secret {
        let provided = headers
            .get("X-Telegram-Bot-Api-Secret-Token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided != expected.as_str() {
            return StatusCode::FORBIDDEN;
        }
    }
    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(_) => return StatusCode::BAD_REQUEST,
    };

    let inbound = match state.telegram.normalize_update(update).await {
        Ok(Some(inbound)) => inbound,
        // Update kinds the relay does not handle (joins, stickers, ...).
        Ok(None) => return StatusCode::OK,
        Err(e) => {
            log::warn!("webhook: normalizing update failed: {}", e);
            state.stats.record_error();
            return StatusCode::OK;
        }
    };

    let chat_id = inbound.chat_id().to_string();
    let reply = state.dispatcher.route(inbound).await;
    let Some(channel) = state.channels.get("telegram").await else {
        return StatusCode::SERVICE_UNAVAILABLE;
    };
    let delivery = match reply {
        OutboundReply::Text(text) => channel.send_text(&chat_id, &text).await,
        OutboundReply::Photo { image, caption } => {
            channel.send_photo(&chat_id, &image, &caption).await
        }
    };
    if let Err(e) = delivery {
        log::warn!("webhook: delivering reply failed: {}", e);
        state.stats.record_error();
    }
    StatusCode::OK
}

/// GET /health — probe-friendly summary.
async fn health(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let payload = state.reporter.report();
    Json(json!({
        "status": payload.status,
        "services": payload.services,
    }))
}

/// GET /status — full availability map plus uptime and counters.
async fn status(State(state): State<GatewayState>) -> Json<crate::status::StatusPayload> {
    Json(state.reporter.report())
}

/// GET / — minimal human-readable dashboard over the same payload.
async fn dashboard(State(state): State<GatewayState>) -> Html<String> {
    let payload = state.reporter.report();
    let rows: String = payload
        .services
        .iter()
        .map(|(name, ok)| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                name,
                if *ok { "available" } else { "unavailable" }
            )
        })
        .collect();
    Html(format!(
        "<!doctype html><html><head><title>Ferry</title></head><body>\
<h1>Ferry</h1>\
<p>Status: {status} &middot; up {uptime}s</p>\
<p>Messages: {messages} &middot; Images: {images} &middot; Errors: {errors}</p>\
<table><tr><th>Service</th><th>State</th></tr>{rows}</table>\
</body></html>",
        status = payload.status,
        uptime = payload.uptime_secs,
        messages = payload.counters.messages_processed,
        images = payload.counters.images_processed,
        errors = payload.counters.errors,
        rows = rows,
    ))
}
