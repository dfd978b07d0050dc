//! Process-wide counters and the status reporter behind the HTTP surface.
//!
//! Counters are advisory: the dispatcher increments them, the reporter reads
//! them, routing never depends on them. The reporter re-reads every service's
//! availability on each call, so the payload always reflects live probe state.

use crate::services::Capability;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Advisory counters shared between the dispatcher and the status reporter.
#[derive(Debug, Default)]
pub struct RelayStats {
    messages: AtomicU64,
    images: AtomicU64,
    errors: AtomicU64,
}

impl RelayStats {
    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image(&self) {
        self.images.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            messages_processed: self.messages.load(Ordering::Relaxed),
            images_processed: self.images.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub messages_processed: u64,
    pub images_processed: u64,
    pub errors: u64,
}

/// Full payload for `GET /status` (and the dashboard).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    /// "ok" when every service is available, "degraded" otherwise.
    pub status: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub services: BTreeMap<&'static str, bool>,
    pub counters: CounterSnapshot,
}

/// Aggregates capability probes and counters into status payloads. Pure read.
pub struct StatusReporter {
    stats: Arc<RelayStats>,
    services: Vec<Arc<dyn Capability>>,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl StatusReporter {
    pub fn new(stats: Arc<RelayStats>, services: Vec<Arc<dyn Capability>>) -> Self {
        Self {
            stats,
            services,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Live availability map, one entry per registered service.
    pub fn availability(&self) -> BTreeMap<&'static str, bool> {
        self.services
            .iter()
            .map(|s| (s.service_name(), s.available()))
            .collect()
    }

    pub fn report(&self) -> StatusPayload {
        let services = self.availability();
        let status = if services.values().all(|ok| *ok) {
            "ok"
        } else {
            "degraded"
        };
        StatusPayload {
            status,
            started_at: self.started_at,
            uptime_secs: self.started.elapsed().as_secs(),
            services,
            counters: self.stats.snapshot(),
        }
    }

    /// Plain-text rendering used by the /status chat command.
    pub fn command_text(&self) -> String {
        let payload = self.report();
        let services = payload
            .services
            .iter()
            .map(|(name, ok)| format!("{} {}", name, if *ok { "ok" } else { "unavailable" }))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Bot status: {}\nUptime: {}\nMessages processed: {}\nImages processed: {}\nErrors: {}\nServices: {}",
            payload.status,
            format_uptime(payload.uptime_secs),
            payload.counters.messages_processed,
            payload.counters.images_processed,
            payload.counters.errors,
            services
        )
    }
}

fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    format!("{}d {}h {}m", days, hours, minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe {
        name: &'static str,
        up: bool,
    }

    impl Capability for FixedProbe {
        fn service_name(&self) -> &'static str {
            self.name
        }

        fn available(&self) -> bool {
            self.up
        }
    }

    fn reporter(probes: Vec<(&'static str, bool)>) -> StatusReporter {
        let services: Vec<Arc<dyn Capability>> = probes
            .into_iter()
            .map(|(name, up)| Arc::new(FixedProbe { name, up }) as Arc<dyn Capability>)
            .collect();
        StatusReporter::new(Arc::new(RelayStats::default()), services)
    }

    #[test]
    fn all_available_is_ok() {
        let r = reporter(vec![("gemini", true), ("vision", true)]);
        let payload = r.report();
        assert_eq!(payload.status, "ok");
        assert_eq!(payload.services.len(), 2);
    }

    #[test]
    fn any_unavailable_is_degraded() {
        let r = reporter(vec![("gemini", true), ("vision", false)]);
        assert_eq!(r.report().status, "degraded");
        assert_eq!(r.report().services["vision"], false);
    }

    #[test]
    fn report_is_idempotent_modulo_uptime() {
        let r = reporter(vec![("gemini", true)]);
        let a = r.report();
        let b = r.report();
        assert_eq!(a.status, b.status);
        assert_eq!(a.started_at, b.started_at);
        assert_eq!(a.services, b.services);
        assert_eq!(a.counters, b.counters);
    }

    #[test]
    fn counters_show_up_in_report() {
        let stats = Arc::new(RelayStats::default());
        let r = StatusReporter::new(stats.clone(), Vec::new());
        stats.record_message();
        stats.record_message();
        stats.record_image();
        stats.record_error();
        let payload = r.report();
        assert_eq!(payload.counters.messages_processed, 2);
        assert_eq!(payload.counters.images_processed, 1);
        assert_eq!(payload.counters.errors, 1);
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(0), "0d 0h 0m");
        assert_eq!(format_uptime(3 * 86_400 + 2 * 3_600 + 5 * 60 + 9), "3d 2h 5m");
    }

    #[test]
    fn command_text_lists_services() {
        let r = reporter(vec![("gemini", true), ("vision", false)]);
        let text = r.command_text();
        assert!(text.contains("Bot status: degraded"));
        assert!(text.contains("gemini ok"));
        assert!(text.contains("vision unavailable"));
    }
}
