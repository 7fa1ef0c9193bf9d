//! Metrics for the discovery engine.
//!
//! Recording goes through the `metrics` facade; `init` installs the Prometheus
//! recorder and `render` produces the text exposition served at `/metrics`.
//! Without `init` every recording call is a no-op, which is what tests rely on.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

use crate::common::error::{DiscoveryError, Result};

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Calling it twice is harmless.
pub fn init() -> Result<()> {
    if HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| DiscoveryError::Config(format!("Failed to install Prometheus recorder: {}", e)))?;
    let _ = HANDLE.set(handle);
    info!("Metrics recorder installed");
    Ok(())
}

/// Prometheus text for the current process, empty if `init` was never called
pub fn render() -> String {
    HANDLE.get().map(|h| h.render()).unwrap_or_default()
}

pub mod ingestion {
    pub fn run_started() {
        ::metrics::counter!("sms_ingestion_runs_total").increment(1);
    }

    pub fn run_skipped() {
        ::metrics::counter!("sms_ingestion_runs_skipped_total").increment(1);
    }

    pub fn run_duration(secs: f64) {
        ::metrics::histogram!("sms_ingestion_run_duration_seconds").record(secs);
    }

    pub fn source_success(source: &str, events: usize) {
        ::metrics::counter!("sms_source_runs_success_total", "source" => source.to_string())
            .increment(1);
        ::metrics::histogram!("sms_source_events_per_run", "source" => source.to_string())
            .record(events as f64);
    }

    pub fn source_error(source: &str) {
        ::metrics::counter!("sms_source_runs_error_total", "source" => source.to_string())
            .increment(1);
    }

    pub fn source_duration(source: &str, secs: f64) {
        ::metrics::histogram!("sms_source_duration_seconds", "source" => source.to_string())
            .record(secs);
    }

    pub fn item_skipped(source: &str) {
        ::metrics::counter!("sms_source_items_skipped_total", "source" => source.to_string())
            .increment(1);
    }

    /// A whole page or per-artist request failed, as opposed to one malformed item
    pub fn request_failed(source: &str) {
        ::metrics::counter!("sms_source_requests_failed_total", "source" => source.to_string())
            .increment(1);
    }

    pub fn event_inserted() {
        ::metrics::counter!("sms_events_inserted_total").increment(1);
    }

    pub fn event_updated() {
        ::metrics::counter!("sms_events_updated_total").increment(1);
    }

    pub fn persist_error() {
        ::metrics::counter!("sms_events_persist_errors_total").increment(1);
    }
}

pub mod discovery {
    pub fn query_served(personalized: bool) {
        let kind = if personalized { "personalized" } else { "default" };
        ::metrics::counter!("sms_event_queries_total", "kind" => kind).increment(1);
    }

    pub fn candidates(count: usize) {
        ::metrics::histogram!("sms_event_query_candidates").record(count as f64);
    }
}

pub mod playlist {
    pub fn seeds_planned(count: usize) {
        ::metrics::histogram!("sms_playlist_seeds").record(count as f64);
    }

    pub fn search_failed() {
        ::metrics::counter!("sms_playlist_search_errors_total").increment(1);
    }

    pub fn fallback_used() {
        ::metrics::counter!("sms_playlist_fallback_searches_total").increment(1);
    }

    pub fn assembled(tracks: usize) {
        ::metrics::counter!("sms_playlists_generated_total").increment(1);
        ::metrics::histogram!("sms_playlist_tracks").record(tracks as f64);
    }
}
