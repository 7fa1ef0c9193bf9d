use crate::common::constants::{GENRE_KEYWORDS, USER_AGENT};
use crate::common::error::{DiscoveryError, Result};
use crate::common::types::{Event, GeoPoint};
use crate::config::MetroConfig;
use crate::discovery::geo::haversine_km;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Core trait every event source implements.
///
/// `scrape` skips malformed items itself and returns what it could parse. An
/// error means the whole source was unusable (unreachable, unparseable page).
/// A source without credentials returns an empty list instead of failing.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Unique identifier for this source
    fn name(&self) -> &'static str;

    /// Where the source fetches from, for diagnostics
    fn base_url(&self) -> &str;

    /// Fetch and normalize all events from this source
    async fn scrape(&self) -> Result<Vec<Event>>;

    /// Run bookkeeping, updated by the ingestion coordinator
    fn health(&self) -> &SourceHealth;
}

/// Last-run diagnostics for one source
#[derive(Debug, Default)]
pub struct SourceHealth {
    /// Unix millis of the last run, 0 when never run
    last_run_ms: AtomicI64,
    last_run_success: AtomicBool,
    error_count: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceHealthSnapshot {
    pub last_run_time: Option<DateTime<Utc>>,
    pub last_run_success: bool,
    pub error_count: u64,
}

impl SourceHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.last_run_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
        self.last_run_success.store(true, Ordering::Release);
    }

    pub fn record_failure(&self) {
        self.last_run_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
        self.last_run_success.store(false, Ordering::Release);
        self.error_count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn last_run_time(&self) -> Option<DateTime<Utc>> {
        match self.last_run_ms.load(Ordering::Acquire) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    pub fn last_run_success(&self) -> bool {
        self.last_run_success.load(Ordering::Acquire)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> SourceHealthSnapshot {
        SourceHealthSnapshot {
            last_run_time: self.last_run_time(),
            last_run_success: self.last_run_success(),
            error_count: self.error_count(),
        }
    }
}

/// HTTP client with a bounded request timeout
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// GET a URL and return the body, treating non-2xx as an error
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    debug!("GET {}", url);
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Strip markup and collapse runs of whitespace and newlines to single spaces
pub fn clean_text(text: &str) -> String {
    let without_tags = TAGS.replace_all(text, " ");
    WHITESPACE.replace_all(&without_tags, " ").trim().to_string()
}

/// `clean_text`, with empty results mapped to None
pub fn clean_opt(text: Option<&str>) -> Option<String> {
    text.map(clean_text).filter(|s| !s.is_empty())
}

/// First genre keyword contained in `text` (case-insensitive), in list order
pub fn infer_genre(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    GENRE_KEYWORDS
        .iter()
        .find(|k| lower.contains(*k))
        .map(|k| k.to_string())
}

/// Parse a source timestamp into UTC.
///
/// Offset-bearing RFC 3339 values are used as-is; naive date-times and bare
/// dates are read as local time at `utc_offset_hours` (bare dates at midnight).
pub fn parse_timestamp(value: &str, utc_offset_hours: i32) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)?;
    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a coordinate that may arrive as a JSON number or string
pub fn parse_coordinate(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The metro area sources restrict themselves to
#[derive(Debug, Clone, Copy)]
pub struct MetroArea {
    pub center: GeoPoint,
    pub radius_km: f64,
    pub utc_offset_hours: i32,
}

impl MetroArea {
    pub fn from_config(metro: &MetroConfig) -> Self {
        Self {
            center: metro.center(),
            radius_km: metro.radius_km,
            utc_offset_hours: metro.utc_offset_hours,
        }
    }

    /// Events without coordinates are kept; located events must be in range
    pub fn contains(&self, event: &Event) -> bool {
        event
            .location()
            .map(|p| haversine_km(self.center, p) <= self.radius_km)
            .unwrap_or(true)
    }

    /// Drop events located outside the metro area
    pub fn retain(&self, source: &str, events: Vec<Event>) -> Vec<Event> {
        let before = events.len();
        let kept: Vec<Event> = events.into_iter().filter(|e| self.contains(e)).collect();
        if kept.len() < before {
            debug!(
                "{}: dropped {} events outside the metro area",
                source,
                before - kept.len()
            );
        }
        kept
    }
}

/// Missing-field error for one source item
pub fn missing(field: &str) -> DiscoveryError {
    DiscoveryError::MissingField(field.to_string())
}
