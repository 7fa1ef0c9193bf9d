use crate::apis::base::{
    clean_opt, clean_text, fetch_text, infer_genre, missing, parse_coordinate, parse_timestamp,
    EventSource, MetroArea, SourceHealth,
};
use crate::common::constants::BANDSINTOWN_SOURCE;
use crate::common::error::{DiscoveryError, Result};
use crate::common::types::Event;
use crate::config::BandsintownConfig;
use crate::observability::metrics;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Bandsintown artist tour dates for a configured artist list
pub struct BandsintownSource {
    client: reqwest::Client,
    app_id: Option<String>,
    base_url: String,
    artists: Vec<String>,
    metro: MetroArea,
    health: SourceHealth,
}

impl BandsintownSource {
    pub fn new(config: &BandsintownConfig, metro: MetroArea, client: reqwest::Client) -> Self {
        Self {
            client,
            app_id: config.app_id.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            artists: config
                .artists
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            metro,
            health: SourceHealth::new(),
        }
    }

    /// `{base}/artists/{artist}/events?app_id=..&date=upcoming`.
    ///
    /// Bandsintown wants `/`, `?` and `*` in artist names escaped twice; the
    /// path segment encoder supplies the second pass.
    fn artist_url(&self, artist: &str, app_id: &str) -> Result<reqwest::Url> {
        let name = artist
            .replace('/', "%2F")
            .replace('?', "%3F")
            .replace('*', "%2A");
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            DiscoveryError::Config(format!("bandsintown base_url '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                DiscoveryError::Config(format!(
                    "bandsintown base_url '{}' cannot take a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["artists", name.as_str(), "events"]);
        url.query_pairs_mut()
            .append_pair("app_id", app_id)
            .append_pair("date", "upcoming");
        Ok(url)
    }

    /// Parse one artist's event list; malformed items are skipped
    pub fn parse_events(&self, artist: &str, body: &str) -> Result<Vec<Event>> {
        let data: Value = serde_json::from_str(body)?;
        let Some(items) = data.as_array() else {
            // Unknown artists come back as an object with an error message
            let message = data["errorMessage"]
                .as_str()
                .or_else(|| data["message"].as_str())
                .unwrap_or("unexpected response shape");
            return Err(DiscoveryError::source_failure(
                BANDSINTOWN_SOURCE,
                format!("{}: {}", artist, message),
            ));
        };

        let mut events = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match self.parse_item(artist, item) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!("bandsintown: skipping {} item {}: {}", artist, i, e);
                    metrics::ingestion::item_skipped(BANDSINTOWN_SOURCE);
                }
            }
        }
        Ok(events)
    }

    fn parse_item(&self, artist: &str, item: &Value) -> Result<Event> {
        let id = match &item["id"] {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return Err(missing("id")),
        };
        let date = item["datetime"]
            .as_str()
            .and_then(|s| parse_timestamp(s, self.metro.utc_offset_hours))
            .ok_or_else(|| missing("datetime"))?;
        let venue = &item["venue"];
        let venue_name = clean_opt(venue["name"].as_str()).ok_or_else(|| missing("venue.name"))?;

        let headliner = item["lineup"]
            .as_array()
            .and_then(|l| l.first())
            .and_then(|a| a.as_str())
            .unwrap_or(artist)
            .to_string();
        let name = clean_opt(item["title"].as_str()).unwrap_or_else(|| {
            let city = venue["city"].as_str().unwrap_or("").trim();
            if city.is_empty() {
                format!("{} at {}", headliner, venue_name)
            } else {
                format!("{} in {}", headliner, clean_text(city))
            }
        });

        let mut event = Event::new(name, venue_name, date, BANDSINTOWN_SOURCE)
            .with_external_id(format!("bit:{}", id))
            .with_artist(headliner);
        event.latitude = parse_coordinate(&venue["latitude"]);
        event.longitude = parse_coordinate(&venue["longitude"]);
        event.description = clean_opt(item["description"].as_str());
        event.ticket_url = item["offers"]
            .as_array()
            .and_then(|o| o.first())
            .and_then(|o| o["url"].as_str())
            .or_else(|| item["url"].as_str())
            .map(str::to_string);
        event.image_url = item["artist"]["image_url"].as_str().map(str::to_string);
        event.genre = infer_genre(&format!(
            "{} {}",
            event.name,
            event.description.as_deref().unwrap_or("")
        ));
        Ok(event)
    }
}

#[async_trait::async_trait]
impl EventSource for BandsintownSource {
    fn name(&self) -> &'static str {
        BANDSINTOWN_SOURCE
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self), fields(artists = self.artists.len()))]
    async fn scrape(&self) -> Result<Vec<Event>> {
        let Some(app_id) = self.app_id.as_deref() else {
            info!("bandsintown: no app_id configured, skipping");
            return Ok(Vec::new());
        };
        if self.artists.is_empty() {
            info!("bandsintown: no artists configured, skipping");
            return Ok(Vec::new());
        }

        let mut all_events = Vec::new();
        let mut failures = 0usize;
        for artist in &self.artists {
            debug!("Fetching Bandsintown events for {}", artist);
            let url = self.artist_url(artist, app_id)?;
            let result = match fetch_text(&self.client, url.as_str()).await {
                Ok(body) => self.parse_events(artist, &body),
                Err(e) => Err(e),
            };
            match result {
                Ok(events) => all_events.extend(events),
                Err(e) => {
                    failures += 1;
                    warn!("bandsintown: skipping artist {}: {}", artist, e);
                    metrics::ingestion::request_failed(BANDSINTOWN_SOURCE);
                }
            }
        }

        if failures == self.artists.len() {
            return Err(DiscoveryError::source_failure(
                BANDSINTOWN_SOURCE,
                format!("all {} artist requests failed", failures),
            ));
        }

        let events = self.metro.retain(BANDSINTOWN_SOURCE, all_events);
        info!("Successfully fetched {} events from Bandsintown", events.len());
        Ok(events)
    }

    fn health(&self) -> &SourceHealth {
        &self.health
    }
}
