use crate::apis::base::{
    clean_opt, clean_text, fetch_text, infer_genre, missing, parse_coordinate, parse_timestamp,
    EventSource, MetroArea, SourceHealth,
};
use crate::common::constants::TICKETMASTER_SOURCE;
use crate::common::error::{DiscoveryError, Result};
use crate::common::types::Event;
use crate::config::TicketmasterConfig;
use crate::observability::metrics;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Ticketmaster Discovery API, music events around the metro center
pub struct TicketmasterSource {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    page_size: u32,
    metro: MetroArea,
    health: SourceHealth,
}

#[derive(Debug, Deserialize)]
struct TmEvent {
    id: String,
    name: String,
    url: Option<String>,
    info: Option<String>,
    description: Option<String>,
    #[serde(rename = "pleaseNote")]
    please_note: Option<String>,
    #[serde(default)]
    images: Vec<TmImage>,
    dates: TmDates,
    #[serde(default)]
    classifications: Vec<TmClassification>,
    #[serde(rename = "priceRanges", default)]
    price_ranges: Vec<TmPriceRange>,
    #[serde(rename = "_embedded")]
    embedded: Option<TmEmbedded>,
}

#[derive(Debug, Deserialize)]
struct TmImage {
    url: String,
    width: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TmDates {
    start: TmStart,
}

#[derive(Debug, Deserialize)]
struct TmStart {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    #[serde(rename = "localDate")]
    local_date: Option<String>,
    #[serde(rename = "localTime")]
    local_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmClassification {
    genre: Option<TmNamed>,
    #[serde(rename = "subGenre")]
    sub_genre: Option<TmNamed>,
}

#[derive(Debug, Deserialize)]
struct TmNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmPriceRange {
    min: Option<f64>,
    max: Option<f64>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmEmbedded {
    #[serde(default)]
    venues: Vec<TmVenue>,
    #[serde(default)]
    attractions: Vec<TmNamed>,
}

#[derive(Debug, Deserialize)]
struct TmVenue {
    name: Option<String>,
    location: Option<TmLocation>,
}

#[derive(Debug, Deserialize)]
struct TmLocation {
    latitude: Value,
    longitude: Value,
}

impl TicketmasterSource {
    pub fn new(config: &TicketmasterConfig, metro: MetroArea, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size.clamp(1, 200),
            metro,
            health: SourceHealth::new(),
        }
    }

    fn search_url(&self, api_key: &str) -> String {
        format!(
            "{}/discovery/v2/events.json?apikey={}&latlong={},{}&radius={}&unit=km&classificationName=music&sort=date,asc&size={}",
            self.base_url,
            api_key,
            self.metro.center.latitude,
            self.metro.center.longitude,
            self.metro.radius_km.ceil() as u64,
            self.page_size
        )
    }

    /// Parse a Discovery API response body; malformed items are skipped
    pub fn parse_events(&self, body: &str) -> Result<Vec<Event>> {
        let data: Value = serde_json::from_str(body)?;
        let Some(items) = data["_embedded"]["events"].as_array() else {
            // An empty result set has no `_embedded` block at all
            if data.get("page").is_some() {
                return Ok(Vec::new());
            }
            return Err(missing("_embedded.events"));
        };

        let mut events = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match self.parse_item(item) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!("ticketmaster: skipping item {}: {}", i, e);
                    metrics::ingestion::item_skipped(TICKETMASTER_SOURCE);
                }
            }
        }
        Ok(events)
    }

    fn parse_item(&self, item: &Value) -> Result<Event> {
        let tm: TmEvent = serde_json::from_value(item.clone())?;

        let date = match (&tm.dates.start.date_time, &tm.dates.start.local_date) {
            (Some(dt), _) => parse_timestamp(dt, self.metro.utc_offset_hours),
            (None, Some(day)) => {
                let local = match &tm.dates.start.local_time {
                    Some(t) => format!("{}T{}", day, t),
                    None => day.clone(),
                };
                parse_timestamp(&local, self.metro.utc_offset_hours)
            }
            (None, None) => None,
        }
        .ok_or_else(|| missing("dates.start"))?;

        let venue = tm.embedded.as_ref().and_then(|e| e.venues.first());
        let venue_name = venue
            .and_then(|v| clean_opt(v.name.as_deref()))
            .ok_or_else(|| missing("_embedded.venues[0].name"))?;

        let mut event = Event::new(clean_text(&tm.name), venue_name, date, TICKETMASTER_SOURCE)
            .with_external_id(format!("tm:{}", tm.id));

        if let Some(loc) = venue.and_then(|v| v.location.as_ref()) {
            event.latitude = parse_coordinate(&loc.latitude);
            event.longitude = parse_coordinate(&loc.longitude);
        }

        event.description = clean_opt(
            tm.description
                .as_deref()
                .or(tm.info.as_deref())
                .or(tm.please_note.as_deref()),
        );
        event.ticket_url = tm.url.clone();
        event.image_url = tm
            .images
            .iter()
            .max_by_key(|img| img.width.unwrap_or(0))
            .map(|img| img.url.clone());
        event.artist = tm
            .embedded
            .as_ref()
            .and_then(|e| e.attractions.first())
            .map(|a| a.name.clone());
        event.genre = tm
            .classifications
            .first()
            .and_then(|c| c.genre.as_ref().or(c.sub_genre.as_ref()))
            .map(|g| g.name.clone())
            .filter(|g| !g.eq_ignore_ascii_case("undefined") && !g.eq_ignore_ascii_case("other"))
            .or_else(|| {
                infer_genre(&format!(
                    "{} {}",
                    event.name,
                    event.description.as_deref().unwrap_or("")
                ))
            });
        event.price = tm.price_ranges.first().and_then(format_price);
        Ok(event)
    }
}

fn format_price(range: &TmPriceRange) -> Option<String> {
    let currency = range.currency.as_deref().unwrap_or("USD");
    match (range.min, range.max) {
        (Some(min), Some(max)) if (max - min).abs() > f64::EPSILON => {
            Some(format!("{:.2}-{:.2} {}", min, max, currency))
        }
        (Some(price), _) | (None, Some(price)) => Some(format!("{:.2} {}", price, currency)),
        (None, None) => None,
    }
}

#[async_trait::async_trait]
impl EventSource for TicketmasterSource {
    fn name(&self) -> &'static str {
        TICKETMASTER_SOURCE
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self))]
    async fn scrape(&self) -> Result<Vec<Event>> {
        let Some(api_key) = self.api_key.as_deref() else {
            info!("ticketmaster: no API key configured, skipping");
            return Ok(Vec::new());
        };

        debug!("Fetching events from Ticketmaster");
        let body = fetch_text(&self.client, &self.search_url(api_key))
            .await
            .map_err(|e| DiscoveryError::source_failure(TICKETMASTER_SOURCE, e.to_string()))?;
        let events = self.parse_events(&body)?;
        let events = self.metro.retain(TICKETMASTER_SOURCE, events);
        info!("Successfully fetched {} events from Ticketmaster", events.len());
        Ok(events)
    }

    fn health(&self) -> &SourceHealth {
        &self.health
    }
}
