use crate::apis::base::{
    clean_opt, clean_text, fetch_text, infer_genre, missing, parse_coordinate, parse_timestamp,
    EventSource, MetroArea, SourceHealth,
};
use crate::common::constants::VENUE_PAGES_SOURCE;
use crate::common::error::{DiscoveryError, Result};
use crate::common::types::Event;
use crate::config::{VenuePage, VenuePagesConfig};
use crate::observability::metrics;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Venue websites that publish schema.org `Event` data as JSON-LD
pub struct VenuePagesSource {
    client: reqwest::Client,
    venues: Vec<VenuePage>,
    base_url: String,
    metro: MetroArea,
    health: SourceHealth,
}

impl VenuePagesSource {
    pub fn new(config: &VenuePagesConfig, metro: MetroArea, client: reqwest::Client) -> Self {
        let base_url = config
            .venues
            .iter()
            .map(|v| v.url.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            client,
            venues: config.venues.clone(),
            base_url,
            metro,
            health: SourceHealth::new(),
        }
    }

    /// Extract events from a venue page's JSON-LD blocks; malformed items are skipped.
    /// A page without any JSON-LD is an error.
    pub fn parse_page(&self, venue: &VenuePage, html: &str) -> Result<Vec<Event>> {
        let document = Html::parse_document(html);
        let selector = Selector::parse(r#"script[type="application/ld+json"]"#)
            .map_err(|e| DiscoveryError::Config(format!("bad selector: {:?}", e)))?;

        let mut blocks = 0usize;
        let mut candidates = Vec::new();
        for element in document.select(&selector) {
            blocks += 1;
            let json_text = element.inner_html();
            match serde_json::from_str::<Value>(json_text.trim()) {
                Ok(value) => collect_event_nodes(value, &mut candidates),
                Err(e) => {
                    warn!("{}: unreadable JSON-LD block: {}", venue.name, e);
                    metrics::ingestion::item_skipped(VENUE_PAGES_SOURCE);
                }
            }
        }
        if blocks == 0 {
            return Err(DiscoveryError::source_failure(
                VENUE_PAGES_SOURCE,
                format!("no JSON-LD found on {}", venue.url),
            ));
        }
        debug!("{}: found {} event nodes", venue.name, candidates.len());

        let mut events = Vec::with_capacity(candidates.len());
        for (i, node) in candidates.iter().enumerate() {
            match self.parse_node(venue, node) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!("{}: skipping event {}: {}", venue.name, i, e);
                    metrics::ingestion::item_skipped(VENUE_PAGES_SOURCE);
                }
            }
        }
        Ok(events)
    }

    fn parse_node(&self, venue: &VenuePage, node: &Value) -> Result<Event> {
        let name = clean_opt(node["name"].as_str()).ok_or_else(|| missing("name"))?;
        let start = node["startDate"].as_str().ok_or_else(|| missing("startDate"))?;
        let date = parse_timestamp(start, self.metro.utc_offset_hours)
            .ok_or_else(|| missing("startDate (unparseable)"))?;

        let location = &node["location"];
        let venue_name = clean_opt(location["name"].as_str()).unwrap_or_else(|| venue.name.clone());
        let url = node["url"].as_str().map(str::to_string);
        let external_id = node["@id"]
            .as_str()
            .map(str::to_string)
            .or_else(|| url.clone())
            .unwrap_or_else(|| {
                let key = format!("{}|{}|{}", venue.url, name, start);
                Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
            });

        let mut event = Event::new(name, venue_name, date, VENUE_PAGES_SOURCE)
            .with_external_id(format!("venue:{}", external_id));

        let geo = &location["geo"];
        event.latitude = parse_coordinate(&geo["latitude"]).or(venue.latitude);
        event.longitude = parse_coordinate(&geo["longitude"]).or(venue.longitude);
        event.description = clean_opt(node["description"].as_str());
        event.ticket_url = first_of(&node["offers"])
            .and_then(|o| o["url"].as_str())
            .map(str::to_string)
            .or(url);
        event.image_url = image_url(&node["image"]);
        event.price = first_of(&node["offers"]).and_then(|o| {
            let price = match &o["price"] {
                Value::String(s) if !s.trim().is_empty() => Some(clean_text(s)),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }?;
            Some(match o["priceCurrency"].as_str() {
                Some(cur) => format!("{} {}", price, cur),
                None => price,
            })
        });
        event.artist = first_of(&node["performer"])
            .and_then(|p| p["name"].as_str())
            .map(clean_text)
            .filter(|s| !s.is_empty());
        event.genre = node["genre"]
            .as_str()
            .map(clean_text)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                infer_genre(&format!(
                    "{} {}",
                    event.name,
                    event.description.as_deref().unwrap_or("")
                ))
            });
        Ok(event)
    }
}

/// The value itself, or the first element if it is an array
fn first_of(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

/// schema.org `image` may be a URL, an ImageObject or a list of either
fn image_url(value: &Value) -> Option<String> {
    match first_of(value)? {
        Value::String(s) => Some(s.clone()),
        obj @ Value::Object(_) => obj["url"].as_str().map(str::to_string),
        _ => None,
    }
}

fn is_event_type(node: &Value) -> bool {
    let matches = |t: &str| t.ends_with("Event");
    match &node["@type"] {
        Value::String(t) => matches(t),
        Value::Array(types) => types.iter().filter_map(|t| t.as_str()).any(matches),
        _ => false,
    }
}

/// Walk top-level arrays and `@graph` containers collecting Event nodes
fn collect_event_nodes(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_event_nodes(item, out);
            }
        }
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                collect_event_nodes(graph, out);
            } else {
                let node = Value::Object(map);
                if is_event_type(&node) {
                    out.push(node);
                }
            }
        }
        _ => {}
    }
}

#[async_trait::async_trait]
impl EventSource for VenuePagesSource {
    fn name(&self) -> &'static str {
        VENUE_PAGES_SOURCE
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self), fields(venues = self.venues.len()))]
    async fn scrape(&self) -> Result<Vec<Event>> {
        if self.venues.is_empty() {
            info!("venue_pages: no venues configured, skipping");
            return Ok(Vec::new());
        }

        let mut all_events = Vec::new();
        let mut failures = 0usize;
        for venue in &self.venues {
            debug!("Fetching venue page {}", venue.url);
            let result = match fetch_text(&self.client, &venue.url).await {
                Ok(html) => self.parse_page(venue, &html),
                Err(e) => Err(e),
            };
            match result {
                Ok(events) => {
                    debug!("{}: {} events", venue.name, events.len());
                    all_events.extend(events);
                }
                Err(e) => {
                    failures += 1;
                    warn!("venue_pages: skipping {}: {}", venue.name, e);
                    metrics::ingestion::request_failed(VENUE_PAGES_SOURCE);
                }
            }
        }

        if failures == self.venues.len() {
            return Err(DiscoveryError::source_failure(
                VENUE_PAGES_SOURCE,
                format!("all {} venue pages failed", failures),
            ));
        }

        let events = self.metro.retain(VENUE_PAGES_SOURCE, all_events);
        info!("Successfully scraped {} events from venue pages", events.len());
        Ok(events)
    }

    fn health(&self) -> &SourceHealth {
        &self.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::GeoPoint;

    fn dawson() -> VenuePage {
        VenuePage {
            name: "The Dawson".to_string(),
            url: "https://dawson.example/events".to_string(),
            latitude: Some(41.8908),
            longitude: Some(-87.6539),
        }
    }

    fn source() -> VenuePagesSource {
        let metro = MetroArea {
            center: GeoPoint::new(41.8781, -87.6298),
            radius_km: 50.0,
            utc_offset_hours: -5,
        };
        let config = VenuePagesConfig {
            venues: vec![dawson()],
        };
        VenuePagesSource::new(&config, metro, reqwest::Client::new())
    }

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head>
<script type="application/ld+json">
{"@context": "https://schema.org", "@type": "Organization", "name": "The Dawson"}
</script>
<script type="application/ld+json">
[
  {"@context": "https://schema.org", "@type": "MusicEvent",
   "name": "Jazz Night @ The Dawson",
   "startDate": "2025-10-03T20:00:00-05:00",
   "description": "Live   quartet\n every Friday",
   "url": "https://dawson.example/e/jazz-night",
   "image": [{"@type": "ImageObject", "url": "https://dawson.example/jazz.jpg"}],
   "offers": {"@type": "Offer", "price": "15", "priceCurrency": "USD"},
   "performer": {"@type": "MusicGroup", "name": "The Dawson Quartet"}},
  {"@type": "Event", "name": "Missing date"}
]
</script>
<script type="application/ld+json">
{"@graph": [{"@type": ["Event"], "name": "Vinyl Brunch", "startDate": "2025-10-05T11:00"}]}
</script>
</head><body></body></html>"#;

    #[test]
    fn test_parse_json_ld_events() {
        let events = source().parse_page(&dawson(), PAGE).unwrap();
        assert_eq!(events.len(), 2);

        let jazz = &events[0];
        assert_eq!(jazz.name, "Jazz Night @ The Dawson");
        assert_eq!(jazz.venue, "The Dawson");
        assert_eq!(
            jazz.external_id.as_deref(),
            Some("venue:https://dawson.example/e/jazz-night")
        );
        assert_eq!(jazz.description.as_deref(), Some("Live quartet every Friday"));
        assert_eq!(jazz.genre.as_deref(), Some("jazz"));
        assert_eq!(jazz.price.as_deref(), Some("15 USD"));
        assert_eq!(jazz.artist.as_deref(), Some("The Dawson Quartet"));
        assert_eq!(jazz.image_url.as_deref(), Some("https://dawson.example/jazz.jpg"));
        assert_eq!(jazz.latitude, Some(41.8908));
        assert_eq!(jazz.date.to_rfc3339(), "2025-10-04T01:00:00+00:00");

        let brunch = &events[1];
        assert_eq!(brunch.name, "Vinyl Brunch");
        assert!(brunch.external_id.as_deref().unwrap().starts_with("venue:"));
        assert!(brunch.genre.is_none());
    }

    #[test]
    fn test_generated_external_id_is_stable() {
        let a = source().parse_page(&dawson(), PAGE).unwrap();
        let b = source().parse_page(&dawson(), PAGE).unwrap();
        assert_eq!(a[1].external_id, b[1].external_id);
    }

    #[test]
    fn test_page_without_json_ld_fails() {
        let err = source()
            .parse_page(&dawson(), "<html><body>Calendar</body></html>")
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Source { .. }));
    }

    #[test]
    fn test_unreachable_page_counts_as_failed_request() {
        let metro = MetroArea {
            center: GeoPoint::new(41.8781, -87.6298),
            radius_km: 50.0,
            utc_offset_hours: -5,
        };
        let config = VenuePagesConfig {
            venues: vec![VenuePage {
                url: "http://127.0.0.1:9/events".to_string(),
                ..dawson()
            }],
        };
        let client = crate::apis::base::http_client(std::time::Duration::from_secs(2)).unwrap();
        let source = VenuePagesSource::new(&config, metro, client);

        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let result = ::metrics::with_local_recorder(&recorder, || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(source.scrape())
        });

        assert!(matches!(result, Err(DiscoveryError::Source { .. })));
        let rendered = handle.render();
        assert!(rendered.contains("sms_source_requests_failed_total{source=\"venue_pages\"} 1"));
        assert!(!rendered.contains("sms_source_items_skipped_total"));
    }

    #[tokio::test]
    async fn test_disabled_without_venues() {
        let metro = MetroArea {
            center: GeoPoint::new(0.0, 0.0),
            radius_km: 10.0,
            utc_offset_hours: 0,
        };
        let empty = VenuePagesSource::new(&VenuePagesConfig::default(), metro, reqwest::Client::new());
        assert!(empty.scrape().await.unwrap().is_empty());
    }
}
