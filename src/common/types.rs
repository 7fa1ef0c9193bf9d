use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A normalized live-music event.
///
/// Sources emit events with `id: None`; the event store assigns the id on insert.
/// `external_id` is the source-scoped identifier used to decide update-vs-insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: Option<Uuid>,
    pub external_id: Option<String>,
    pub name: String,
    pub venue: String,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub ticket_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub genre: Option<String>,
    /// Headline artist when the source knows it
    pub artist: Option<String>,
    pub price: Option<String>,
    /// Name of the source that produced this event
    pub source: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Minimal event with every optional field empty.
    pub fn new(
        name: impl Into<String>,
        venue: impl Into<String>,
        date: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            external_id: None,
            name: name.into(),
            venue: venue.into(),
            date,
            description: None,
            image_url: None,
            ticket_url: None,
            latitude: None,
            longitude: None,
            genre: None,
            artist: None,
            price: None,
            source: source.into(),
            reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_location(mut self, point: GeoPoint) -> Self {
        self.latitude = Some(point.latitude);
        self.longitude = Some(point.longitude);
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Both coordinates, or None if either is missing
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenreWeight {
    pub genre: String,
    #[serde(alias = "count")]
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtistWeight {
    pub name: String,
    #[serde(alias = "count")]
    pub weight: f64,
}

/// Per-user summary of listening behaviour, replaced wholesale on refresh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TasteProfile {
    /// Taken from the request path when stored over HTTP
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub top_genres: Vec<GenreWeight>,
    #[serde(default)]
    pub recent_genres: Vec<GenreWeight>,
    #[serde(default)]
    pub top_artists: Vec<ArtistWeight>,
    #[serde(default)]
    pub mood_score: f64,
    #[serde(default)]
    pub genre_distribution: BTreeMap<String, f64>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl TasteProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            top_genres: Vec::new(),
            recent_genres: Vec::new(),
            top_artists: Vec::new(),
            mood_score: 0.0,
            genre_distribution: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }
}

/// An event annotated with its relevance for one request; never persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredEvent {
    #[serde(flatten)]
    pub event: Event,
    pub relevance_score: f64,
    pub personal_reason: Option<String>,
}

impl ScoredEvent {
    pub fn unscored(event: Event) -> Self {
        Self {
            event,
            relevance_score: 0.0,
            personal_reason: None,
        }
    }
}

/// A track returned by the catalog collaborator; identity is `id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<String>,
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistHandle {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
}
