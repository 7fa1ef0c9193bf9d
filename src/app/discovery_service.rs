use crate::apis::base::http_client;
use crate::apis::create_sources;
use crate::common::constants::{DEFAULT_PLAYLIST_TRACKS, DEFAULT_RADIUS_KM, MAX_PLAYLIST_TRACKS};
use crate::common::error::{DiscoveryError, Result};
use crate::common::types::{Event, PlaylistHandle, ScoredEvent, TasteProfile, Track};
use crate::config::Config;
use crate::discovery::geo::{sort_by_date, GeoQuery};
use crate::discovery::mood::{mood_catalog, Mood, MoodInfo};
use crate::discovery::playlist::{CatalogSearch, PlaylistAssembler, PlaylistCreator, Seed, TrackAdder};
use crate::discovery::scoring::{rank_by_mood, rank_by_taste, recommend_moods, MoodRecommendation};
use crate::infra::spotify::SpotifyClient;
use crate::observability::metrics;
use crate::pipeline::ingestion::{IngestionCoordinator, IngestionStatus, RunOutcome};
use crate::storage::{
    EventStore, InMemoryEventStore, InMemoryTasteProfileStore, TasteProfileStore,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// A created playlist with the tracks that went into it
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPlaylist {
    pub playlist: PlaylistHandle,
    pub tracks: Vec<Track>,
    pub seeds: Vec<Seed>,
    pub mood: Option<Mood>,
    pub fallback_used: bool,
}

struct PlaylistCollaborators {
    assembler: PlaylistAssembler,
    creator: Arc<dyn PlaylistCreator>,
    adder: Arc<dyn TrackAdder>,
}

/// The operations exposed to the HTTP layer and the CLI
pub struct DiscoveryService {
    coordinator: Arc<IngestionCoordinator>,
    events: Arc<dyn EventStore>,
    profiles: Arc<dyn TasteProfileStore>,
    geo: GeoQuery,
    playlists: Option<PlaylistCollaborators>,
    default_track_count: usize,
    public_playlists: bool,
}

impl DiscoveryService {
    pub fn new(
        coordinator: Arc<IngestionCoordinator>,
        events: Arc<dyn EventStore>,
        profiles: Arc<dyn TasteProfileStore>,
    ) -> Self {
        Self {
            coordinator,
            geo: GeoQuery::new(Arc::clone(&events)),
            events,
            profiles,
            playlists: None,
            default_track_count: DEFAULT_PLAYLIST_TRACKS,
            public_playlists: false,
        }
    }

    pub fn with_playlists(
        mut self,
        catalog: Arc<dyn CatalogSearch>,
        creator: Arc<dyn PlaylistCreator>,
        adder: Arc<dyn TrackAdder>,
    ) -> Self {
        self.playlists = Some(PlaylistCollaborators {
            assembler: PlaylistAssembler::new(catalog),
            creator,
            adder,
        });
        self
    }

    pub fn with_playlist_defaults(mut self, track_count: usize, public: bool) -> Self {
        self.default_track_count = track_count.clamp(1, MAX_PLAYLIST_TRACKS);
        self.public_playlists = public;
        self
    }

    /// Wire the service from configuration with in-memory stores.
    /// Playlist generation is enabled only when a Spotify token is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let events: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        let profiles: Arc<dyn TasteProfileStore> = Arc::new(InMemoryTasteProfileStore::new());
        let sources = create_sources(config)?;
        let coordinator = Arc::new(IngestionCoordinator::new(sources, Arc::clone(&events)));

        let mut service = Self::new(coordinator, events, profiles).with_playlist_defaults(
            config.playlist.default_track_count,
            config.spotify.public_playlists,
        );

        let client = http_client(Duration::from_secs(config.ingestion.timeout_seconds))?;
        let spotify = Arc::new(SpotifyClient::new(&config.spotify, client));
        if spotify.is_configured() {
            service = service.with_playlists(spotify.clone(), spotify.clone(), spotify);
        } else {
            info!("Spotify access token not set, playlist generation disabled");
        }
        Ok(service)
    }

    pub fn coordinator(&self) -> Arc<IngestionCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Start a background run; false when one is already active
    pub fn run_ingestion(&self) -> bool {
        self.coordinator.trigger_in_background()
    }

    /// Run ingestion to completion on the caller's task
    pub async fn run_ingestion_now(&self) -> RunOutcome {
        self.coordinator.run_all().await
    }

    pub async fn get_ingestion_status(&self) -> IngestionStatus {
        self.coordinator.status().await
    }

    /// Events near a location, taste-ranked when the user has a stored profile.
    ///
    /// Without a full location every stored event is considered. Without a
    /// stored profile events are returned unscored by start time.
    #[instrument(skip(self))]
    pub async fn query_events(
        &self,
        lat: Option<f64>,
        lng: Option<f64>,
        radius_km: Option<f64>,
        user_id: Option<&str>,
    ) -> Result<Vec<ScoredEvent>> {
        let mut events = self.located_events(lat, lng, radius_km).await?;
        metrics::discovery::candidates(events.len());

        let profile = match user_id.filter(|u| !u.trim().is_empty()) {
            Some(user_id) => self.profiles.get_profile(user_id).await?,
            None => None,
        };
        metrics::discovery::query_served(profile.is_some());

        Ok(match profile {
            Some(profile) => {
                debug!("Ranking {} events for {}", events.len(), profile.user_id);
                rank_by_taste(&events, &profile)
            }
            None => {
                sort_by_date(&mut events);
                events.into_iter().map(ScoredEvent::unscored).collect()
            }
        })
    }

    /// Store a profile for `user_id`, replacing any previous one
    pub async fn put_taste_profile(&self, user_id: &str, mut profile: TasteProfile) -> Result<()> {
        if user_id.trim().is_empty() {
            return Err(DiscoveryError::InvalidInput("user id must not be empty".into()));
        }
        let weights = profile
            .top_genres
            .iter()
            .chain(profile.recent_genres.iter())
            .map(|g| g.weight)
            .chain(profile.top_artists.iter().map(|a| a.weight));
        for weight in weights {
            if !weight.is_finite() {
                return Err(DiscoveryError::InvalidInput(format!(
                    "weight {} is not a finite number",
                    weight
                )));
            }
        }
        profile.user_id = user_id.to_string();
        profile.updated_at = Utc::now();
        self.profiles.put_profile(profile).await
    }

    pub fn list_moods(&self) -> Vec<MoodInfo> {
        mood_catalog()
    }

    /// Moods that suit the user's genres, each with its top events.
    /// A user with no stored profile gets no recommendations.
    pub async fn recommended_moods_for_user(&self, user_id: &str) -> Result<Vec<MoodRecommendation>> {
        let Some(profile) = self.profiles.get_profile(user_id).await? else {
            debug!("No taste profile for {}, no mood recommendations", user_id);
            return Ok(Vec::new());
        };
        let events = self.events.all().await?;
        Ok(recommend_moods(&profile, &events))
    }

    /// Mood-scored events near a location; events with no keyword hits are dropped
    #[instrument(skip(self))]
    pub async fn mood_events(
        &self,
        mood: Mood,
        lat: Option<f64>,
        lng: Option<f64>,
        radius_km: Option<f64>,
    ) -> Result<Vec<ScoredEvent>> {
        let events = self.located_events(lat, lng, radius_km).await?;
        Ok(rank_by_mood(&events, mood))
    }

    /// Assemble tracks for an event, create the playlist and fill it
    #[instrument(skip(self))]
    pub async fn generate_playlist(
        &self,
        event_id: Uuid,
        mood: Option<Mood>,
        track_count: Option<usize>,
    ) -> Result<GeneratedPlaylist> {
        let playlists = self
            .playlists
            .as_ref()
            .ok_or_else(|| DiscoveryError::Config("playlist generation is not configured".into()))?;
        let count = track_count
            .unwrap_or(self.default_track_count)
            .clamp(1, MAX_PLAYLIST_TRACKS);
        let event = self
            .events
            .get(event_id)
            .await?
            .ok_or_else(|| DiscoveryError::NotFound(format!("event {}", event_id)))?;

        let assembled = playlists.assembler.assemble(&event, mood, count).await;

        let name = match mood {
            Some(mood) => format!("{} · {}", event.name, mood.target().label),
            None => event.name.clone(),
        };
        let description = format!(
            "Warm-up for {} at {} on {}",
            event.name,
            event.venue,
            event.date.format("%b %-d, %Y")
        );
        let playlist = playlists
            .creator
            .create_playlist(&name, &description, self.public_playlists)
            .await?;

        if !assembled.tracks.is_empty() {
            let ids: Vec<String> = assembled.tracks.iter().map(|t| t.id.clone()).collect();
            playlists.adder.add_tracks(&playlist, &ids).await?;
        }
        info!(
            "Generated playlist '{}' with {} tracks for event {}",
            playlist.name,
            assembled.tracks.len(),
            event_id
        );

        Ok(GeneratedPlaylist {
            playlist,
            tracks: assembled.tracks,
            seeds: assembled.seeds,
            mood,
            fallback_used: assembled.fallback_used,
        })
    }

    /// Administrative delete; NotFound when no such event exists
    pub async fn delete_event(&self, event_id: Uuid) -> Result<()> {
        if self.events.delete(event_id).await? {
            info!("Deleted event {}", event_id);
            Ok(())
        } else {
            Err(DiscoveryError::NotFound(format!("event {}", event_id)))
        }
    }

    async fn located_events(
        &self,
        lat: Option<f64>,
        lng: Option<f64>,
        radius_km: Option<f64>,
    ) -> Result<Vec<Event>> {
        validate_location(lat, lng, radius_km)?;
        self.geo
            .query(lat, lng, radius_km.unwrap_or(DEFAULT_RADIUS_KM))
            .await
    }
}

fn validate_location(lat: Option<f64>, lng: Option<f64>, radius_km: Option<f64>) -> Result<()> {
    if let Some(lat) = lat {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(DiscoveryError::InvalidInput(format!("latitude {} out of range", lat)));
        }
    }
    if let Some(lng) = lng {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(DiscoveryError::InvalidInput(format!("longitude {} out of range", lng)));
        }
    }
    if let Some(radius) = radius_km {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(DiscoveryError::InvalidInput(format!("radius {} must be positive", radius)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_location() {
        assert!(validate_location(Some(47.6), Some(-122.3), Some(10.0)).is_ok());
        assert!(validate_location(None, None, None).is_ok());
        assert!(validate_location(Some(91.0), Some(0.0), None).is_err());
        assert!(validate_location(Some(0.0), Some(0.0), Some(0.0)).is_err());
        assert!(validate_location(Some(0.0), Some(200.0), None).is_err());
    }
}
