use anyhow::Result;
use chrono::{TimeZone, Utc};
use sms_discovery::app::DiscoveryService;
use sms_discovery::common::types::{Event, PlaylistHandle, Track};
use sms_discovery::discovery::mood::AudioFeatures;
use sms_discovery::discovery::{CatalogSearch, Mood, PlaylistCreator, Seed, TrackAdder};
use sms_discovery::pipeline::IngestionCoordinator;
use sms_discovery::storage::{EventStore, InMemoryEventStore, InMemoryTasteProfileStore};
use sms_discovery::DiscoveryError;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Returns up to `available` tracks per seed: `shared` ids common to every
/// seed first, then ids unique to the seed
struct MockCatalog {
    available: usize,
    shared: usize,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, usize, Option<AudioFeatures>)>>,
}

impl MockCatalog {
    fn new(available: usize, shared: usize, failing: &[&str]) -> Self {
        Self {
            available,
            shared,
            failing: failing.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl CatalogSearch for MockCatalog {
    async fn search(
        &self,
        seed: &Seed,
        limit: usize,
        features: Option<AudioFeatures>,
    ) -> sms_discovery::Result<Vec<Track>> {
        self.calls
            .lock()
            .await
            .push((seed.value().to_string(), limit, features));
        if self.failing.contains(seed.value()) {
            return Err(DiscoveryError::catalog(format!("{} unavailable", seed.value())));
        }
        let ids = (0..self.shared)
            .map(|i| format!("shared-{}", i))
            .chain((0..).map(|i| format!("{}-{}", seed.value(), i)));
        Ok(ids
            .take(limit.min(self.available))
            .map(|id| Track {
                name: format!("Track {}", id),
                uri: format!("spotify:track:{}", id),
                artists: vec!["Someone".to_string()],
                id,
            })
            .collect())
    }
}

#[derive(Default)]
struct MockPlaylists {
    created: Mutex<Vec<(String, bool)>>,
    added: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait::async_trait]
impl PlaylistCreator for MockPlaylists {
    async fn create_playlist(
        &self,
        name: &str,
        _description: &str,
        public: bool,
    ) -> sms_discovery::Result<PlaylistHandle> {
        self.created.lock().await.push((name.to_string(), public));
        Ok(PlaylistHandle {
            id: "pl-1".to_string(),
            name: name.to_string(),
            url: Some("https://open.spotify.example/pl-1".to_string()),
        })
    }
}

#[async_trait::async_trait]
impl TrackAdder for MockPlaylists {
    async fn add_tracks(
        &self,
        playlist: &PlaylistHandle,
        track_ids: &[String],
    ) -> sms_discovery::Result<()> {
        self.added
            .lock()
            .await
            .push((playlist.id.clone(), track_ids.to_vec()));
        Ok(())
    }
}

struct Fixture {
    service: DiscoveryService,
    catalog: Arc<MockCatalog>,
    playlists: Arc<MockPlaylists>,
    event_id: Uuid,
}

async fn fixture(event: Event, catalog: MockCatalog) -> Result<Fixture> {
    let store = Arc::new(InMemoryEventStore::new());
    let mut event = event;
    store.insert(&mut event).await?;

    let catalog = Arc::new(catalog);
    let playlists = Arc::new(MockPlaylists::default());
    let coordinator = Arc::new(IngestionCoordinator::new(Vec::new(), store.clone()));
    let service = DiscoveryService::new(
        coordinator,
        store,
        Arc::new(InMemoryTasteProfileStore::new()),
    )
    .with_playlists(catalog.clone(), playlists.clone(), playlists.clone());

    Ok(Fixture {
        service,
        catalog,
        playlists,
        event_id: event.id.unwrap(),
    })
}

fn khruangbin() -> Event {
    let date = Utc.with_ymd_and_hms(2025, 11, 1, 20, 0, 0).unwrap();
    Event::new("Khruangbin Live", "Paramount Theatre", date, "test")
        .with_genre("Psychedelic Rock")
        .with_artist("Khruangbin")
}

fn jazz_night() -> Event {
    let date = Utc.with_ymd_and_hms(2025, 11, 3, 20, 0, 0).unwrap();
    Event::new("Jazz Night", "Tula's", date, "test").with_genre("jazz")
}

#[tokio::test]
async fn test_overlapping_results_are_deduplicated() -> Result<()> {
    let f = fixture(khruangbin(), MockCatalog::new(2, 1, &[])).await?;
    let generated = f
        .service
        .generate_playlist(f.event_id, None, Some(10))
        .await?;

    // Khruangbin, psychedelic-rock, then pop/rock/indie backfill
    let seeds: Vec<&str> = generated.seeds.iter().map(|s| s.value()).collect();
    assert_eq!(
        seeds,
        vec!["Khruangbin", "psychedelic-rock", "pop", "rock", "indie"]
    );
    assert!(matches!(generated.seeds[0], Seed::Artist(_)));

    // five seeds at two tracks each, all sharing "shared-0"
    assert_eq!(generated.tracks.len(), 6);
    let unique: HashSet<&str> = generated.tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(unique.len(), generated.tracks.len());
    assert!(!generated.fallback_used);

    let calls = f.catalog.calls.lock().await;
    assert_eq!(calls.len(), 5);
    assert!(calls.iter().all(|(_, limit, _)| *limit == 2));

    let added = f.playlists.added.lock().await;
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].0, "pl-1");
    assert_eq!(added[0].1.len(), 6);
    Ok(())
}

#[tokio::test]
async fn test_failed_searches_trigger_genre_fallback() -> Result<()> {
    let catalog = MockCatalog::new(1, 0, &["blues", "soul", "funk", "bossanova"]);
    let f = fixture(jazz_night(), catalog).await?;
    let generated = f
        .service
        .generate_playlist(f.event_id, None, Some(10))
        .await?;

    assert!(generated.fallback_used);
    assert_eq!(generated.tracks.len(), 1);
    assert_eq!(generated.tracks[0].id, "jazz-0");

    let calls = f.catalog.calls.lock().await;
    assert_eq!(calls.len(), 6);
    let (seed, limit, _) = calls.last().unwrap();
    assert_eq!(seed, "jazz");
    assert_eq!(*limit, 10);
    Ok(())
}

#[tokio::test]
async fn test_every_search_failing_yields_empty_playlist() -> Result<()> {
    let catalog = MockCatalog::new(5, 0, &["jazz", "blues", "soul", "funk", "bossanova"]);
    let f = fixture(jazz_night(), catalog).await?;
    let generated = f
        .service
        .generate_playlist(f.event_id, None, None)
        .await?;

    assert!(generated.tracks.is_empty());
    assert!(generated.fallback_used);
    assert_eq!(f.playlists.created.lock().await.len(), 1);
    assert!(f.playlists.added.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_mood_features_and_track_count_clamp() -> Result<()> {
    let f = fixture(jazz_night(), MockCatalog::new(200, 0, &[])).await?;
    let generated = f
        .service
        .generate_playlist(f.event_id, Some(Mood::Relaxed), Some(500))
        .await?;

    assert_eq!(generated.tracks.len(), 100);
    assert_eq!(generated.mood, Some(Mood::Relaxed));
    assert_eq!(generated.playlist.name, "Jazz Night · Relaxed");

    let calls = f.catalog.calls.lock().await;
    let relaxed = Mood::Relaxed.target().features;
    assert!(calls.iter().all(|(_, limit, features)| {
        *limit == 20 && *features == Some(relaxed)
    }));
    Ok(())
}

#[tokio::test]
async fn test_unknown_event_and_missing_catalog() -> Result<()> {
    let f = fixture(jazz_night(), MockCatalog::new(1, 0, &[])).await?;
    let err = f
        .service
        .generate_playlist(Uuid::new_v4(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::NotFound(_)));

    let store = Arc::new(InMemoryEventStore::new());
    let bare = DiscoveryService::new(
        Arc::new(IngestionCoordinator::new(Vec::new(), store.clone())),
        store,
        Arc::new(InMemoryTasteProfileStore::new()),
    );
    let err = bare
        .generate_playlist(f.event_id, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Config(_)));
    Ok(())
}
