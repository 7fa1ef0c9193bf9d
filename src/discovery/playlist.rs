//! Playlist assembly: plan seeds from an event and mood, search the catalog
//! once per seed, then merge, dedupe, shuffle and truncate.

use crate::common::constants::{
    related_genres, BACKFILL_GENRES, MAX_SEEDS, MIN_SEEDS,
};
use crate::common::error::Result;
use crate::common::types::{Event, PlaylistHandle, Track};
use crate::discovery::mood::{AudioFeatures, Mood};
use crate::observability::metrics;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// A token that biases a catalog search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Seed {
    Artist(String),
    Genre(String),
}

impl Seed {
    pub fn value(&self) -> &str {
        match self {
            Seed::Artist(v) | Seed::Genre(v) => v,
        }
    }
}

/// Catalog search collaborator
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(
        &self,
        seed: &Seed,
        limit: usize,
        features: Option<AudioFeatures>,
    ) -> Result<Vec<Track>>;
}

/// Playlist-creation collaborator
#[async_trait]
pub trait PlaylistCreator: Send + Sync {
    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<PlaylistHandle>;
}

/// Track-add collaborator
#[async_trait]
pub trait TrackAdder: Send + Sync {
    async fn add_tracks(&self, playlist: &PlaylistHandle, track_ids: &[String]) -> Result<()>;
}

/// Lowercase, trimmed, inner whitespace collapsed to `-` (catalog genre form)
pub fn normalize_genre(genre: &str) -> String {
    genre
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

fn push_unique(seeds: &mut Vec<Seed>, seed: Seed) {
    if seeds.len() >= MAX_SEEDS || seed.value().is_empty() {
        return;
    }
    let exists = seeds
        .iter()
        .any(|s| s.value().eq_ignore_ascii_case(seed.value()));
    if !exists {
        seeds.push(seed);
    }
}

/// Ordered seed list for an event: headline artist, event genre, related genres,
/// mood genres, then generic backfill while fewer than three seeds exist.
/// Never more than five.
pub fn plan_seeds(event: &Event, mood: Option<Mood>) -> Vec<Seed> {
    let mut seeds = Vec::new();

    if let Some(artist) = event.artist.as_deref().map(str::trim) {
        push_unique(&mut seeds, Seed::Artist(artist.to_string()));
    }

    if let Some(genre) = event.genre.as_deref() {
        let genre = normalize_genre(genre);
        let related = related_genres(&genre);
        push_unique(&mut seeds, Seed::Genre(genre));
        for g in related {
            push_unique(&mut seeds, Seed::Genre(g.to_string()));
        }
    }

    if let Some(mood) = mood {
        for g in mood.target().genres {
            push_unique(&mut seeds, Seed::Genre(g.to_string()));
        }
    }

    if seeds.len() < MIN_SEEDS {
        for g in BACKFILL_GENRES {
            push_unique(&mut seeds, Seed::Genre(g.to_string()));
        }
    }

    seeds
}

/// Genre used for the broad fallback search
pub fn primary_genre(event: &Event, seeds: &[Seed]) -> String {
    event
        .genre
        .as_deref()
        .map(normalize_genre)
        .filter(|g| !g.is_empty())
        .or_else(|| {
            seeds.iter().find_map(|s| match s {
                Seed::Genre(g) => Some(g.clone()),
                Seed::Artist(_) => None,
            })
        })
        .unwrap_or_else(|| BACKFILL_GENRES[0].to_string())
}

/// Append tracks whose id has not been seen yet
fn merge_unique(into: &mut Vec<Track>, seen: &mut HashSet<String>, tracks: Vec<Track>) {
    for track in tracks {
        if seen.insert(track.id.clone()) {
            into.push(track);
        }
    }
}

/// Uniform Fisher-Yates shuffle, then keep the first `count`
pub fn shuffle_and_truncate<R: Rng + ?Sized>(
    mut tracks: Vec<Track>,
    count: usize,
    rng: &mut R,
) -> Vec<Track> {
    tracks.shuffle(rng);
    tracks.truncate(count);
    tracks
}

#[derive(Debug, Clone, Serialize)]
pub struct AssembledTracks {
    pub seeds: Vec<Seed>,
    pub tracks: Vec<Track>,
    pub fallback_used: bool,
}

pub struct PlaylistAssembler {
    catalog: Arc<dyn CatalogSearch>,
    rng: Mutex<StdRng>,
}

impl PlaylistAssembler {
    pub fn new(catalog: Arc<dyn CatalogSearch>) -> Self {
        Self {
            catalog,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Use `rng` for shuffling instead of an entropy-seeded one
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Build a deduplicated, shuffled track list of at most `count` tracks.
    ///
    /// Search failures count as zero tracks for that seed; if everything fails
    /// the result is empty rather than an error.
    #[instrument(skip(self, event), fields(event = %event.name))]
    pub async fn assemble(&self, event: &Event, mood: Option<Mood>, count: usize) -> AssembledTracks {
        let seeds = plan_seeds(event, mood);
        metrics::playlist::seeds_planned(seeds.len());
        let features = mood.map(|m| m.target().features);
        let per_seed = count.div_ceil(seeds.len().max(1)).max(1);
        debug!("Searching {} seeds for {} tracks each", seeds.len(), per_seed);

        let results = self.search_all(&seeds, per_seed, features).await;

        let mut seen = HashSet::new();
        let mut tracks = Vec::new();
        for batch in results {
            merge_unique(&mut tracks, &mut seen, batch);
        }

        let mut fallback_used = false;
        if tracks.len() * 2 < count {
            let genre = primary_genre(event, &seeds);
            info!(
                "Only {} tracks for a target of {}, falling back to genre '{}'",
                tracks.len(),
                count,
                genre
            );
            metrics::playlist::fallback_used();
            fallback_used = true;
            match self.catalog.search(&Seed::Genre(genre), count, features).await {
                Ok(batch) => merge_unique(&mut tracks, &mut seen, batch),
                Err(e) => {
                    warn!("Fallback catalog search failed: {}", e);
                    metrics::playlist::search_failed();
                }
            }
        }

        let tracks = shuffle_and_truncate(tracks, count, &mut *self.rng.lock().await);
        metrics::playlist::assembled(tracks.len());

        AssembledTracks {
            seeds,
            tracks,
            fallback_used,
        }
    }

    /// One concurrent search per seed; results come back in seed order
    async fn search_all(
        &self,
        seeds: &[Seed],
        limit: usize,
        features: Option<AudioFeatures>,
    ) -> Vec<Vec<Track>> {
        let mut set = JoinSet::new();
        for (index, seed) in seeds.iter().cloned().enumerate() {
            let catalog = Arc::clone(&self.catalog);
            set.spawn(async move {
                let result = catalog.search(&seed, limit, features).await;
                (index, seed, result)
            });
        }

        let mut ordered: Vec<Vec<Track>> = vec![Vec::new(); seeds.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, _, Ok(tracks))) => ordered[index] = tracks,
                Ok((_, seed, Err(e))) => {
                    warn!("Catalog search for seed '{}' failed: {}", seed.value(), e);
                    metrics::playlist::search_failed();
                }
                Err(e) => {
                    warn!("Catalog search task did not complete: {}", e);
                    metrics::playlist::search_failed();
                }
            }
        }
        ordered
    }
}
