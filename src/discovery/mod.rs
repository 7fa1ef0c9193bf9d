// Geo filtering, relevance scoring, mood mapping and playlist assembly

pub mod geo;
pub mod mood;
pub mod playlist;
pub mod scoring;

pub use geo::{haversine_km, GeoQuery};
pub use mood::{Mood, MoodTarget};
pub use playlist::{CatalogSearch, PlaylistAssembler, PlaylistCreator, Seed, TrackAdder};
