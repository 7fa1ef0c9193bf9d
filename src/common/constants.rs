// Source names (used in logs, metrics and the `source` field of events)
pub const TICKETMASTER_SOURCE: &str = "ticketmaster";
pub const BANDSINTOWN_SOURCE: &str = "bandsintown";
pub const VENUE_PAGES_SOURCE: &str = "venue_pages";

pub const TICKETMASTER_BASE_URL: &str = "https://app.ticketmaster.com";
pub const BANDSINTOWN_BASE_URL: &str = "https://rest.bandsintown.com";
pub const SPOTIFY_API_BASE_URL: &str = "https://api.spotify.com/v1";

pub const USER_AGENT: &str = concat!("sms_discovery/", env!("CARGO_PKG_VERSION"));

/// Genre keywords checked in order against free text; the first hit wins.
/// Multi-word and more specific entries come before the generic ones they contain.
pub const GENRE_KEYWORDS: &[&str] = &[
    "hip-hop",
    "hip hop",
    "r&b",
    "drum and bass",
    "singer-songwriter",
    "post-rock",
    "indie",
    "punk",
    "metal",
    "hardcore",
    "jazz",
    "blues",
    "soul",
    "funk",
    "disco",
    "house",
    "techno",
    "edm",
    "electronic",
    "dance",
    "reggaeton",
    "latin",
    "reggae",
    "country",
    "bluegrass",
    "folk",
    "americana",
    "classical",
    "ambient",
    "rap",
    "pop",
    "rock",
];

/// Genres that sit close to a given genre, used to widen playlist seeds
pub const RELATED_GENRES: &[(&str, &[&str])] = &[
    ("rock", &["indie", "alternative", "punk", "metal", "hard-rock"]),
    ("indie", &["indie-pop", "alternative", "rock", "folk"]),
    ("pop", &["dance", "synth-pop", "indie-pop", "r-n-b"]),
    ("hip-hop", &["rap", "r-n-b", "trap", "soul"]),
    ("electronic", &["edm", "house", "techno", "dance"]),
    ("jazz", &["blues", "soul", "funk", "bossanova"]),
    ("blues", &["jazz", "soul", "rock-n-roll", "country"]),
    ("folk", &["acoustic", "singer-songwriter", "indie", "bluegrass"]),
    ("country", &["bluegrass", "folk", "honky-tonk", "rockabilly"]),
    ("metal", &["hard-rock", "heavy-metal", "punk", "rock"]),
    ("punk", &["punk-rock", "hardcore", "rock", "emo"]),
    ("latin", &["reggaeton", "salsa", "latino", "dance"]),
    ("classical", &["piano", "ambient", "opera", "study"]),
    ("soul", &["r-n-b", "funk", "jazz", "gospel"]),
    ("r&b", &["r-n-b", "soul", "hip-hop", "funk"]),
];

/// Genres used to pad the seed list when too few seeds were found
pub const BACKFILL_GENRES: &[&str] = &["pop", "rock", "indie", "electronic", "hip-hop"];

/// The catalog accepts at most this many seeds per request
pub const MAX_SEEDS: usize = 5;
/// Backfill kicks in below this many seeds
pub const MIN_SEEDS: usize = 3;

pub const DEFAULT_PLAYLIST_TRACKS: usize = 30;
pub const MAX_PLAYLIST_TRACKS: usize = 100;

pub const DEFAULT_RADIUS_KM: f64 = 50.0;

/// Number of events returned per recommended mood
pub const TOP_EVENTS_PER_MOOD: usize = 5;

/// Look up the related-genre row for a genre (case-insensitive)
pub fn related_genres(genre: &str) -> &'static [&'static str] {
    let genre = genre.trim().to_lowercase();
    RELATED_GENRES
        .iter()
        .find(|(key, _)| *key == genre)
        .map(|(_, related)| *related)
        .unwrap_or(&[])
}
