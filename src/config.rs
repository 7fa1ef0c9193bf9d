use crate::common::constants::{
    BANDSINTOWN_BASE_URL, DEFAULT_PLAYLIST_TRACKS, SPOTIFY_API_BASE_URL, TICKETMASTER_BASE_URL,
};
use crate::common::error::{DiscoveryError, Result};
use crate::common::types::GeoPoint;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub ingestion: IngestionConfig,
    pub metro: MetroConfig,
    pub ticketmaster: TicketmasterConfig,
    pub bandsintown: BandsintownConfig,
    pub venue_pages: VenuePagesConfig,
    pub spotify: SpotifyConfig,
    pub playlist: PlaylistConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Six-field cron expression (with seconds), evaluated in UTC
    pub schedule: String,
    pub schedule_enabled: bool,
    pub timeout_seconds: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            schedule: "0 0 9 * * *".to_string(),
            schedule_enabled: true,
            timeout_seconds: 15,
        }
    }
}

/// The metro area every source filters its results to
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetroConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    /// Offset applied to naive local timestamps from sources
    pub utc_offset_hours: i32,
}

impl Default for MetroConfig {
    fn default() -> Self {
        Self {
            name: "Seattle".to_string(),
            latitude: 47.6062,
            longitude: -122.3321,
            radius_km: 60.0,
            utc_offset_hours: -8,
        }
    }
}

impl MetroConfig {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TicketmasterConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub page_size: u32,
}

impl Default for TicketmasterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: TICKETMASTER_BASE_URL.to_string(),
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BandsintownConfig {
    pub app_id: Option<String>,
    pub base_url: String,
    pub artists: Vec<String>,
}

impl Default for BandsintownConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            base_url: BANDSINTOWN_BASE_URL.to_string(),
            artists: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VenuePagesConfig {
    pub venues: Vec<VenuePage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenuePage {
    pub name: String,
    pub url: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub base_url: String,
    pub market: Option<String>,
    pub public_playlists: bool,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            user_id: None,
            base_url: SPOTIFY_API_BASE_URL.to_string(),
            market: None,
            public_playlists: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    pub default_track_count: usize,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            default_track_count: DEFAULT_PLAYLIST_TRACKS,
        }
    }
}

impl Config {
    /// Load from `SMS_CONFIG` (or `config.toml`), then apply environment overrides.
    /// A missing file is not an error; every section has defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var("SMS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            DiscoveryError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(key) = non_empty_env("TICKETMASTER_API_KEY") {
            self.ticketmaster.api_key = Some(key);
        }
        if let Some(app_id) = non_empty_env("BANDSINTOWN_APP_ID") {
            self.bandsintown.app_id = Some(app_id);
        }
        if let Some(token) = non_empty_env("SPOTIFY_ACCESS_TOKEN") {
            self.spotify.access_token = Some(token);
        }
        if let Some(user) = non_empty_env("SPOTIFY_USER_ID") {
            self.spotify.user_id = Some(user);
        }
        if let Some(port) = non_empty_env("SMS_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| DiscoveryError::Config(format!("SMS_PORT '{}': {}", port, e)))?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.metro.latitude)
            || !(-180.0..=180.0).contains(&self.metro.longitude)
        {
            return Err(DiscoveryError::Config(format!(
                "metro center out of range: {}, {}",
                self.metro.latitude, self.metro.longitude
            )));
        }
        if self.metro.radius_km <= 0.0 {
            return Err(DiscoveryError::Config("metro.radius_km must be positive".into()));
        }
        if self.ingestion.timeout_seconds == 0 {
            return Err(DiscoveryError::Config(
                "ingestion.timeout_seconds must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
