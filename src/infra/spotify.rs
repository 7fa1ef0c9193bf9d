use crate::common::error::{DiscoveryError, Result};
use crate::common::types::{PlaylistHandle, Track};
use crate::config::SpotifyConfig;
use crate::discovery::mood::AudioFeatures;
use crate::discovery::playlist::{CatalogSearch, PlaylistCreator, Seed, TrackAdder};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

/// Spotify's per-request ceiling for recommendations and playlist adds
const SPOTIFY_BATCH_LIMIT: usize = 100;

/// Spotify Web API client backing catalog search and playlist writes.
///
/// Authenticates with a user access token supplied through configuration;
/// token refresh is left to whoever provisions the token.
pub struct SpotifyClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    user_id: Option<String>,
    market: Option<String>,
    resolved_user: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    tracks: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    name: String,
    uri: String,
    #[serde(default)]
    artists: Vec<SpotifyNamed>,
}

#[derive(Debug, Deserialize)]
struct SpotifyNamed {
    #[serde(default)]
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    artists: SearchPage,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    items: Vec<SpotifyNamed>,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
    name: String,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone().filter(|t| !t.trim().is_empty()),
            user_id: config.user_id.clone().filter(|u| !u.trim().is_empty()),
            market: config.market.clone(),
            resolved_user: OnceCell::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    fn token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| DiscoveryError::Config("Spotify access token not configured".into()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .query(query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::catalog(format!("GET {} returned {}: {}", path, status, body)));
        }
        Ok(response.json().await?)
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token()?)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::catalog(format!("POST {} returned {}: {}", path, status, text)));
        }
        Ok(response)
    }

    /// Catalog id for an artist name, via the search endpoint
    async fn resolve_artist(&self, name: &str) -> Result<String> {
        let page: SearchResponse = self
            .get_json(
                "/search",
                &[
                    ("q", name.to_string()),
                    ("type", "artist".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        page.artists
            .items
            .into_iter()
            .find_map(|a| a.id)
            .ok_or_else(|| DiscoveryError::catalog(format!("no catalog artist matches '{}'", name)))
    }

    async fn playlist_owner(&self) -> Result<&str> {
        if let Some(user) = self.user_id.as_deref() {
            return Ok(user);
        }
        let user = self
            .resolved_user
            .get_or_try_init(|| async {
                let me: CurrentUser = self.get_json("/me", &[]).await?;
                Ok::<_, DiscoveryError>(me.id)
            })
            .await?;
        Ok(user.as_str())
    }
}

/// Recommendation query parameters for one seed
pub fn recommendation_query(
    seed_key: &'static str,
    seed_value: &str,
    limit: usize,
    features: Option<AudioFeatures>,
    market: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        (seed_key, seed_value.to_string()),
        ("limit", limit.clamp(1, SPOTIFY_BATCH_LIMIT).to_string()),
    ];
    if let Some(f) = features {
        query.push(("target_energy", format!("{:.2}", f.energy)));
        query.push(("target_danceability", format!("{:.2}", f.danceability)));
        query.push(("target_valence", format!("{:.2}", f.valence)));
    }
    if let Some(market) = market {
        query.push(("market", market.to_string()));
    }
    query
}

#[async_trait]
impl CatalogSearch for SpotifyClient {
    #[instrument(skip(self, seed, features), fields(seed = seed.value()))]
    async fn search(
        &self,
        seed: &Seed,
        limit: usize,
        features: Option<AudioFeatures>,
    ) -> Result<Vec<Track>> {
        let query = match seed {
            Seed::Artist(name) => {
                let artist_id = self.resolve_artist(name).await?;
                recommendation_query("seed_artists", &artist_id, limit, features, self.market.as_deref())
            }
            Seed::Genre(genre) => {
                recommendation_query("seed_genres", genre, limit, features, self.market.as_deref())
            }
        };
        let response: RecommendationsResponse = self.get_json("/recommendations", &query).await?;
        let tracks: Vec<Track> = response
            .tracks
            .into_iter()
            .filter_map(|t| {
                Some(Track {
                    id: t.id?,
                    name: t.name,
                    artists: t.artists.into_iter().map(|a| a.name).collect(),
                    uri: t.uri,
                })
            })
            .collect();
        debug!("Seed '{}' returned {} tracks", seed.value(), tracks.len());
        Ok(tracks)
    }
}

#[async_trait]
impl PlaylistCreator for SpotifyClient {
    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<PlaylistHandle> {
        let owner = self.playlist_owner().await?.to_string();
        let response = self
            .post_json(
                &format!("/users/{}/playlists", owner),
                json!({ "name": name, "description": description, "public": public }),
            )
            .await?;
        let created: CreatedPlaylist = response.json().await?;
        info!("Created playlist '{}' ({})", created.name, created.id);
        Ok(PlaylistHandle {
            id: created.id,
            name: created.name,
            url: created.external_urls.spotify,
        })
    }
}

#[async_trait]
impl TrackAdder for SpotifyClient {
    async fn add_tracks(&self, playlist: &PlaylistHandle, track_ids: &[String]) -> Result<()> {
        for chunk in track_ids.chunks(SPOTIFY_BATCH_LIMIT) {
            let uris: Vec<String> = chunk.iter().map(|id| track_uri(id)).collect();
            self.post_json(
                &format!("/playlists/{}/tracks", playlist.id),
                json!({ "uris": uris }),
            )
            .await?;
        }
        debug!("Added {} tracks to playlist {}", track_ids.len(), playlist.id);
        Ok(())
    }
}

pub fn track_uri(track_id: &str) -> String {
    if track_id.starts_with("spotify:track:") {
        track_id.to_string()
    } else {
        format!("spotify:track:{}", track_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_query_carries_mood_targets() {
        let features = AudioFeatures {
            energy: 0.9,
            danceability: 0.85,
            valence: 0.8,
        };
        let query = recommendation_query("seed_genres", "hip-hop", 250, Some(features), Some("US"));
        assert!(query.contains(&("seed_genres", "hip-hop".to_string())));
        assert!(query.contains(&("limit", "100".to_string())));
        assert!(query.contains(&("target_energy", "0.90".to_string())));
        assert!(query.contains(&("market", "US".to_string())));

        let plain = recommendation_query("seed_artists", "4Z8W", 10, None, None);
        assert_eq!(
            plain,
            vec![("seed_artists", "4Z8W".to_string()), ("limit", "10".to_string())]
        );
    }

    #[test]
    fn test_track_uri() {
        assert_eq!(track_uri("abc"), "spotify:track:abc");
        assert_eq!(track_uri("spotify:track:abc"), "spotify:track:abc");
    }

    #[tokio::test]
    async fn test_search_without_token_fails() {
        let client = SpotifyClient::new(&SpotifyConfig::default(), reqwest::Client::new());
        assert!(!client.is_configured());
        let err = client
            .search(&Seed::Genre("rock".into()), 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Config(_)));
    }
}
