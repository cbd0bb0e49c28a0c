//! Media server client
//!
//! Speaks the Plex-style JSON dialect: every response wraps its payload in
//! a `MediaContainer` envelope, list payloads sit under `Metadata`, and
//! authentication is a token passed in the `X-Plex-Token` header. Only the
//! two read-only endpoints the daemon needs are implemented.
//!
//! **[BSP-CAT-010]** Playlist and item retrieval
//! **[BSP-CAT-020]** Stream location resolution

use bluespin_common::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "bluespin/0.1.0";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Generic `MediaContainer` envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    container: T,
}

#[derive(Debug, Deserialize)]
struct PlaylistContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<PlaylistSummary>,
}

#[derive(Debug, Deserialize)]
struct ItemContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<CatalogTrack>,
}

/// One playlist as listed by the media server
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistSummary {
    /// Server-assigned identifier, serialized as a string on the wire
    #[serde(rename = "ratingKey")]
    pub rating_key: String,
    /// Playlist title
    pub title: String,
}

impl PlaylistSummary {
    /// Numeric form of the identifier, if it parses
    pub fn id(&self) -> Option<u64> {
        self.rating_key.parse().ok()
    }
}

/// One track as listed in a playlist
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogTrack {
    /// Server-assigned identifier
    #[serde(rename = "ratingKey")]
    pub rating_key: String,
    /// Track title
    pub title: String,
    /// Media renditions; each holds the file parts the server can serve
    #[serde(rename = "Media", default)]
    pub media: Vec<MediaEntry>,
}

impl CatalogTrack {
    /// Server path of the first playable part, if any
    pub fn first_part_key(&self) -> Option<&str> {
        self.media.first()?.parts.first().map(|p| p.key.as_str())
    }
}

/// One media rendition of a track
#[derive(Debug, Clone, Deserialize)]
pub struct MediaEntry {
    #[serde(rename = "Part", default)]
    pub parts: Vec<MediaPart>,
}

/// One servable file part
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPart {
    /// Server path, e.g. `/library/parts/1234/0/file.mp3`
    pub key: String,
}

/// Read-only media server client
pub struct CatalogClient {
    http_client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl CatalogClient {
    /// Build a client for the given server
    ///
    /// The base URL is normalized to have no trailing slash; a `None` token
    /// means anonymous access.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// List all playlists on the server
    ///
    /// **[BSP-CAT-010]**
    pub async fn playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let envelope: Envelope<PlaylistContainer> = self.get_json("/playlists").await?;
        Ok(envelope.container.metadata)
    }

    /// List the tracks of one playlist
    ///
    /// An unknown id is reported by the server as an error status, which
    /// surfaces as `Error::Api`; callers that have already matched the id
    /// against `playlists()` will normally only see success here.
    pub async fn playlist_items(&self, playlist_id: u64) -> Result<Vec<CatalogTrack>> {
        let path = format!("/playlists/{playlist_id}/items");
        let envelope: Envelope<ItemContainer> = self.get_json(&path).await?;
        Ok(envelope.container.metadata)
    }

    /// Absolute stream URL for a part key, with the access token appended
    /// when one is configured
    ///
    /// **[BSP-CAT-020]** Direct-play resolution: the part is fetched as
    /// stored, no transcode session.
    pub fn stream_url(&self, part_key: &str) -> String {
        match &self.token {
            Some(token) => format!("{}{}?X-Plex-Token={}", self.base_url, part_key, token),
            None => format!("{}{}", self.base_url, part_key),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        debug!(url = %url, "Querying media server");

        let mut request = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(token) = &self.token {
            request = request.header("X-Plex-Token", token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }
}
