//! Random track selection
//!
//! **[BSP-SEL-010]** Each pick is an independent uniform draw from the
//! configured playlist. No play history is kept, so repeats are expected;
//! on a playlist of a few hundred tracks that is the desired shuffle
//! behavior for an appliance that runs for weeks.

use crate::catalog::CatalogClient;
use bluespin_common::{Error, Result};
use rand::seq::SliceRandom;
use tracing::debug;

/// A playable track, fully resolved at selection time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Server-assigned identifier
    pub id: String,
    /// Track title, for logs
    pub title: String,
    /// Absolute stream URL, ready to hand to the player
    pub stream_url: String,
}

/// Draws random tracks from one configured playlist
pub struct TrackSelector {
    client: CatalogClient,
    playlist_id: u64,
}

impl TrackSelector {
    pub fn new(client: CatalogClient, playlist_id: u64) -> Self {
        Self {
            client,
            playlist_id,
        }
    }

    /// Pick one track uniformly at random
    ///
    /// Fails with `PlaylistNotFound` when the configured id matches no
    /// playlist on the server, `PlaylistEmpty` when it matches one with no
    /// items, and `MissingStream` when the drawn item exposes no playable
    /// part.
    pub async fn pick_random(&self) -> Result<Track> {
        let playlists = self.client.playlists().await?;

        let playlist = playlists
            .iter()
            .find(|p| p.id() == Some(self.playlist_id))
            .ok_or(Error::PlaylistNotFound(self.playlist_id))?;

        let items = self.client.playlist_items(self.playlist_id).await?;

        let item = items
            .choose(&mut rand::thread_rng())
            .ok_or(Error::PlaylistEmpty(self.playlist_id))?;

        let stream_url = item
            .first_part_key()
            .map(|key| self.client.stream_url(key))
            .ok_or_else(|| Error::MissingStream(item.title.clone()))?;

        debug!(
            playlist = %playlist.title,
            track = %item.title,
            "Selected track"
        );

        Ok(Track {
            id: item.rating_key.clone(),
            title: item.title.clone(),
            stream_url,
        })
    }
}
