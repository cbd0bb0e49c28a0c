//! # Bluespin Bluetooth Player
//!
//! Unattended playback daemon: draws random tracks from a media-server
//! playlist and plays them to a Bluetooth audio sink, repairing the link
//! and restarting playback without operator intervention.
//!
//! Module map:
//! - `catalog` - media server client (playlists, items, stream URLs)
//! - `selector` - random track selection
//! - `link` - Bluetooth link control, monitoring, and the watchdog
//! - `player` - one player-process invocation per track
//! - `supervisor` - the forever loop tying the above together

pub mod catalog;
pub mod link;
pub mod player;
pub mod selector;
pub mod supervisor;

pub use bluespin_common::{Error, Result};
