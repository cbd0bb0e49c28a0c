//! Test helper modules for bluespin-bp integration tests
//!
//! Provides reusable test infrastructure components:
//! - MockMediaServer: in-process media server speaking the Plex-style
//!   JSON dialect over a real listener
//! - stub_player: scripted player executables that record their argv

pub mod media_server;
#[cfg(unix)]
pub mod stub_player;

// Re-export commonly used types
pub use media_server::{MockMediaServer, MockTrack};
