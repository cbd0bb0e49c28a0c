//! # Bluespin Common Library
//!
//! Shared code for the bluespin daemon:
//! - Configuration loading and validation
//! - Error types

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Error, Result};
