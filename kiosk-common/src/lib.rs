//! # Kiosk Common Library
//!
//! Shared code for the check-in kiosk crates including:
//! - Configuration loading (TOML + environment + CLI priority)
//! - Session event types and the EventBus
//! - Settings database bootstrap
//! - Time and UUID helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use events::{EventBus, SessionEvent, SessionPhase};
