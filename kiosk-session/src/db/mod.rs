//! Kiosk-local persistence

pub mod settings;
