//! Errors raised while loading kiosk configuration and opening the settings store

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Config file or database directory could not be read or created
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid TOML or a value rejected by `KioskConfig::validate`
    #[error("Configuration error: {0}")]
    Config(String),
}
