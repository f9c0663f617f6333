//! Error types for kiosk-session
//!
//! Every failure in the session core resolves to one of these values; none
//! of them is fatal to the process.

use crate::service::ServiceError;
use thiserror::Error;

/// Main error type for the kiosk session
#[derive(Error, Debug)]
pub enum Error {
    /// Registrant lookup failed or registrant already voted; session ends at InvalidVoter
    #[error("Registrant not eligible: {0}")]
    NotEligible(String),

    /// Network/5xx on a non-identity call; session state unchanged
    #[error("Service error: {0}")]
    TransientService(#[from] ServiceError),

    /// No scanner found or bound; kiosk falls back to manual entry
    #[error("Scanner unavailable: {0}")]
    DeviceUnavailable(String),

    /// Ballot operation attempted in the wrong session phase
    #[error("Ordering violation: {0}")]
    OrderingViolation(String),

    /// Async result arrived after the session moved on; discarded
    #[error("Stale response discarded: {0}")]
    StaleResponse(String),

    /// PIN confirmation rejected by the service
    #[error("PIN rejected: {0}")]
    PinRejected(String),

    /// Operation not valid in the current phase
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Badge presented outside the configured election window
    #[error("Election is not open")]
    ElectionClosed,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settings database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared kiosk library
    #[error(transparent)]
    Common(#[from] kiosk_common::Error),
}

/// Convenience Result type using the kiosk-session Error
pub type Result<T> = std::result::Result<T, Error>;
