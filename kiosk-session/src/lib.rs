//! # Kiosk Session Library (kiosk-session)
//!
//! Session core for a check-in and voting kiosk.
//!
//! **Purpose:** Turn badge scans (or typed ids) into an authenticated
//! registrant, collect ballot edits, submit them as one batch, and return the
//! kiosk to idle after completion or inactivity.
//!
//! **Architecture:** A single [`Session`] owns all session state. Inputs
//! arrive through the [`SessionDriver`] (scanner frames, idle reports) or
//! direct calls; the remote check-in service sits behind
//! [`service::RegistrantService`].

pub mod badge;
pub mod db;
pub mod driver;
pub mod error;
pub mod idle;
pub mod ports;
pub mod service;
pub mod session;

pub use driver::SessionDriver;
pub use error::{Error, Result};
pub use session::{AuthStatus, IdleOutcome, Session};
