//! Test helper modules for kiosk-session integration tests
//!
//! - FakeService: scripted RegistrantService with call recording and gated
//!   (held-back) responses
//! - Fixtures: registrant/site/office builders and a session factory

#![allow(dead_code)]

pub mod fake_service;
pub mod fixtures;

pub use fake_service::{Call, FakeService, Gate};
pub use fixtures::{candidate, new_session, office, registrant, site, test_config};
