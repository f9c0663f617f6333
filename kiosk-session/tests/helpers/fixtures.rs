//! Builders for service records and sessions under test

use super::FakeService;
use kiosk_common::config::KioskConfig;
use kiosk_common::EventBus;
use kiosk_session::service::{Candidate, Office, Registrant, Site};
use kiosk_session::Session;
use std::sync::Arc;

pub fn test_config() -> KioskConfig {
    KioskConfig {
        timeout_ms: 60_000,
        finish_timeout_ms: 30_000,
        countdown_secs: 30,
        ..KioskConfig::default()
    }
}

pub fn registrant(id: i64, site_id: Option<&str>) -> Registrant {
    Registrant {
        id,
        badge_prefix: "VT".to_string(),
        site_id: site_id.map(str::to_string),
        pin: None,
        already_voted: false,
    }
}

pub fn site(id: i64) -> Site {
    Site {
        id,
        voters: Vec::new(),
        offices: Vec::new(),
    }
}

pub fn office(id: i64) -> Office {
    Office {
        id,
        name: format!("Office {}", id),
        candidates: Vec::new(),
    }
}

pub fn candidate(id: i64) -> Candidate {
    Candidate {
        id,
        name: format!("Candidate {}", id),
    }
}

pub fn new_session(config: KioskConfig) -> (Arc<Session>, Arc<FakeService>) {
    let service = Arc::new(FakeService::new());
    let session = Session::new(config, service.clone(), EventBus::new(256));
    (session, service)
}
