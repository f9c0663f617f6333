//! Session data
//!
//! Plain data owned by [`super::Session`]. A reset replaces the whole value
//! with the kiosk's baseline, so every field here returns to its default.

use super::ledger::VoteLedger;
use crate::service::{Registrant, Site, SiteSummary, VoteResult};
use kiosk_common::config::DEFAULT_TIMEOUT_MS;
use kiosk_common::SessionPhase;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Phase to return to when a timeout is cancelled
    pub prior_phase: Option<SessionPhase>,
    /// Attached registrant; never set without a resolved `site_id`
    pub registrant: Option<Registrant>,
    /// Badge-derived id being (or last) looked up
    pub registrant_id: String,
    /// Last raw frame from the scanner
    pub badge_buffer: String,
    /// Resolved site id (from the registrant or an explicit selection)
    pub site_id: String,
    pub site: Option<Site>,
    pub site_directory: Vec<SiteSummary>,
    pub vote_ledger: VoteLedger,
    pub vote_result: Option<VoteResult>,
    pub voter_type: Option<String>,
    pub pin: String,
    pub pin_confirmed: bool,
    pub auth_exception: bool,
    pub already_voted: bool,
    pub manual_entry_mode: bool,
    pub timeout_ms: u64,
    pub exclude_from_idle: bool,
    /// Last caller-visible error (e.g. a failed submission)
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl SessionState {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            phase: SessionPhase::Idle,
            prior_phase: None,
            registrant: None,
            registrant_id: String::new(),
            badge_buffer: String::new(),
            site_id: String::new(),
            site: None,
            site_directory: Vec::new(),
            vote_ledger: VoteLedger::new(),
            vote_result: None,
            voter_type: None,
            pin: String::new(),
            pin_confirmed: false,
            auth_exception: false,
            already_voted: false,
            manual_entry_mode: false,
            timeout_ms,
            exclude_from_idle: false,
            last_error: None,
        }
    }

    /// Phase the session is logically in, looking through a running timeout
    pub fn effective_phase(&self) -> SessionPhase {
        match (self.phase, self.prior_phase) {
            (SessionPhase::TimedOut, Some(prior)) => prior,
            (phase, _) => phase,
        }
    }

    /// Whether the site roster shows a voter of `voter_type` already voted
    pub fn has_type_voted(&self, voter_type: &str) -> bool {
        self.site
            .as_ref()
            .map_or(false, |site| site.voters.iter().any(|v| v.voter_type == voter_type))
    }
}
