//! Voter session state machine
//!
//! [`Session`] owns the single [`SessionState`] of the kiosk and performs every
//! transition. Remote calls (registrant lookup, site fetch, vote submission)
//! are awaited with no lock held; their results are applied only if the
//! session still matches what was current when the call started. A reset
//! bumps the session generation, so any response that arrives afterwards is
//! discarded as stale.
//!
//! Changes are announced on the [`EventBus`] rather than observed implicitly.

mod ledger;
mod state;

pub use ledger::{BallotStamp, VoteLedger};
pub use state::SessionState;

use crate::badge::BadgeDecoder;
use crate::error::{Error, Result};
use crate::service::{
    Candidate, Office, Registrant, RegistrantService, Site, SiteSummary, VoteEdit, VoteResult,
};
use kiosk_common::config::KioskConfig;
use kiosk_common::events::{EventBus, SessionEvent, SessionPhase};
use kiosk_common::time;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of [`Session::authenticate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    /// Registrant attached
    Authenticated(Registrant),
    /// PIN rejected or registrant not eligible
    Rejected,
    /// Nothing resolved yet
    Pending,
}

/// What the session did with an idle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleOutcome {
    /// Current screen is excluded from idle; the monitor should be reset
    Suppressed,
    /// Nothing to time out (already idle or counting down)
    Ignored,
    /// Countdown started
    TimedOut,
    /// Terminal screen; session reset immediately
    Reset,
}

struct Inner {
    state: SessionState,
    /// Value a reset restores
    baseline: SessionState,
    /// Bumped on every reset; in-flight calls compare against it
    generation: u64,
    /// A registrant lookup (badge or PIN) is in flight
    resolving: bool,
    /// A CastVote call is in flight
    submitting: bool,
    /// Office catalogue; survives resets
    offices: Vec<Office>,
    countdown: Option<CancellationToken>,
    finish_timer: Option<CancellationToken>,
}

/// The kiosk's voter session
pub struct Session {
    inner: RwLock<Inner>,
    service: Arc<dyn RegistrantService>,
    event_bus: EventBus,
    config: KioskConfig,
    decoder: BadgeDecoder,
}

impl Session {
    pub fn new(
        config: KioskConfig,
        service: Arc<dyn RegistrantService>,
        event_bus: EventBus,
    ) -> Arc<Self> {
        let baseline = SessionState::new(config.timeout_ms);
        Arc::new(Self {
            inner: RwLock::new(Inner {
                state: baseline.clone(),
                baseline,
                generation: 0,
                resolving: false,
                submitting: false,
                offices: Vec::new(),
                countdown: None,
                finish_timer: None,
            }),
            service,
            event_bus,
            config,
            decoder: BadgeDecoder::default(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &KioskConfig {
        &self.config
    }

    /// Copy of the current session data
    pub async fn snapshot(&self) -> SessionState {
        self.inner.read().await.state.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.read().await.state.phase
    }

    pub async fn offices(&self) -> Vec<Office> {
        self.inner.read().await.offices.clone()
    }

    pub async fn get_vote(&self, election_id: i64) -> Option<VoteEdit> {
        self.inner
            .read()
            .await
            .state
            .vote_ledger
            .get(election_id)
            .cloned()
    }

    pub async fn has_type_voted(&self, voter_type: &str) -> bool {
        self.inner.read().await.state.has_type_voted(voter_type)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn set_phase(&self, inner: &mut Inner, new_phase: SessionPhase) {
        let old_phase = inner.state.phase;
        if old_phase == new_phase {
            return;
        }
        inner.state.phase = new_phase;
        info!("Session phase: {} -> {}", old_phase, new_phase);
        self.event_bus.emit_lossy(SessionEvent::PhaseChanged {
            old_phase,
            new_phase,
            timestamp: time::now(),
        });
    }

    fn discard_stale(&self, operation: &str) -> Error {
        debug!("Discarding stale {} response", operation);
        self.event_bus.emit_lossy(SessionEvent::StaleResponseDiscarded {
            operation: operation.to_string(),
            timestamp: time::now(),
        });
        Error::StaleResponse(operation.to_string())
    }

    /// Mark the session not eligible and end the flow at InvalidVoter
    fn reject(&self, inner: &mut Inner, badge_id: &str, reason: String) -> Error {
        warn!(badge_id, "Registrant rejected: {}", reason);
        inner.state.already_voted = true;
        inner.state.registrant = None;
        self.set_phase(inner, SessionPhase::InvalidVoter);
        self.event_bus.emit_lossy(SessionEvent::RegistrantRejected {
            badge_id: badge_id.to_string(),
            reason: reason.clone(),
            timestamp: time::now(),
        });
        Error::NotEligible(reason)
    }

    /// Site id a registrant resolves to: a pre-selected site wins
    fn resolve_site_id(inner: &Inner, registrant: &Registrant) -> Option<String> {
        if !inner.state.site_id.trim().is_empty() {
            return Some(inner.state.site_id.clone());
        }
        registrant.site_id().map(str::to_string)
    }

    fn attach(&self, inner: &mut Inner, registrant: Registrant, site_id: String) {
        info!(
            registrant = registrant.id,
            site_id = %site_id,
            "Registrant attached"
        );
        self.event_bus.emit_lossy(SessionEvent::RegistrantAttached {
            registrant_id: registrant.id,
            site_id: site_id.clone(),
            timestamp: time::now(),
        });
        inner.state.registrant = Some(registrant);
        inner.state.site_id = site_id;
        inner.state.badge_buffer.clear();
    }

    /// Idle → AwaitingBadge (start screen shown)
    pub async fn await_badge(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.state.phase {
            SessionPhase::Idle => {
                self.set_phase(&mut inner, SessionPhase::AwaitingBadge);
                Ok(())
            }
            SessionPhase::AwaitingBadge => Ok(()),
            other => Err(Error::InvalidState(format!(
                "cannot await a badge while {}",
                other
            ))),
        }
    }

    /// Feed one raw scanner frame into the session
    ///
    /// Returns the attached registrant when the frame started a successful
    /// lookup, `None` when the frame was buffered without starting one.
    pub async fn ingest_frame(&self, raw: &str) -> Result<Option<Registrant>> {
        let registrant_id = {
            let mut inner = self.inner.write().await;
            inner.state.badge_buffer = raw.to_string();
            if inner.state.manual_entry_mode {
                debug!("Manual entry active; scanner frame buffered only");
                return Ok(None);
            }
            match self.decoder.decode(raw) {
                Some(id) => id,
                None => {
                    debug!("Scanner frame carried no registrant id");
                    return Ok(None);
                }
            }
        };
        self.resolve_registrant(registrant_id).await
    }

    /// Look up a registrant id typed at the kiosk
    pub async fn submit_manual_id(&self, registrant_id: &str) -> Result<Option<Registrant>> {
        let registrant_id = registrant_id.trim();
        if registrant_id.is_empty() {
            return Ok(None);
        }
        self.resolve_registrant(registrant_id.to_string()).await
    }

    async fn resolve_registrant(&self, registrant_id: String) -> Result<Option<Registrant>> {
        if !self.config.is_active(time::now()) {
            warn!(registrant_id = %registrant_id, "Badge presented outside the election window");
            return Err(Error::ElectionClosed);
        }

        let generation = {
            let mut inner = self.inner.write().await;
            if !inner.state.phase.accepts_badge() {
                debug!("Badge ignored while {}", inner.state.phase);
                return Ok(None);
            }
            if inner.state.registrant.is_some() || inner.resolving {
                debug!("Badge ignored; registrant already resolving or attached");
                return Ok(None);
            }
            inner.resolving = true;
            inner.state.registrant_id = registrant_id.clone();
            self.set_phase(&mut inner, SessionPhase::Authenticating);
            inner.generation
        };

        info!(registrant_id = %registrant_id, "Looking up registrant");
        let result = self.service.get_voter(&registrant_id).await;

        let (registrant, site_id, need_site) = {
            let mut inner = self.inner.write().await;
            if inner.generation != generation || inner.state.registrant_id != registrant_id {
                return Err(self.discard_stale("get_voter"));
            }
            inner.resolving = false;

            // Timeout wins over a lookup that was still in flight
            if inner.state.phase == SessionPhase::TimedOut {
                inner.state.prior_phase = Some(SessionPhase::AwaitingBadge);
                inner.state.registrant_id.clear();
                return Err(self.discard_stale("get_voter"));
            }

            let registrant = match result {
                Ok(Some(registrant)) if registrant.already_voted => {
                    return Err(self.reject(&mut inner, &registrant_id, "already voted".to_string()));
                }
                Ok(Some(registrant)) => registrant,
                Ok(None) => {
                    return Err(self.reject(&mut inner, &registrant_id, "no voter record".to_string()));
                }
                Err(e) => {
                    return Err(self.reject(&mut inner, &registrant_id, e.to_string()));
                }
            };

            let Some(site_id) = Self::resolve_site_id(&inner, &registrant) else {
                return Err(self.reject(&mut inner, &registrant_id, "registrant has no site".to_string()));
            };

            self.attach(&mut inner, registrant.clone(), site_id.clone());
            self.set_phase(&mut inner, SessionPhase::Authenticated);
            (registrant, site_id, inner.state.site.is_none())
        };

        if need_site {
            self.load_site(generation, registrant.id, &site_id).await?;
        }

        Ok(Some(registrant))
    }

    /// Fetch and attach the site, if the session still belongs to the caller
    async fn load_site(&self, generation: u64, registrant_id: i64, site_id: &str) -> Result<Option<Site>> {
        let result = self.service.get_site(site_id).await;

        let mut inner = self.inner.write().await;
        let current = inner.state.registrant.as_ref().map(|r| r.id);
        if inner.generation != generation
            || current != Some(registrant_id)
            || inner.state.site_id != site_id
        {
            return Err(self.discard_stale("get_site"));
        }

        // No retry: an unresolved site leaves the session running without one
        let site = match result {
            Ok(site) => site,
            Err(e) => {
                warn!(site_id, "Site lookup failed: {}", e);
                None
            }
        };
        if site.is_none() {
            info!(site_id, "Site unresolved");
        }
        inner.state.site = site.clone();
        self.event_bus.emit_lossy(SessionEvent::SiteChanged {
            site_id: site.as_ref().map(|s| s.id),
            timestamp: time::now(),
        });
        Ok(site)
    }

    /// Confirm a registrant with their PIN
    ///
    /// `registrant_id` replaces the tracked badge id when given (typed
    /// login); otherwise the id from the last badge scan is used.
    pub async fn confirm_pin(&self, registrant_id: Option<&str>, pin: &str) -> Result<Registrant> {
        if !self.config.is_active(time::now()) {
            warn!("PIN login attempted outside the election window");
            return Err(Error::ElectionClosed);
        }

        let (generation, registrant_id) = {
            let mut inner = self.inner.write().await;
            let phase = inner.state.phase;
            if !matches!(
                phase,
                SessionPhase::Idle | SessionPhase::AwaitingBadge | SessionPhase::Authenticated
            ) {
                return Err(Error::OrderingViolation(format!(
                    "PIN confirmation while {}",
                    phase
                )));
            }
            if inner.resolving {
                return Err(Error::InvalidState("registrant lookup in flight".to_string()));
            }
            if let Some(id) = registrant_id.map(str::trim).filter(|id| !id.is_empty()) {
                if inner.state.registrant.is_some() && inner.state.registrant_id != id {
                    return Err(Error::InvalidState(
                        "a different registrant is attached".to_string(),
                    ));
                }
                inner.state.registrant_id = id.to_string();
            }
            if inner.state.registrant_id.is_empty() {
                return Err(Error::InvalidState("no registrant id to confirm".to_string()));
            }
            inner.state.pin = pin.to_string();
            inner.resolving = true;
            (inner.generation, inner.state.registrant_id.clone())
        };

        info!(registrant_id = %registrant_id, "Confirming registrant PIN");
        let result = self.service.get_voter_with_pin(&registrant_id, pin).await;

        let (registrant, site_id, need_site) = {
            let mut inner = self.inner.write().await;
            if inner.generation != generation || inner.state.registrant_id != registrant_id {
                return Err(self.discard_stale("get_voter_with_pin"));
            }
            inner.resolving = false;
            if inner.state.phase == SessionPhase::TimedOut {
                return Err(self.discard_stale("get_voter_with_pin"));
            }

            let registrant = match result {
                Ok(registrant) if registrant.already_voted => {
                    return Err(self.reject(&mut inner, &registrant_id, "already voted".to_string()));
                }
                Ok(registrant) => registrant,
                Err(e) => {
                    warn!(registrant_id = %registrant_id, "PIN rejected: {}", e);
                    inner.state.auth_exception = true;
                    self.event_bus.emit_lossy(SessionEvent::PinConfirmation {
                        accepted: false,
                        timestamp: time::now(),
                    });
                    return Err(Error::PinRejected(e.to_string()));
                }
            };

            let Some(site_id) = Self::resolve_site_id(&inner, &registrant) else {
                inner.state.auth_exception = true;
                return Err(Error::PinRejected("registrant has no site".to_string()));
            };

            inner.state.pin_confirmed = true;
            inner.state.auth_exception = false;
            self.event_bus.emit_lossy(SessionEvent::PinConfirmation {
                accepted: true,
                timestamp: time::now(),
            });
            self.attach(&mut inner, registrant.clone(), site_id.clone());
            self.set_phase(&mut inner, SessionPhase::Authenticated);
            (registrant, site_id, inner.state.site.is_none())
        };

        if need_site {
            self.load_site(generation, registrant.id, &site_id).await?;
        }

        Ok(registrant)
    }

    pub async fn authenticate(&self) -> AuthStatus {
        let inner = self.inner.read().await;
        if inner.state.auth_exception || inner.state.already_voted {
            return AuthStatus::Rejected;
        }
        match &inner.state.registrant {
            Some(registrant) => AuthStatus::Authenticated(registrant.clone()),
            None => AuthStatus::Pending,
        }
    }

    /// Authenticated → Voting, recording the voter type stamped on edits
    pub async fn start_ballot(&self, voter_type: Option<String>) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.state.already_voted {
            return Err(Error::NotEligible("already voted".to_string()));
        }
        match inner.state.phase {
            SessionPhase::Authenticated => {}
            SessionPhase::Voting if inner.state.vote_ledger.is_empty() => {}
            other => {
                return Err(Error::OrderingViolation(format!(
                    "cannot start a ballot while {}",
                    other
                )))
            }
        }
        inner.state.voter_type = voter_type;
        self.set_phase(&mut inner, SessionPhase::Voting);
        Ok(())
    }

    /// Record a ballot edit; only accepted while Voting
    pub async fn update_vote(&self, office: &Office, candidate: &Candidate) -> Result<VoteEdit> {
        let mut inner = self.inner.write().await;

        let violation = if inner.state.phase != SessionPhase::Voting {
            Some(format!("ballot edit while {}", inner.state.phase))
        } else if inner.state.already_voted {
            Some("ballot edit after registrant already voted".to_string())
        } else if inner.state.registrant.is_none() {
            Some("ballot edit without a registrant".to_string())
        } else {
            None
        };
        if let Some(reason) = violation {
            warn!(election_id = office.id, "Rejected vote: {}", reason);
            return Err(Error::OrderingViolation(reason));
        }

        let stamp = BallotStamp {
            site_id: inner.state.site_id.clone(),
            registrant_id: inner
                .state
                .registrant
                .as_ref()
                .map(Registrant::badge_id)
                .unwrap_or_default(),
            voter_type: inner.state.voter_type.clone(),
        };
        let edit = inner.state.vote_ledger.upsert(&stamp, office, candidate);
        self.event_bus.emit_lossy(SessionEvent::VoteUpdated {
            uuid: edit.uuid,
            election_id: edit.election_id,
            candidate_id: edit.candidate_id,
            timestamp: time::now(),
        });
        Ok(edit)
    }

    /// Submit the whole ledger
    ///
    /// Voting → Submitting → Complete on success. On failure the session
    /// stays in Submitting and the error is returned; calling again retries.
    pub async fn cast_vote(self: &Arc<Self>) -> Result<VoteResult> {
        let (generation, ledger) = {
            let mut inner = self.inner.write().await;
            if inner.submitting {
                return Err(Error::InvalidState("submission already in flight".to_string()));
            }
            match inner.state.phase {
                SessionPhase::Voting => self.set_phase(&mut inner, SessionPhase::Submitting),
                SessionPhase::Submitting => info!("Retrying vote submission"),
                other => {
                    return Err(Error::OrderingViolation(format!(
                        "cast vote while {}",
                        other
                    )))
                }
            }
            inner.submitting = true;
            (inner.generation, inner.state.vote_ledger.clone())
        };

        info!("Submitting {} ballot edits", ledger.len());
        let result = ledger.submit(self.service.as_ref()).await;

        let mut inner = self.inner.write().await;
        if inner.generation != generation {
            return Err(self.discard_stale("cast_vote"));
        }
        inner.submitting = false;

        match result {
            Ok(receipt) => {
                inner.state.vote_result = Some(receipt.clone());
                inner.state.last_error = None;
                if inner.state.phase == SessionPhase::TimedOut {
                    inner.state.prior_phase = Some(SessionPhase::Complete);
                } else {
                    self.set_phase(&mut inner, SessionPhase::Complete);
                }
                self.event_bus.emit_lossy(SessionEvent::VotesCast {
                    edit_count: ledger.len(),
                    timestamp: time::now(),
                });
                self.schedule_finish_reset(&mut inner);
                Ok(receipt)
            }
            Err(e) => {
                warn!(retryable = e.is_transient(), "Vote submission failed: {}", e);
                inner.state.last_error = Some(e.to_string());
                self.event_bus.emit_lossy(SessionEvent::SubmissionFailed {
                    message: e.to_string(),
                    timestamp: time::now(),
                });
                Err(Error::TransientService(e))
            }
        }
    }

    /// Reset a completed session after the finish timeout
    fn schedule_finish_reset(self: &Arc<Self>, inner: &mut Inner) {
        let token = CancellationToken::new();
        if let Some(previous) = inner.finish_timer.replace(token.clone()) {
            previous.cancel();
        }
        let generation = inner.generation;
        let delay = Duration::from_millis(self.config.finish_timeout_ms);
        let session = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let mut inner = session.inner.write().await;
                    if inner.generation == generation
                        && inner.state.effective_phase() == SessionPhase::Complete
                    {
                        info!("Finish timeout elapsed");
                        session.reset_locked(&mut inner);
                    }
                }
            }
        });
    }

    /// Clear the session back to Idle; idempotent
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        self.reset_locked(&mut inner);
    }

    fn reset_locked(&self, inner: &mut Inner) {
        if let Some(token) = inner.countdown.take() {
            token.cancel();
        }
        if let Some(token) = inner.finish_timer.take() {
            token.cancel();
        }
        inner.generation += 1;
        inner.resolving = false;
        inner.submitting = false;

        let old_phase = inner.state.phase;
        inner.state = inner.baseline.clone();
        debug!(generation = inner.generation, "Session reset");
        self.event_bus.emit_lossy(SessionEvent::SessionReset {
            timestamp: time::now(),
        });
        if old_phase != SessionPhase::Idle {
            info!("Session phase: {} -> {}", old_phase, SessionPhase::Idle);
            self.event_bus.emit_lossy(SessionEvent::PhaseChanged {
                old_phase,
                new_phase: SessionPhase::Idle,
                timestamp: time::now(),
            });
        }
    }

    /// Final teardown at shutdown
    pub async fn dispose(&self) {
        self.reset().await;
        info!("Session disposed");
    }

    // ------------------------------------------------------------------
    // Idle handling
    // ------------------------------------------------------------------

    /// React to the idle monitor reporting inactivity
    pub async fn on_idle(self: &Arc<Self>) -> IdleOutcome {
        let mut inner = self.inner.write().await;
        if inner.state.exclude_from_idle {
            debug!("Idle suppressed on this screen");
            return IdleOutcome::Suppressed;
        }

        let phase = inner.state.phase;
        match phase {
            SessionPhase::Idle | SessionPhase::TimedOut => IdleOutcome::Ignored,
            phase if !phase.can_time_out() => {
                info!("Idle on terminal screen; resetting");
                self.reset_locked(&mut inner);
                IdleOutcome::Reset
            }
            _ => {
                inner.state.prior_phase = Some(phase);
                self.set_phase(&mut inner, SessionPhase::TimedOut);

                let token = CancellationToken::new();
                inner.countdown = Some(token.clone());
                let countdown_secs = self.config.countdown_secs;
                self.event_bus.emit_lossy(SessionEvent::TimeoutStarted {
                    countdown_secs,
                    timestamp: time::now(),
                });

                let generation = inner.generation;
                let session = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(Duration::from_secs(countdown_secs)) => {
                            session.expire_countdown(generation).await;
                        }
                    }
                });
                IdleOutcome::TimedOut
            }
        }
    }

    async fn expire_countdown(&self, generation: u64) {
        let mut inner = self.inner.write().await;
        if inner.generation == generation && inner.state.phase == SessionPhase::TimedOut {
            info!("Timeout countdown expired");
            self.reset_locked(&mut inner);
        }
    }

    /// "More time": cancel the countdown and return to the prior phase
    pub async fn more_time(&self) -> Result<SessionPhase> {
        let mut inner = self.inner.write().await;
        if inner.state.phase != SessionPhase::TimedOut {
            return Err(Error::InvalidState(format!(
                "no timeout running while {}",
                inner.state.phase
            )));
        }
        if let Some(token) = inner.countdown.take() {
            token.cancel();
        }
        let prior = inner
            .state
            .prior_phase
            .take()
            .unwrap_or(SessionPhase::AwaitingBadge);
        self.event_bus.emit_lossy(SessionEvent::TimeoutCancelled {
            timestamp: time::now(),
        });
        self.set_phase(&mut inner, prior);
        Ok(prior)
    }

    /// User activity: cancels a running countdown, otherwise nothing
    pub async fn on_active(&self) {
        if self.phase().await == SessionPhase::TimedOut {
            // A countdown expiring in between is fine; more_time then reports InvalidState
            let _ = self.more_time().await;
        }
    }

    pub async fn set_exclude_from_idle(&self, excluded: bool) {
        let mut inner = self.inner.write().await;
        if inner.state.exclude_from_idle != excluded {
            inner.state.exclude_from_idle = excluded;
            self.event_bus.emit_lossy(SessionEvent::ExcludeFromIdleChanged {
                excluded,
                timestamp: time::now(),
            });
        }
    }

    pub async fn set_manual_entry(&self, enabled: bool) {
        let mut inner = self.inner.write().await;
        if inner.state.manual_entry_mode != enabled {
            inner.state.manual_entry_mode = enabled;
            info!(enabled, "Manual entry mode changed");
            self.event_bus.emit_lossy(SessionEvent::ManualEntryChanged {
                enabled,
                timestamp: time::now(),
            });
        }
    }

    /// Set whether sessions start in manual entry (no scanner bound)
    pub async fn set_manual_entry_fallback(&self, enabled: bool) {
        self.inner.write().await.baseline.manual_entry_mode = enabled;
        self.set_manual_entry(enabled).await;
    }

    // ------------------------------------------------------------------
    // Catalogue and site directory
    // ------------------------------------------------------------------

    /// Load the office catalogue; an empty answer keeps the previous one
    pub async fn fetch_offices(&self) -> Result<Vec<Office>> {
        let offices = self.service.get_offices().await?;
        if !offices.is_empty() {
            let mut inner = self.inner.write().await;
            inner.offices = offices.clone();
            info!("Loaded {} offices", offices.len());
            self.event_bus.emit_lossy(SessionEvent::OfficesLoaded {
                count: offices.len(),
                timestamp: time::now(),
            });
        }
        Ok(offices)
    }

    async fn store_directory(&self, generation: u64, sites: Vec<SiteSummary>) -> Result<Vec<SiteSummary>> {
        let mut inner = self.inner.write().await;
        if inner.generation != generation {
            return Err(self.discard_stale("site_directory"));
        }
        inner.state.site_directory = sites.clone();
        Ok(sites)
    }

    async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }

    pub async fn list_sites(&self) -> Result<Vec<SiteSummary>> {
        let generation = self.generation().await;
        let sites = self.service.list_sites().await?;
        self.store_directory(generation, sites).await
    }

    pub async fn search_sites(&self, query: &str) -> Result<Vec<SiteSummary>> {
        let generation = self.generation().await;
        let sites = self.service.search_sites(query).await?;
        self.store_directory(generation, sites).await
    }

    pub async fn search_site_ids(&self, query: &str) -> Result<Vec<SiteSummary>> {
        let generation = self.generation().await;
        let sites = self.service.search_site_ids(query).await?;
        self.store_directory(generation, sites).await
    }

    /// Explicitly select the session's site before voting starts
    pub async fn select_site(&self, site_id: &str) -> Result<Option<Site>> {
        let generation = {
            let inner = self.inner.read().await;
            let phase = inner.state.effective_phase();
            if !inner.state.vote_ledger.is_empty()
                || matches!(
                    phase,
                    SessionPhase::Voting | SessionPhase::Submitting | SessionPhase::Complete
                )
            {
                return Err(Error::OrderingViolation(format!(
                    "site selection while {}",
                    phase
                )));
            }
            inner.generation
        };

        let site = self.service.get_site(site_id).await?;

        let mut inner = self.inner.write().await;
        if inner.generation != generation {
            return Err(self.discard_stale("select_site"));
        }
        if site.is_some() {
            inner.state.site_id = site_id.to_string();
        }
        inner.state.site = site.clone();
        self.event_bus.emit_lossy(SessionEvent::SiteChanged {
            site_id: site.as_ref().map(|s| s.id),
            timestamp: time::now(),
        });
        Ok(site)
    }
}
