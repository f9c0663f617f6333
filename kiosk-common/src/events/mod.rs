//! Event types for the kiosk event system
//!
//! Replaces implicit field observation with explicit notifications: every
//! state change the session makes is emitted on the [`EventBus`], and
//! subscribers (navigation, idle supervision, logging) react to those.

mod session_types;

pub use session_types::SessionPhase;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Kiosk session events
///
/// Serialized with a `type` tag so they can be forwarded to a UI as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Session phase changed
    PhaseChanged {
        old_phase: SessionPhase,
        new_phase: SessionPhase,
        timestamp: DateTime<Utc>,
    },

    /// Registrant resolved and attached to the session
    RegistrantAttached {
        /// Numeric registrant id from the service
        registrant_id: i64,
        /// Site the registrant votes at
        site_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Registrant rejected (lookup failed or already voted)
    RegistrantRejected {
        /// Badge-derived id that was looked up
        badge_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// PIN confirmation finished
    PinConfirmation {
        accepted: bool,
        timestamp: DateTime<Utc>,
    },

    /// Attached site changed (`None` when the lookup did not resolve)
    SiteChanged {
        site_id: Option<i64>,
        timestamp: DateTime<Utc>,
    },

    /// Office catalogue refreshed
    OfficesLoaded {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Ballot edit created or replaced
    VoteUpdated {
        uuid: Uuid,
        election_id: i64,
        candidate_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// Ledger submitted successfully
    VotesCast {
        edit_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Ledger submission failed; session stays in Submitting
    SubmissionFailed {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Idle countdown started
    TimeoutStarted {
        countdown_secs: u64,
        timestamp: DateTime<Utc>,
    },

    /// Idle countdown cancelled by activity or "more time"
    TimeoutCancelled {
        timestamp: DateTime<Utc>,
    },

    /// Session wiped back to defaults
    SessionReset {
        timestamp: DateTime<Utc>,
    },

    /// Manual id entry toggled
    ManualEntryChanged {
        enabled: bool,
        timestamp: DateTime<Utc>,
    },

    /// Idle suppression toggled for the current screen
    ExcludeFromIdleChanged {
        excluded: bool,
        timestamp: DateTime<Utc>,
    },

    /// Scanner device bound
    ScannerBound {
        device_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Scanner device released
    ScannerReleased {
        device_id: String,
        timestamp: DateTime<Utc>,
    },

    /// An async result arrived after the session moved on and was dropped
    StaleResponseDiscarded {
        operation: String,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// Event type name (matches the serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::PhaseChanged { .. } => "PhaseChanged",
            SessionEvent::RegistrantAttached { .. } => "RegistrantAttached",
            SessionEvent::RegistrantRejected { .. } => "RegistrantRejected",
            SessionEvent::PinConfirmation { .. } => "PinConfirmation",
            SessionEvent::SiteChanged { .. } => "SiteChanged",
            SessionEvent::OfficesLoaded { .. } => "OfficesLoaded",
            SessionEvent::VoteUpdated { .. } => "VoteUpdated",
            SessionEvent::VotesCast { .. } => "VotesCast",
            SessionEvent::SubmissionFailed { .. } => "SubmissionFailed",
            SessionEvent::TimeoutStarted { .. } => "TimeoutStarted",
            SessionEvent::TimeoutCancelled { .. } => "TimeoutCancelled",
            SessionEvent::SessionReset { .. } => "SessionReset",
            SessionEvent::ManualEntryChanged { .. } => "ManualEntryChanged",
            SessionEvent::ExcludeFromIdleChanged { .. } => "ExcludeFromIdleChanged",
            SessionEvent::ScannerBound { .. } => "ScannerBound",
            SessionEvent::ScannerReleased { .. } => "ScannerReleased",
            SessionEvent::StaleResponseDiscarded { .. } => "StaleResponseDiscarded",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the session)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use kiosk_common::events::{EventBus, SessionEvent, SessionPhase};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(SessionEvent::PhaseChanged {
///     old_phase: SessionPhase::Idle,
///     new_phase: SessionPhase::AwaitingBadge,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}
