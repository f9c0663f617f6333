//! Session phase types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the voter session state machine
///
/// Normal flow:
/// `Idle → AwaitingBadge → Authenticating → Authenticated → Voting → Submitting → Complete`
///
/// `InvalidVoter` ends the session flow until reset. `TimedOut` is entered
/// from any non-terminal phase when the kiosk goes idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Freshly reset, nobody at the kiosk
    #[default]
    Idle,
    /// Start screen shown, waiting for a badge scan or manual id
    AwaitingBadge,
    /// Registrant lookup in flight
    Authenticating,
    /// Registrant attached, ballot not started
    Authenticated,
    /// Ballot edits accepted
    Voting,
    /// Ledger submission in flight or awaiting retry
    Submitting,
    /// Votes cast, receipt stored
    Complete,
    /// Lookup failed or registrant already voted
    InvalidVoter,
    /// Idle countdown running
    TimedOut,
}

impl SessionPhase {
    /// Phases that only `reset` can leave
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::InvalidVoter | SessionPhase::Complete)
    }

    /// Phases in which a badge frame may start a lookup
    pub fn accepts_badge(self) -> bool {
        matches!(self, SessionPhase::Idle | SessionPhase::AwaitingBadge)
    }

    /// Phases the idle timeout may interrupt
    pub fn can_time_out(self) -> bool {
        !self.is_terminal() && self != SessionPhase::TimedOut
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::AwaitingBadge => "awaiting_badge",
            SessionPhase::Authenticating => "authenticating",
            SessionPhase::Authenticated => "authenticated",
            SessionPhase::Voting => "voting",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Complete => "complete",
            SessionPhase::InvalidVoter => "invalid_voter",
            SessionPhase::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}
