//! Vote ledger
//!
//! In-memory ballot edits for the current session, keyed by election id.
//! At most one edit exists per election; re-voting overwrites it in place and
//! keeps the uuid assigned when the edit was first created.

use crate::service::{Candidate, Office, RegistrantService, ServiceError, VoteEdit, VoteResult};
use kiosk_common::{time, uuid_utils};
use tracing::debug;

/// Identity stamped on every edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotStamp {
    pub site_id: String,
    /// Badge-format registrant id
    pub registrant_id: String,
    pub voter_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteLedger {
    edits: Vec<VoteEdit>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `candidate` for `office`, replacing any earlier choice
    pub fn upsert(&mut self, stamp: &BallotStamp, office: &Office, candidate: &Candidate) -> VoteEdit {
        let cast_at = time::cast_at_now();

        if let Some(edit) = self.edits.iter_mut().find(|e| e.election_id == office.id) {
            edit.site_id = stamp.site_id.clone();
            edit.registrant_id = stamp.registrant_id.clone();
            edit.candidate_id = candidate.id;
            edit.voter_type = stamp.voter_type.clone();
            edit.cast_at = cast_at;
            debug!(uuid = %edit.uuid, election_id = office.id, candidate_id = candidate.id, "Vote replaced");
            return edit.clone();
        }

        let edit = VoteEdit {
            uuid: uuid_utils::generate(),
            site_id: stamp.site_id.clone(),
            registrant_id: stamp.registrant_id.clone(),
            election_id: office.id,
            candidate_id: candidate.id,
            voter_type: stamp.voter_type.clone(),
            cast_at,
        };
        debug!(uuid = %edit.uuid, election_id = office.id, candidate_id = candidate.id, "Vote recorded");
        self.edits.push(edit.clone());
        edit
    }

    pub fn get(&self, election_id: i64) -> Option<&VoteEdit> {
        self.edits.iter().find(|e| e.election_id == election_id)
    }

    /// Edits in the order their elections were first voted
    pub fn edits(&self) -> &[VoteEdit] {
        &self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Send a snapshot of the ledger as one CastVote batch
    ///
    /// The ledger itself is left untouched so a submitted session can still
    /// be inspected; only a session reset clears it.
    pub async fn submit(&self, service: &dyn RegistrantService) -> Result<VoteResult, ServiceError> {
        let snapshot = self.edits.clone();
        service.cast_vote(&snapshot).await
    }
}
