//! Scripted RegistrantService
//!
//! Each operation pops its next scripted response; an empty queue falls back
//! to a neutral answer. A gated response is held until the test releases its
//! [`Gate`], which lets tests interleave resets and timeouts with in-flight
//! calls.

use async_trait::async_trait;
use kiosk_session::service::{
    Office, Registrant, RegistrantService, ServiceError, Site, SiteSummary, VoteEdit, VoteResult,
};
use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetOffices,
    GetVoter(String),
    GetVoterWithPin(String, String),
    GetSite(String),
    ListSites,
    SearchSites(String),
    SearchSiteIds(String),
    CastVote(Vec<VoteEdit>),
}

/// Releases a held-back response
pub struct Gate(oneshot::Sender<()>);

impl Gate {
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

struct Scripted<T> {
    result: Result<T, ServiceError>,
    gate: Option<oneshot::Receiver<()>>,
}

type Queue<T> = Mutex<VecDeque<Scripted<T>>>;

#[derive(Default)]
pub struct FakeService {
    calls: StdMutex<Vec<Call>>,
    offices: Queue<Vec<Office>>,
    voters: Queue<Option<Registrant>>,
    pin_voters: Queue<Registrant>,
    sites: Queue<Option<Site>>,
    directory: Queue<Vec<SiteSummary>>,
    casts: Queue<VoteResult>,
}

async fn push<T>(queue: &Queue<T>, result: Result<T, ServiceError>) {
    queue.lock().await.push_back(Scripted { result, gate: None });
}

async fn push_gated<T>(queue: &Queue<T>, result: Result<T, ServiceError>) -> Gate {
    let (tx, rx) = oneshot::channel();
    queue.lock().await.push_back(Scripted {
        result,
        gate: Some(rx),
    });
    Gate(tx)
}

async fn next<T>(queue: &Queue<T>, fallback: impl FnOnce() -> Result<T, ServiceError>) -> Result<T, ServiceError> {
    let scripted = queue.lock().await.pop_front();
    match scripted {
        Some(Scripted { result, gate }) => {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            result
        }
        None => fallback(),
    }
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    /// Wait until a recorded call satisfies `matches`
    pub async fn wait_for_call(&self, matches: impl Fn(&Call) -> bool) {
        for _ in 0..1000 {
            if self.call_count(&matches) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("expected call never arrived; calls: {:?}", self.calls());
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub async fn push_offices(&self, result: Result<Vec<Office>, ServiceError>) {
        push(&self.offices, result).await;
    }

    pub async fn push_voter(&self, result: Result<Option<Registrant>, ServiceError>) {
        push(&self.voters, result).await;
    }

    pub async fn push_voter_gated(&self, result: Result<Option<Registrant>, ServiceError>) -> Gate {
        push_gated(&self.voters, result).await
    }

    pub async fn push_pin_voter(&self, result: Result<Registrant, ServiceError>) {
        push(&self.pin_voters, result).await;
    }

    pub async fn push_site(&self, result: Result<Option<Site>, ServiceError>) {
        push(&self.sites, result).await;
    }

    pub async fn push_site_gated(&self, result: Result<Option<Site>, ServiceError>) -> Gate {
        push_gated(&self.sites, result).await
    }

    pub async fn push_directory(&self, result: Result<Vec<SiteSummary>, ServiceError>) {
        push(&self.directory, result).await;
    }

    pub async fn push_cast(&self, result: Result<VoteResult, ServiceError>) {
        push(&self.casts, result).await;
    }

    pub async fn push_cast_gated(&self, result: Result<VoteResult, ServiceError>) -> Gate {
        push_gated(&self.casts, result).await
    }
}

#[async_trait]
impl RegistrantService for FakeService {
    async fn get_offices(&self) -> Result<Vec<Office>, ServiceError> {
        self.record(Call::GetOffices);
        next(&self.offices, || Ok(Vec::new())).await
    }

    async fn get_voter(&self, registrant_id: &str) -> Result<Option<Registrant>, ServiceError> {
        self.record(Call::GetVoter(registrant_id.to_string()));
        next(&self.voters, || Ok(None)).await
    }

    async fn get_voter_with_pin(&self, registrant_id: &str, pin: &str) -> Result<Registrant, ServiceError> {
        self.record(Call::GetVoterWithPin(registrant_id.to_string(), pin.to_string()));
        next(&self.pin_voters, || Err(ServiceError::Api(401, "bad pin".to_string()))).await
    }

    async fn get_site(&self, site_id: &str) -> Result<Option<Site>, ServiceError> {
        self.record(Call::GetSite(site_id.to_string()));
        next(&self.sites, || Ok(None)).await
    }

    async fn list_sites(&self) -> Result<Vec<SiteSummary>, ServiceError> {
        self.record(Call::ListSites);
        next(&self.directory, || Ok(Vec::new())).await
    }

    async fn search_sites(&self, query: &str) -> Result<Vec<SiteSummary>, ServiceError> {
        self.record(Call::SearchSites(query.to_string()));
        next(&self.directory, || Ok(Vec::new())).await
    }

    async fn search_site_ids(&self, query: &str) -> Result<Vec<SiteSummary>, ServiceError> {
        self.record(Call::SearchSiteIds(query.to_string()));
        next(&self.directory, || Ok(Vec::new())).await
    }

    async fn cast_vote(&self, votes: &[VoteEdit]) -> Result<VoteResult, ServiceError> {
        self.record(Call::CastVote(votes.to_vec()));
        next(&self.casts, || Ok(VoteResult::Null)).await
    }
}
