//! Remote check-in service contract
//!
//! The service is an external collaborator. The session only talks to it
//! through [`RegistrantService`], so tests substitute a scripted fake and
//! production uses [`HttpRegistrantService`].

mod http_client;
mod types;

pub use http_client::HttpRegistrantService;
pub use types::{
    Candidate, Office, Registrant, Site, SiteSummary, SiteVoter, VoteEdit, VoteResult,
};

use async_trait::async_trait;
use thiserror::Error;

/// Check-in service client errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Network communication error (connect, timeout, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Service returned a non-success status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse response JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response carried no usable record
    #[error("Empty response: {0}")]
    Empty(String),

    /// Base URL could not be combined with the request path
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ServiceError {
    /// Network failures and 5xx responses may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Network(_) => true,
            ServiceError::Api(status, _) => *status >= 500,
            _ => false,
        }
    }
}

/// Operations offered by the remote check-in service
#[async_trait]
pub trait RegistrantService: Send + Sync {
    /// GetOffices: the office catalogue
    async fn get_offices(&self) -> Result<Vec<Office>, ServiceError>;

    /// GetVoter: `Ok(None)` when the service answers with an empty record
    async fn get_voter(&self, registrant_id: &str) -> Result<Option<Registrant>, ServiceError>;

    /// GetVoterWithPin: errors when the PIN is rejected or no `id` comes back
    async fn get_voter_with_pin(
        &self,
        registrant_id: &str,
        pin: &str,
    ) -> Result<Registrant, ServiceError>;

    /// GetSite: `Ok(None)` when the record is empty or its `id <= 0`
    async fn get_site(&self, site_id: &str) -> Result<Option<Site>, ServiceError>;

    /// ListSites
    async fn list_sites(&self) -> Result<Vec<SiteSummary>, ServiceError>;

    /// SearchSites by name
    async fn search_sites(&self, query: &str) -> Result<Vec<SiteSummary>, ServiceError>;

    /// SearchSites by site id prefix
    async fn search_site_ids(&self, query: &str) -> Result<Vec<SiteSummary>, ServiceError>;

    /// CastVote: submit the whole ledger as one batch
    async fn cast_vote(&self, votes: &[VoteEdit]) -> Result<VoteResult, ServiceError>;
}
