//! HTTP client for the remote check-in service
//!
//! Endpoints (relative to the configured base URL):
//! - `GET  /api/offices`
//! - `GET  /api/voter/{id}`
//! - `GET  /api/voter/{id}/pin/{pin}`
//! - `GET  /api/site/{siteId}`
//! - `GET  /api/votingSites`
//! - `GET  /api/votingSite/{query}`
//! - `GET  /api/siteid/?search={query}`
//! - `POST /api/castVote` with body `{ "votes": [...] }`
//!
//! No request is retried here; retry policy belongs to the caller.

use super::{Office, Registrant, RegistrantService, ServiceError, Site, SiteSummary, VoteEdit, VoteResult};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("kiosk-session/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Serialize)]
struct CastVoteRequest<'a> {
    votes: &'a [VoteEdit],
}

/// reqwest-backed [`RegistrantService`]
pub struct HttpRegistrantService {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpRegistrantService {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ServiceError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::InvalidUrl(base_url.to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments (percent-encoded) to the base URL
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the body of a 2xx response
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ServiceError::Api(status.as_u16(), body));
        }
        Ok(body)
    }

    async fn get_json(&self, url: Url) -> Result<serde_json::Value, ServiceError> {
        debug!("GET {}", url);
        let body = self.send(self.http_client.get(url)).await?;
        parse_body(&body)
    }

    async fn get_list<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, ServiceError> {
        let value = self.get_json(url).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(value).map_err(|e| ServiceError::Parse(e.to_string()))
    }
}

/// Empty bodies are treated as JSON `null`
fn parse_body(body: &str) -> Result<serde_json::Value, ServiceError> {
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(body).map_err(|e| ServiceError::Parse(e.to_string()))
}

/// A voter record only counts when it carries an `id`
fn registrant_from_value(value: serde_json::Value) -> Result<Option<Registrant>, ServiceError> {
    let has_id = value.as_object().map_or(false, |map| map.contains_key("id"));
    if !has_id {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ServiceError::Parse(e.to_string()))
}

/// A site record only counts when its `id > 0`
fn site_from_value(value: serde_json::Value) -> Result<Option<Site>, ServiceError> {
    if !value.is_object() {
        return Ok(None);
    }
    let site: Site = serde_json::from_value(value).map_err(|e| ServiceError::Parse(e.to_string()))?;
    Ok(if site.id > 0 { Some(site) } else { None })
}

#[async_trait]
impl RegistrantService for HttpRegistrantService {
    async fn get_offices(&self) -> Result<Vec<Office>, ServiceError> {
        let url = self.endpoint(&["api", "offices"])?;
        self.get_list(url).await
    }

    async fn get_voter(&self, registrant_id: &str) -> Result<Option<Registrant>, ServiceError> {
        let url = self.endpoint(&["api", "voter", registrant_id])?;
        let value = self.get_json(url).await?;
        registrant_from_value(value)
    }

    async fn get_voter_with_pin(
        &self,
        registrant_id: &str,
        pin: &str,
    ) -> Result<Registrant, ServiceError> {
        let url = self.endpoint(&["api", "voter", registrant_id, "pin", pin])?;
        let value = self.get_json(url).await?;
        registrant_from_value(value)?
            .ok_or_else(|| ServiceError::Empty(format!("no voter record for {}", registrant_id)))
    }

    async fn get_site(&self, site_id: &str) -> Result<Option<Site>, ServiceError> {
        let url = self.endpoint(&["api", "site", site_id])?;
        let value = self.get_json(url).await?;
        site_from_value(value)
    }

    async fn list_sites(&self) -> Result<Vec<SiteSummary>, ServiceError> {
        let url = self.endpoint(&["api", "votingSites"])?;
        self.get_list(url).await
    }

    async fn search_sites(&self, query: &str) -> Result<Vec<SiteSummary>, ServiceError> {
        let url = self.endpoint(&["api", "votingSite", query])?;
        self.get_list(url).await
    }

    async fn search_site_ids(&self, query: &str) -> Result<Vec<SiteSummary>, ServiceError> {
        let mut url = self.endpoint(&["api", "siteid", ""])?;
        url.query_pairs_mut().append_pair("search", query);
        self.get_list(url).await
    }

    async fn cast_vote(&self, votes: &[VoteEdit]) -> Result<VoteResult, ServiceError> {
        let url = self.endpoint(&["api", "castVote"])?;
        debug!("POST {} ({} votes)", url, votes.len());
        let request = self.http_client.post(url).json(&CastVoteRequest { votes });
        let body = self.send(request).await?;
        parse_body(&body)
    }
}
