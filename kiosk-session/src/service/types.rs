//! Request/response records exchanged with the check-in service
//!
//! Field names follow the service's JSON; Rust names are snake_case.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Receipt returned by a successful CastVote call
pub type VoteResult = serde_json::Value;

/// Registrant record returned by GetVoter / GetVoterWithPin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registrant {
    pub id: i64,
    /// Prefix printed on the badge before the zero-padded id
    #[serde(default, deserialize_with = "null_as_empty")]
    pub badge_prefix: String,
    #[serde(rename = "siteId", default, deserialize_with = "string_or_number")]
    pub site_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub pin: Option<String>,
    /// Service-level rejection: the registrant has already cast a ballot
    #[serde(rename = "alreadyVoted", default)]
    pub already_voted: bool,
}

impl Registrant {
    /// Registrant id as printed on the badge, e.g. `VT00042`
    pub fn badge_id(&self) -> String {
        format!("{}{:05}", self.badge_prefix, self.id)
    }

    /// Site id carried by the record, if non-empty
    pub fn site_id(&self) -> Option<&str> {
        self.site_id.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Candidate standing for an office
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Office (election) on the ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// Voter roster entry of a site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteVoter {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "voterType", default)]
    pub voter_type: String,
}

/// Voting site record returned by GetSite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    #[serde(default)]
    pub voters: Vec<SiteVoter>,
    #[serde(default)]
    pub offices: Vec<Office>,
}

/// Site directory entry returned by ListSites / SearchSites
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSummary {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// A single office/candidate selection pending submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEdit {
    pub uuid: Uuid,
    #[serde(rename = "siteid")]
    pub site_id: String,
    /// Badge-format registrant id (`prefix` + zero-padded id)
    #[serde(rename = "registrantid")]
    pub registrant_id: String,
    #[serde(rename = "electionid")]
    pub election_id: i64,
    #[serde(rename = "candidateid")]
    pub candidate_id: i64,
    #[serde(rename = "votertype")]
    pub voter_type: Option<String>,
    /// Local wall-clock time, `YYYY-MM-DD HH:MM:SS`
    #[serde(rename = "datecast")]
    pub cast_at: String,
}

/// Accept `"S1"`, `17` or `null` for id fields the service types loosely
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registrant_from_service_json() {
        let registrant: Registrant = serde_json::from_value(json!({
            "id": 42,
            "badge_prefix": "VT",
            "siteId": "S1",
            "name": "ignored extra field"
        }))
        .unwrap();
        assert_eq!(registrant.id, 42);
        assert_eq!(registrant.site_id(), Some("S1"));
        assert!(!registrant.already_voted);
        assert_eq!(registrant.badge_id(), "VT00042");
    }

    #[test]
    fn test_numeric_site_id_accepted() {
        let registrant: Registrant =
            serde_json::from_value(json!({ "id": 1, "siteId": 17 })).unwrap();
        assert_eq!(registrant.site_id(), Some("17"));
    }

    #[test]
    fn test_null_badge_prefix_is_empty() {
        let registrant: Registrant =
            serde_json::from_value(json!({ "id": 7, "siteId": "S1", "badge_prefix": null }))
                .unwrap();
        assert_eq!(registrant.badge_prefix, "");
        assert_eq!(registrant.badge_id(), "00007");
    }

    #[test]
    fn test_numeric_pin_accepted() {
        let registrant: Registrant =
            serde_json::from_value(json!({ "id": 1, "siteId": "S1", "pin": 1234 })).unwrap();
        assert_eq!(registrant.pin.as_deref(), Some("1234"));

        let registrant: Registrant =
            serde_json::from_value(json!({ "id": 1, "siteId": "S1", "pin": null })).unwrap();
        assert_eq!(registrant.pin, None);
    }

    #[test]
    fn test_blank_site_id_is_unresolved() {
        let registrant: Registrant =
            serde_json::from_value(json!({ "id": 1, "siteId": "  " })).unwrap();
        assert_eq!(registrant.site_id(), None);
    }

    #[test]
    fn test_vote_edit_wire_names() {
        let edit = VoteEdit {
            uuid: Uuid::nil(),
            site_id: "S1".to_string(),
            registrant_id: "VT00001".to_string(),
            election_id: 7,
            candidate_id: 3,
            voter_type: Some("member".to_string()),
            cast_at: "2024-11-05 09:30:00".to_string(),
        };
        let json = serde_json::to_value(&edit).unwrap();
        assert_eq!(json["siteid"], "S1");
        assert_eq!(json["electionid"], 7);
        assert_eq!(json["candidateid"], 3);
        assert_eq!(json["votertype"], "member");
        assert_eq!(json["datecast"], "2024-11-05 09:30:00");
    }

    #[test]
    fn test_site_defaults_missing_lists() {
        let site: Site = serde_json::from_value(json!({ "id": 3 })).unwrap();
        assert!(site.voters.is_empty());
        assert!(site.offices.is_empty());
    }
}
