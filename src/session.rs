//! JMAP session discovery (RFC 8620 §2)
//!
//! The session object is fetched once from the server's well-known path and
//! is immutable afterwards: every later operation reads from it, and a
//! reconnect replaces it wholesale. It is safe to share across tasks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Well-known discovery path, appended to the configured base URL
pub const WELL_KNOWN_PATH: &str = "/.well-known/jmap";

/// Standard capability URIs
pub mod capability {
    pub const CORE: &str = "urn:ietf:params:jmap:core";
    pub const MAIL: &str = "urn:ietf:params:jmap:mail";
    pub const SUBMISSION: &str = "urn:ietf:params:jmap:submission";
    pub const VACATION_RESPONSE: &str = "urn:ietf:params:jmap:vacationresponse";
    pub const CONTACTS: &str = "urn:ietf:params:jmap:contacts";
    pub const CALENDARS: &str = "urn:ietf:params:jmap:calendars";
}

/// Errors that can occur while discovering the server session
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid discovery URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("discovery endpoint returned HTTP {0}")]
    Status(u16),

    #[error("malformed session object: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("session object is missing required field: {0}")]
    MissingField(&'static str),
}

/// One account visible through the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Display name chosen by the server
    pub name: String,
    #[serde(default)]
    pub is_personal: bool,
    #[serde(default)]
    pub is_read_only: bool,
    /// Per-capability feature limits (e.g. `maxSizeMessageAttachments`)
    #[serde(default)]
    pub account_capabilities: HashMap<String, Value>,
}

/// Immutable snapshot of the server's session object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Capability URI -> server-advertised limits for that capability
    pub capabilities: HashMap<String, Value>,
    #[serde(default)]
    pub accounts: HashMap<String, Account>,
    /// Capability URI -> account id designated primary for it
    #[serde(default)]
    pub primary_accounts: HashMap<String, String>,
    /// Endpoint that accepts batched method calls
    pub api_url: String,
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub event_source_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl Session {
    /// Parse and validate a raw session body.
    pub fn parse(body: &str) -> Result<Self, DiscoveryError> {
        let session: Session = serde_json::from_str(body)?;
        if session.api_url.is_empty() {
            return Err(DiscoveryError::MissingField("apiUrl"));
        }
        if session.capabilities.is_empty() {
            return Err(DiscoveryError::MissingField("capabilities"));
        }
        Ok(session)
    }

    /// Fetch the session object from `base_url` + the well-known path.
    ///
    /// One GET, no retries; retry policy belongs to the caller. The
    /// `auth_header` value comes from [`crate::auth::AuthScheme::header_value`].
    pub async fn discover(
        http: &reqwest::Client,
        base_url: &Url,
        auth_header: &str,
    ) -> Result<Self, DiscoveryError> {
        let url = base_url.join(WELL_KNOWN_PATH)?;
        debug!(%url, "fetching JMAP session object");

        let response = http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, auth_header)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let session = Self::parse(&body)?;
        info!(
            capabilities = session.capabilities.len(),
            accounts = session.accounts.len(),
            "discovered JMAP session"
        );
        Ok(session)
    }

    /// Whether the server advertises a capability URI.
    pub fn has_capability(&self, uri: &str) -> bool {
        self.capabilities.contains_key(uri)
    }

    /// Sorted list of advertised capability URIs.
    pub fn capability_list(&self) -> Vec<&str> {
        let mut caps: Vec<&str> = self.capabilities.keys().map(String::as_str).collect();
        caps.sort_unstable();
        caps
    }

    /// Account id designated primary for a capability URI.
    pub fn primary_account(&self, capability_uri: &str) -> Option<&str> {
        self.primary_accounts
            .get(capability_uri)
            .map(String::as_str)
    }

    /// Account id to use for mail operations: the primary mail account if
    /// designated, otherwise the lowest account id for determinism.
    pub fn mail_account_id(&self) -> Option<&str> {
        if let Some(id) = self.primary_account(capability::MAIL) {
            return Some(id);
        }
        self.accounts.keys().map(String::as_str).min()
    }

    /// Account metadata by id.
    pub fn account(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get(account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_BODY: &str = r#"{
        "capabilities": {
            "urn:ietf:params:jmap:core": {"maxCallsInRequest": 16},
            "urn:ietf:params:jmap:mail": {},
            "urn:ietf:params:jmap:submission": {}
        },
        "accounts": {
            "u123": {
                "name": "user@example.com",
                "isPersonal": true,
                "isReadOnly": false,
                "accountCapabilities": {
                    "urn:ietf:params:jmap:mail": {
                        "maxSizeMessageAttachments": 50000000
                    }
                }
            }
        },
        "primaryAccounts": {
            "urn:ietf:params:jmap:mail": "u123",
            "urn:ietf:params:jmap:submission": "u123"
        },
        "apiUrl": "https://jmap.example.com/api/",
        "uploadUrl": "https://jmap.example.com/upload/{accountId}/",
        "downloadUrl": "https://jmap.example.com/download/{accountId}/{blobId}/{name}",
        "username": "user@example.com",
        "state": "cyrus-0;p-5"
    }"#;

    #[test]
    fn test_parse_session() {
        let session = Session::parse(SESSION_BODY).unwrap();
        assert_eq!(session.api_url, "https://jmap.example.com/api/");
        assert!(session.has_capability(capability::MAIL));
        assert_eq!(session.primary_account(capability::MAIL), Some("u123"));
        assert_eq!(session.mail_account_id(), Some("u123"));
        assert_eq!(session.account("u123").unwrap().name, "user@example.com");
        assert!(session.account("u123").unwrap().is_personal);
    }

    #[test]
    fn test_parse_rejects_absent_api_url_as_malformed() {
        // serde already fails on the missing field
        let body = r#"{"capabilities": {"urn:ietf:params:jmap:core": {}}}"#;
        assert!(matches!(
            Session::parse(body),
            Err(DiscoveryError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_api_url() {
        let body = r#"{"capabilities": {"urn:ietf:params:jmap:core": {}}, "apiUrl": ""}"#;
        assert!(matches!(
            Session::parse(body),
            Err(DiscoveryError::MissingField("apiUrl"))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_capabilities() {
        let body = r#"{"capabilities": {}, "apiUrl": "https://jmap.example.com/api/"}"#;
        assert!(matches!(
            Session::parse(body),
            Err(DiscoveryError::MissingField("capabilities"))
        ));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(
            Session::parse("not json"),
            Err(DiscoveryError::Malformed(_))
        ));
    }

    #[test]
    fn test_mail_account_falls_back_to_lowest_id() {
        let body = r#"{
            "capabilities": {"urn:ietf:params:jmap:core": {}},
            "accounts": {
                "b": {"name": "second"},
                "a": {"name": "first"}
            },
            "apiUrl": "https://jmap.example.com/api/"
        }"#;
        let session = Session::parse(body).unwrap();
        assert_eq!(session.mail_account_id(), Some("a"));
    }

    #[test]
    fn test_capability_list_is_sorted() {
        let session = Session::parse(SESSION_BODY).unwrap();
        let caps = session.capability_list();
        let mut sorted = caps.clone();
        sorted.sort_unstable();
        assert_eq!(caps, sorted);
        assert_eq!(caps.len(), 3);
    }
}
