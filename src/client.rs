//! High-level JMAP client
//!
//! [`JmapClient`] owns the HTTP client and the credential; the discovered
//! [`Session`] is returned to the caller as an immutable value and passed
//! back into each operation. That keeps the client free of mutable shared
//! state: concurrent operations over the same session need no locking, and
//! a reconnect simply produces a fresh session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use crate::auth::AuthScheme;
use crate::error::{Error, TransportError};
use crate::mailbox::{Mailbox, MailboxTree};
use crate::query::{Comparator, EmailQuery};
use crate::request::{MethodCall, Request};
use crate::response::{correlate, CallError, Response};
use crate::session::{DiscoveryError, Session};

/// Client-side engine for one JMAP server
pub struct JmapClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    credential: String,
    auth: AuthScheme,
    call_counter: AtomicU64,
}

impl JmapClient {
    /// Create a client with auto-detected authentication.
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::with_auth(base_url, username, credential, None)
    }

    /// Create a client, optionally forcing Bearer or Basic authentication.
    pub fn with_auth(
        base_url: &str,
        username: impl Into<String>,
        credential: impl Into<String>,
        explicit_bearer: Option<bool>,
    ) -> Result<Self, Error> {
        let base_url = Url::parse(base_url).map_err(DiscoveryError::Url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("jmap-lib/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::Http)?;

        let credential = credential.into();
        let auth = AuthScheme::select(&credential, explicit_bearer);
        debug!(?auth, "selected authentication scheme");

        Ok(Self {
            http,
            base_url,
            username: username.into(),
            credential,
            auth,
            call_counter: AtomicU64::new(0),
        })
    }

    /// Selected authentication scheme.
    pub fn auth_scheme(&self) -> AuthScheme {
        self.auth
    }

    /// Next caller-unique call id: `req1`, `req2`, ...
    pub fn next_call_id(&self) -> String {
        let n = self.call_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("req{n}")
    }

    fn auth_header(&self) -> String {
        self.auth.header_value(&self.username, &self.credential)
    }

    /// Discover the server session. Must run before any other operation;
    /// running it again replaces the session wholesale.
    pub async fn connect(&self) -> Result<Session, Error> {
        let session = Session::discover(&self.http, &self.base_url, &self.auth_header()).await?;
        info!(api_url = %session.api_url, "connected to JMAP server");
        Ok(session)
    }

    /// Send one transaction: a single network round trip.
    pub async fn send(
        &self,
        session: &Session,
        request: &Request,
    ) -> Result<Response, TransportError> {
        debug!(
            calls = request.method_calls.len(),
            using = ?request.using,
            "dispatching JMAP transaction"
        );
        let http_response = self
            .http
            .post(&session.api_url)
            .header(AUTHORIZATION, self.auth_header())
            .json(request)
            .send()
            .await?;

        let status = http_response.status();
        let body = http_response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Batch several calls into one round trip and correlate the outcomes
    /// back to their call ids. Structural errors (duplicate ids, forward
    /// references) fail before anything is sent.
    pub async fn execute(
        &self,
        session: &Session,
        calls: Vec<MethodCall>,
    ) -> Result<HashMap<String, Result<Value, CallError>>, Error> {
        let request = Request::new(calls)?;
        let response = self.send(session, &request).await?;
        Ok(correlate(&request.method_calls, &response))
    }

    /// One call, one round trip, one payload.
    async fn call(&self, session: &Session, call: MethodCall) -> Result<Value, Error> {
        let call_id = call.call_id().to_string();
        let mut outcomes = self.execute(session, vec![call]).await?;
        outcomes
            .remove(&call_id)
            .unwrap_or(Err(CallError::MissingResult))
            .map_err(Error::Call)
    }

    fn resolve_account<'a>(
        &self,
        session: &'a Session,
        account_id: Option<&'a str>,
    ) -> Result<&'a str, Error> {
        account_id
            .or_else(|| session.mail_account_id())
            .ok_or(Error::NoAccount("session lists no accounts"))
    }

    /// Fetch all mailboxes of an account (the primary mail account when
    /// `account_id` is `None`).
    pub async fn get_mailboxes(
        &self,
        session: &Session,
        account_id: Option<&str>,
    ) -> Result<Vec<Mailbox>, Error> {
        let account_id = self.resolve_account(session, account_id)?;
        let payload = self
            .call(
                session,
                MethodCall::new("Mailbox/get", self.next_call_id())
                    .arg("accountId", account_id)
                    .arg("ids", Value::Null),
            )
            .await?;
        let list = payload
            .get("list")
            .cloned()
            .ok_or(Error::UnexpectedResponse("Mailbox/get payload has no list"))?;
        let mailboxes = serde_json::from_value(list).map_err(TransportError::Json)?;
        Ok(mailboxes)
    }

    /// Fetch all mailboxes and build the navigable tree.
    pub async fn get_mailbox_tree(
        &self,
        session: &Session,
        account_id: Option<&str>,
    ) -> Result<MailboxTree, Error> {
        let mailboxes = self.get_mailboxes(session, account_id).await?;
        Ok(MailboxTree::build(mailboxes))
    }

    /// Query email ids matching the filter.
    pub async fn query_emails(
        &self,
        session: &Session,
        filter: Option<&EmailQuery>,
        sort: Option<&[Comparator]>,
        limit: Option<u64>,
        account_id: Option<&str>,
    ) -> Result<Vec<String>, Error> {
        let account_id = self.resolve_account(session, account_id)?;
        let mut call = MethodCall::new("Email/query", self.next_call_id())
            .arg("accountId", account_id);
        if let Some(filter) = filter {
            call = call.arg("filter", filter.compile());
        }
        if let Some(sort) = sort {
            let sort = serde_json::to_value(sort).map_err(TransportError::Json)?;
            call = call.arg("sort", sort);
        }
        if let Some(limit) = limit {
            call = call.arg("limit", limit);
        }

        let payload = self.call(session, call).await?;
        let ids = payload
            .get("ids")
            .cloned()
            .ok_or(Error::UnexpectedResponse("Email/query payload has no ids"))?;
        let ids = serde_json::from_value(ids).map_err(TransportError::Json)?;
        Ok(ids)
    }

    /// Fetch email records by id. Records are returned as opaque JSON
    /// values; field mapping is the caller's concern.
    pub async fn get_emails(
        &self,
        session: &Session,
        ids: &[&str],
        properties: Option<&[&str]>,
        account_id: Option<&str>,
    ) -> Result<Vec<Value>, Error> {
        let account_id = self.resolve_account(session, account_id)?;
        let mut call = MethodCall::new("Email/get", self.next_call_id())
            .arg("accountId", account_id)
            .arg("ids", json!(ids));
        if let Some(properties) = properties {
            call = call.arg("properties", json!(properties));
        }

        let payload = self.call(session, call).await?;
        let list = payload
            .get("list")
            .cloned()
            .ok_or(Error::UnexpectedResponse("Email/get payload has no list"))?;
        let emails = serde_json::from_value(list).map_err(TransportError::Json)?;
        Ok(emails)
    }

    /// Create a draft and submit it in the same transaction.
    ///
    /// The submission references the draft through the `#draft` creation id,
    /// and the draft is destroyed once the submission succeeds. Returns the
    /// created `EmailSubmission` object.
    pub async fn send_email(
        &self,
        session: &Session,
        email: Value,
        identity_id: Option<&str>,
        account_id: Option<&str>,
    ) -> Result<Value, Error> {
        let account_id = self.resolve_account(session, account_id)?;
        let create_id = self.next_call_id();
        let submit_id = self.next_call_id();

        let create_call = MethodCall::new("Email/set", create_id.as_str())
            .arg("accountId", account_id)
            .arg("create", json!({ "draft": email }));
        let submit_call = MethodCall::new("EmailSubmission/set", submit_id.as_str())
            .arg("accountId", account_id)
            .arg(
                "create",
                json!({
                    "submission": {
                        "emailId": "#draft",
                        "identityId": identity_id.unwrap_or("$default"),
                    }
                }),
            )
            .arg("onSuccessDestroyEmail", json!(["#submission"]));

        let mut outcomes = self
            .execute(session, vec![create_call, submit_call])
            .await?;
        let payload = outcomes
            .remove(&submit_id)
            .unwrap_or(Err(CallError::MissingResult))
            .map_err(Error::Call)?;

        payload
            .get("created")
            .and_then(|created| created.get("submission"))
            .cloned()
            .ok_or(Error::UnexpectedResponse("submission was not created"))
    }
}
