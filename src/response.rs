//! Response envelope and call-id correlation
//!
//! The server answers a transaction with an ordered list of
//! `[name, payload, callId]` triples. The list is not guaranteed to line up
//! positionally with the calls (a server may fold related calls or emit an
//! extra unmatched-reference error), so correlation goes strictly by call id.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::request::MethodCall;

/// Server-reported failure of one method call (RFC 8620 §3.6.2)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MethodError {
    /// Machine-readable error kind, e.g. `unknownMethod`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Why a call id has no usable result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("server reported {}: {}", .0.kind, .0.description.as_deref().unwrap_or("(no description)"))]
    Method(MethodError),

    #[error("server returned no response for this call id")]
    MissingResult,
}

/// One `[name, payload, callId]` triple from the response
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(String, Value, String)")]
pub struct MethodResponse {
    pub name: String,
    pub payload: Value,
    pub call_id: String,
}

impl From<(String, Value, String)> for MethodResponse {
    fn from((name, payload, call_id): (String, Value, String)) -> Self {
        Self {
            name,
            payload,
            call_id,
        }
    }
}

impl MethodResponse {
    /// A response with the reserved name `error` is a per-call failure.
    pub fn is_error(&self) -> bool {
        self.name == "error"
    }
}

/// The outer response envelope for one transaction
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub method_responses: Vec<MethodResponse>,
    #[serde(default)]
    pub session_state: Option<String>,
}

/// Map every originating call id to its outcome.
///
/// Pure function over the two lists: responses are indexed by call id
/// (last-write-wins if a non-conformant server repeats one), each call is
/// then looked up by its own id. A call with no matching response yields
/// [`CallError::MissingResult`]; a per-call error is isolated to its call id
/// and never affects sibling calls. Extra responses with unknown call ids
/// are ignored.
pub fn correlate(
    calls: &[MethodCall],
    response: &Response,
) -> HashMap<String, Result<Value, CallError>> {
    let mut by_id: HashMap<&str, &MethodResponse> = HashMap::new();
    for method_response in &response.method_responses {
        if by_id
            .insert(method_response.call_id.as_str(), method_response)
            .is_some()
        {
            warn!(
                call_id = %method_response.call_id,
                "duplicate call id in response, keeping the last occurrence"
            );
        }
    }

    let mut outcomes = HashMap::with_capacity(calls.len());
    for call in calls {
        let outcome = match by_id.get(call.call_id()) {
            None => Err(CallError::MissingResult),
            Some(method_response) if method_response.is_error() => {
                let error = serde_json::from_value(method_response.payload.clone())
                    .unwrap_or_else(|_| MethodError {
                        kind: "unknown".into(),
                        description: None,
                    });
                Err(CallError::Method(error))
            }
            Some(method_response) => Ok(method_response.payload.clone()),
        };
        outcomes.insert(call.call_id().to_string(), outcome);
    }
    outcomes
}
