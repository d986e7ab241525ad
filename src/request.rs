//! Batched method calls and the request envelope
//!
//! A [`Request`] is one transaction: an ordered list of named method calls
//! answered in a single round trip. A call's arguments may contain
//! [`ResultReference`]s into the not-yet-materialized result of an earlier
//! call in the same transaction; the server resolves those. The engine only
//! guarantees the reference is well formed: it must point strictly backwards,
//! and that is checked here, before any network I/O.

use std::collections::{BTreeSet, HashSet};

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::session::capability;

/// Structural errors in a transaction, rejected before any I/O
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReferenceError {
    #[error("duplicate call id in transaction: {0}")]
    DuplicateCallId(String),

    #[error("call {call_id} references the result of {referenced}, which does not occur earlier in the transaction")]
    UnknownOrForward { call_id: String, referenced: String },
}

/// Back-reference into an earlier call's result (RFC 8620 §3.7)
///
/// Serialized as `{"resultOf": ..., "name": ..., "path": ...}` under a
/// `#`-prefixed argument key. The path is a JSON pointer into the referenced
/// call's result, e.g. `/ids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReference {
    /// Call id of the referenced call; must occur earlier in the transaction
    pub result_of: String,
    /// Method name the referenced call was made with
    pub name: String,
    /// JSON pointer into the referenced result
    pub path: String,
}

impl ResultReference {
    pub fn new(
        result_of: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            result_of: result_of.into(),
            name: name.into(),
            path: path.into(),
        }
    }
}

/// One argument value: either a literal JSON value or a back-reference
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    Reference(ResultReference),
}

/// A single named method invocation
///
/// Argument insertion order is preserved on the wire, which keeps request
/// bodies stable for logging and testing.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    name: String,
    arguments: Vec<(String, Arg)>,
    call_id: String,
}

impl MethodCall {
    pub fn new(name: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            call_id: call_id.into(),
        }
    }

    /// Add a literal argument.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.push((key.into(), Arg::Value(value.into())));
        self
    }

    /// Add a back-reference argument. On the wire the key gains a `#` prefix.
    pub fn back_reference(mut self, key: impl Into<String>, reference: ResultReference) -> Self {
        self.arguments
            .push((key.into(), Arg::Reference(reference)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn arguments(&self) -> &[(String, Arg)] {
        &self.arguments
    }

    fn references(&self) -> impl Iterator<Item = &ResultReference> {
        self.arguments.iter().filter_map(|(_, arg)| match arg {
            Arg::Reference(reference) => Some(reference),
            Arg::Value(_) => None,
        })
    }
}

// Wire form is the positional triple [name, arguments, callId].
impl Serialize for MethodCall {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.name)?;
        seq.serialize_element(&WireArguments(&self.arguments))?;
        seq.serialize_element(&self.call_id)?;
        seq.end()
    }
}

struct WireArguments<'a>(&'a [(String, Arg)]);

impl Serialize for WireArguments<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, arg) in self.0 {
            match arg {
                Arg::Value(value) => map.serialize_entry(key, value)?,
                Arg::Reference(reference) => {
                    map.serialize_entry(&format!("#{key}"), reference)?
                }
            }
        }
        map.end()
    }
}

/// One transaction: the outer request envelope
///
/// `{"using": [...], "methodCalls": [[name, args, callId], ...]}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub using: Vec<String>,
    #[serde(rename = "methodCalls")]
    pub method_calls: Vec<MethodCall>,
}

impl Request {
    /// Validate the calls and build the envelope.
    ///
    /// Call ids must be unique, and every back-reference must name a call id
    /// that occurs strictly earlier in the list. Either violation is a
    /// programmer error and fails here, before anything touches the network.
    /// The `using` set is the union of the capabilities the calls require.
    pub fn new(calls: Vec<MethodCall>) -> Result<Self, InvalidReferenceError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(calls.len());
        for call in &calls {
            for reference in call.references() {
                if !seen.contains(reference.result_of.as_str()) {
                    return Err(InvalidReferenceError::UnknownOrForward {
                        call_id: call.call_id.clone(),
                        referenced: reference.result_of.clone(),
                    });
                }
            }
            if !seen.insert(call.call_id.as_str()) {
                return Err(InvalidReferenceError::DuplicateCallId(call.call_id.clone()));
            }
        }

        let using = required_capabilities(&calls);
        Ok(Self {
            using,
            method_calls: calls,
        })
    }
}

/// Union of the capability URIs the calls require, always including core.
///
/// The mapping goes by method namespace: mail object types require the mail
/// capability, `EmailSubmission` additionally requires submission. A request
/// with no recognized namespace still declares core and mail, matching what
/// a bare client would send.
fn required_capabilities(calls: &[MethodCall]) -> Vec<String> {
    let mut using: BTreeSet<&str> = BTreeSet::new();
    using.insert(capability::CORE);
    for call in calls {
        let namespace = call.name.split('/').next().unwrap_or_default();
        match namespace {
            "Email" | "Mailbox" | "Thread" | "Identity" | "SearchSnippet" => {
                using.insert(capability::MAIL);
            }
            "EmailSubmission" => {
                using.insert(capability::MAIL);
                using.insert(capability::SUBMISSION);
            }
            "VacationResponse" => {
                using.insert(capability::VACATION_RESPONSE);
            }
            _ => {}
        }
    }
    if using.len() == 1 {
        using.insert(capability::MAIL);
    }
    using.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let request = Request::new(vec![
            MethodCall::new("Email/query", "c1")
                .arg("accountId", "u123")
                .arg("limit", 10),
            MethodCall::new("Email/get", "c2")
                .arg("accountId", "u123")
                .back_reference("ids", ResultReference::new("c1", "Email/query", "/ids")),
        ])
        .unwrap();

        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(
            wire,
            json!({
                "using": [
                    "urn:ietf:params:jmap:core",
                    "urn:ietf:params:jmap:mail"
                ],
                "methodCalls": [
                    ["Email/query", {"accountId": "u123", "limit": 10}, "c1"],
                    ["Email/get", {
                        "accountId": "u123",
                        "#ids": {
                            "resultOf": "c1",
                            "name": "Email/query",
                            "path": "/ids"
                        }
                    }, "c2"]
                ]
            })
        );
    }

    #[test]
    fn test_forward_reference_rejected() {
        let result = Request::new(vec![
            MethodCall::new("Email/get", "c1")
                .back_reference("ids", ResultReference::new("c2", "Email/query", "/ids")),
            MethodCall::new("Email/query", "c2").arg("accountId", "u123"),
        ]);
        assert_eq!(
            result.unwrap_err(),
            InvalidReferenceError::UnknownOrForward {
                call_id: "c1".into(),
                referenced: "c2".into(),
            }
        );
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let result = Request::new(vec![MethodCall::new("Email/get", "c1").back_reference(
            "ids",
            ResultReference::new("nope", "Email/query", "/ids"),
        )]);
        assert!(matches!(
            result,
            Err(InvalidReferenceError::UnknownOrForward { .. })
        ));
    }

    #[test]
    fn test_self_reference_rejected() {
        // a call may not reference its own result
        let result = Request::new(vec![MethodCall::new("Email/get", "c1").back_reference(
            "ids",
            ResultReference::new("c1", "Email/get", "/ids"),
        )]);
        assert!(matches!(
            result,
            Err(InvalidReferenceError::UnknownOrForward { .. })
        ));
    }

    #[test]
    fn test_duplicate_call_id_rejected() {
        let result = Request::new(vec![
            MethodCall::new("Email/query", "c1"),
            MethodCall::new("Email/get", "c1"),
        ]);
        assert_eq!(
            result.unwrap_err(),
            InvalidReferenceError::DuplicateCallId("c1".into())
        );
    }

    #[test]
    fn test_backward_reference_accepted() {
        let request = Request::new(vec![
            MethodCall::new("Mailbox/get", "a").arg("accountId", "u123"),
            MethodCall::new("Email/query", "b").arg("accountId", "u123"),
            MethodCall::new("Email/get", "c")
                .back_reference("ids", ResultReference::new("b", "Email/query", "/ids")),
        ]);
        assert!(request.is_ok());
    }

    #[test]
    fn test_submission_capability_derived() {
        let request = Request::new(vec![
            MethodCall::new("Email/set", "c1").arg("accountId", "u123"),
            MethodCall::new("EmailSubmission/set", "c2").arg("accountId", "u123"),
        ])
        .unwrap();
        assert_eq!(
            request.using,
            vec![
                capability::CORE.to_string(),
                capability::MAIL.to_string(),
                capability::SUBMISSION.to_string(),
            ]
        );
    }

    #[test]
    fn test_unrecognized_namespace_defaults_to_core_and_mail() {
        let request = Request::new(vec![MethodCall::new("Core/echo", "c1").arg("hello", true)])
            .unwrap();
        assert_eq!(
            request.using,
            vec![capability::CORE.to_string(), capability::MAIL.to_string()]
        );
    }
}
