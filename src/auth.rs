//! Authentication scheme selection
//!
//! JMAP servers commonly accept either HTTP Basic credentials or a Bearer
//! API token. Fastmail API keys carry a short vendor prefix (`fmu1-...`),
//! which lets us pick Bearer automatically without asking the caller.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// HTTP authentication scheme used for every request in a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>` (API keys)
    Bearer,
    /// `Authorization: Basic <base64(user:pass)>` (passwords, app passwords)
    Basic,
}

impl AuthScheme {
    /// Choose a scheme for the supplied credential.
    ///
    /// An explicit override always wins. Otherwise the credential is
    /// classified by its literal prefix: a short alphanumeric vendor marker
    /// followed by a hyphen (e.g. `fmu1-`) selects Bearer, anything else
    /// selects Basic. A password that coincidentally starts with such a
    /// marker will be misclassified as Bearer; that is accepted behavior,
    /// since the prefix is the only signal available without a server call.
    pub fn select(credential: &str, explicit_bearer: Option<bool>) -> Self {
        match explicit_bearer {
            Some(true) => Self::Bearer,
            Some(false) => Self::Basic,
            None if has_token_marker(credential) => Self::Bearer,
            None => Self::Basic,
        }
    }

    /// Build the `Authorization` header value for this scheme.
    ///
    /// The username is only used for Basic; Bearer tokens are self-contained.
    pub fn header_value(&self, username: &str, credential: &str) -> String {
        match self {
            Self::Bearer => format!("Bearer {credential}"),
            Self::Basic => {
                let encoded = BASE64.encode(format!("{username}:{credential}"));
                format!("Basic {encoded}")
            }
        }
    }
}

/// True when the credential starts with a vendor token marker: a 2-8
/// character prefix of ASCII letters and digits (at least one digit, leading
/// letter) followed by a hyphen and a non-empty remainder.
fn has_token_marker(credential: &str) -> bool {
    let Some((prefix, rest)) = credential.split_once('-') else {
        return false;
    };
    if rest.is_empty() || !(2..=8).contains(&prefix.len()) {
        return false;
    }
    prefix.starts_with(|c: char| c.is_ascii_alphabetic())
        && prefix.chars().all(|c| c.is_ascii_alphanumeric())
        && prefix.chars().any(|c| c.is_ascii_digit())
}
