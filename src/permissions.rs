//! Capability introspection
//!
//! Derives a human- and machine-readable report of what the supplied
//! credential can do, purely from the parsed [`Session`]. No network calls;
//! the report is stale the moment the session is replaced.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::session::{capability, Session};

/// What the current session's credential is allowed to do
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionReport {
    /// Sorted capability URIs the server advertises
    pub capabilities: Vec<String>,
    /// Sorted ids of reachable accounts
    pub account_ids: Vec<String>,
    /// Capability URI -> primary account id
    pub primary_accounts: BTreeMap<String, String>,
    pub can_read_mail: bool,
    pub can_send_mail: bool,
    pub can_manage_contacts: bool,
    pub can_manage_calendars: bool,
    /// `maxSizeMessageAttachments` of the primary mail account, if advertised
    pub max_attachment_size: Option<u64>,
}

impl PermissionReport {
    /// Derive the report from a session snapshot.
    pub fn introspect(session: &Session) -> Self {
        let capabilities: Vec<String> = session
            .capability_list()
            .into_iter()
            .map(String::from)
            .collect();
        let mut account_ids: Vec<String> = session.accounts.keys().cloned().collect();
        account_ids.sort_unstable();

        let max_attachment_size = session
            .mail_account_id()
            .and_then(|id| session.account(id))
            .and_then(|account| account.account_capabilities.get(capability::MAIL))
            .and_then(|caps| caps.get("maxSizeMessageAttachments"))
            .and_then(Value::as_u64);

        Self {
            can_read_mail: session.has_capability(capability::MAIL),
            can_send_mail: session.has_capability(capability::SUBMISSION),
            can_manage_contacts: session.has_capability(capability::CONTACTS),
            can_manage_calendars: session.has_capability(capability::CALENDARS),
            primary_accounts: session
                .primary_accounts
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            capabilities,
            account_ids,
            max_attachment_size,
        }
    }
}

impl fmt::Display for PermissionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Permissions for this credential:")?;
        let actions = [
            ("read and manage email", self.can_read_mail),
            ("send email", self.can_send_mail),
            ("manage contacts", self.can_manage_contacts),
            ("manage calendars", self.can_manage_calendars),
        ];
        for (action, allowed) in actions {
            let marker = if allowed { "yes" } else { "no" };
            writeln!(f, "  {marker:>3}  can {action}")?;
        }
        if let Some(size) = self.max_attachment_size {
            writeln!(f, "  max attachment size: {size} bytes")?;
        }
        writeln!(f, "  accounts: {}", self.account_ids.join(", "))?;
        writeln!(f, "  capabilities:")?;
        for uri in &self.capabilities {
            writeln!(f, "    {uri}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::parse(
            r#"{
                "capabilities": {
                    "urn:ietf:params:jmap:core": {},
                    "urn:ietf:params:jmap:mail": {},
                    "urn:ietf:params:jmap:submission": {}
                },
                "accounts": {
                    "u1": {
                        "name": "user@example.com",
                        "isPersonal": true,
                        "accountCapabilities": {
                            "urn:ietf:params:jmap:mail": {
                                "maxSizeMessageAttachments": 50000000
                            }
                        }
                    }
                },
                "primaryAccounts": {"urn:ietf:params:jmap:mail": "u1"},
                "apiUrl": "https://jmap.example.com/api/"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_introspect_well_known_actions() {
        let report = PermissionReport::introspect(&session());
        assert!(report.can_read_mail);
        assert!(report.can_send_mail);
        assert!(!report.can_manage_contacts);
        assert!(!report.can_manage_calendars);
        assert_eq!(report.account_ids, vec!["u1"]);
        assert_eq!(report.max_attachment_size, Some(50_000_000));
        assert_eq!(
            report.primary_accounts.get(capability::MAIL).map(String::as_str),
            Some("u1")
        );
    }

    #[test]
    fn test_display_lists_actions_and_capabilities() {
        let rendered = PermissionReport::introspect(&session()).to_string();
        assert!(rendered.contains("yes  can read and manage email"));
        assert!(rendered.contains("no  can manage contacts"));
        assert!(rendered.contains("urn:ietf:params:jmap:submission"));
    }
}
