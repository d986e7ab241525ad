//! Mailbox records and the navigable mailbox tree
//!
//! `Mailbox/get` returns a flat list of parent-pointer records. The
//! [`MailboxTree`] turns that list into a rooted forest with computed paths
//! and recursive counts, staying usable even over inconsistent server data
//! (dangling parents, cycles).

mod tree;

pub use tree::{MailboxNode, MailboxTree, TreeDiagnostic, TreeStats};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Special-use role of a mailbox (RFC 8621 §2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Inbox,
    Archive,
    Drafts,
    Sent,
    Trash,
    Junk,
    All,
    Flagged,
    Important,
    Subscribed,
}

impl Role {
    /// Parse a server-supplied role string; unknown roles map to `None`
    /// rather than failing, since servers may ship vendor roles.
    pub fn parse(role: &str) -> Option<Self> {
        match role.to_ascii_lowercase().as_str() {
            "inbox" => Some(Self::Inbox),
            "archive" => Some(Self::Archive),
            "drafts" => Some(Self::Drafts),
            "sent" => Some(Self::Sent),
            "trash" => Some(Self::Trash),
            // "spam" is the common pre-RFC spelling of junk
            "junk" | "spam" => Some(Self::Junk),
            "all" => Some(Self::All),
            "flagged" => Some(Self::Flagged),
            "important" => Some(Self::Important),
            "subscribed" => Some(Self::Subscribed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Archive => "archive",
            Self::Drafts => "drafts",
            Self::Sent => "sent",
            Self::Trash => "trash",
            Self::Junk => "junk",
            Self::All => "all",
            Self::Flagged => "flagged",
            Self::Important => "important",
            Self::Subscribed => "subscribed",
        }
    }
}

/// One mailbox record as returned by `Mailbox/get`
///
/// Fields the tree builder does not know about are carried in `extra`
/// untouched, so nothing the server sends is lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    pub id: String,
    pub name: String,
    /// Absent means this mailbox is a root
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub total_emails: u64,
    #[serde(default)]
    pub unread_emails: u64,
    #[serde(default)]
    pub total_threads: u64,
    #[serde(default)]
    pub unread_threads: u64,
    #[serde(default)]
    pub sort_order: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Mailbox {
    /// Parsed special-use role, if the server assigned a known one.
    pub fn parsed_role(&self) -> Option<Role> {
        self.role.as_deref().and_then(Role::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mailbox_record() {
        let mailbox: Mailbox = serde_json::from_value(json!({
            "id": "mb1",
            "name": "Inbox",
            "parentId": null,
            "role": "inbox",
            "totalEmails": 150,
            "unreadEmails": 5,
            "sortOrder": 1,
            "isSubscribed": true
        }))
        .unwrap();

        assert_eq!(mailbox.id, "mb1");
        assert_eq!(mailbox.parsed_role(), Some(Role::Inbox));
        assert_eq!(mailbox.total_emails, 150);
        // unknown fields pass through untouched
        assert_eq!(mailbox.extra["isSubscribed"], json!(true));
    }

    #[test]
    fn test_unknown_role_is_none() {
        assert_eq!(Role::parse("x-vendor-weird"), None);
        assert_eq!(Role::parse("spam"), Some(Role::Junk));
        assert_eq!(Role::parse("Inbox"), Some(Role::Inbox));
    }
}
