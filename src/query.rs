//! Email query filters
//!
//! [`EmailQuery`] is an immutable description of search constraints that
//! compiles into the nested `FilterOperator` tree `Email/query` expects.
//! Only the AND-of-conditions shape is produced: each populated field
//! becomes one leaf condition, unset fields constrain nothing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

/// JMAP `UTCDate` format used by `after`/`before` (RFC 8620 §1.4)
const UTC_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Sort comparator for query methods
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparator {
    pub property: String,
    pub is_ascending: bool,
}

impl Comparator {
    pub fn descending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            is_ascending: false,
        }
    }

    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            is_ascending: true,
        }
    }
}

/// Structured search constraints for `Email/query`
///
/// Numeric size bounds are inclusive. Dates are compared against the
/// message's `receivedAt` by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailQuery {
    in_mailbox: Option<String>,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
    has_keyword: Option<String>,
    not_keyword: Option<String>,
    subject: Option<String>,
    from: Option<String>,
    to: Option<String>,
    text: Option<String>,
    min_size: Option<u64>,
    max_size: Option<u64>,
}

impl EmailQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to messages in one mailbox.
    pub fn in_mailbox(mut self, mailbox_id: impl Into<String>) -> Self {
        self.in_mailbox = Some(mailbox_id.into());
        self
    }

    /// Messages received at or after this instant.
    pub fn after(mut self, instant: DateTime<Utc>) -> Self {
        self.after = Some(instant);
        self
    }

    /// Messages received before this instant.
    pub fn before(mut self, instant: DateTime<Utc>) -> Self {
        self.before = Some(instant);
        self
    }

    /// Messages carrying a keyword, e.g. `$seen` or `$flagged`.
    pub fn has_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.has_keyword = Some(keyword.into());
        self
    }

    /// Messages not carrying a keyword.
    pub fn not_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.not_keyword = Some(keyword.into());
        self
    }

    /// Free-text match on the subject header.
    pub fn subject(mut self, needle: impl Into<String>) -> Self {
        self.subject = Some(needle.into());
        self
    }

    /// Free-text match on the From header.
    pub fn from(mut self, needle: impl Into<String>) -> Self {
        self.from = Some(needle.into());
        self
    }

    /// Free-text match on the To header.
    pub fn to(mut self, needle: impl Into<String>) -> Self {
        self.to = Some(needle.into());
        self
    }

    /// Free-text match over headers and body.
    pub fn text(mut self, needle: impl Into<String>) -> Self {
        self.text = Some(needle.into());
        self
    }

    /// Minimum message size in octets, inclusive.
    pub fn min_size(mut self, octets: u64) -> Self {
        self.min_size = Some(octets);
        self
    }

    /// Maximum message size in octets, inclusive.
    pub fn max_size(mut self, octets: u64) -> Self {
        self.max_size = Some(octets);
        self
    }

    /// Compile into the filter tree the protocol expects.
    ///
    /// Always a single top-level AND container, even for one leaf, so
    /// callers and tests see a uniform shape.
    pub fn compile(&self) -> Value {
        let mut conditions = Vec::new();
        if let Some(mailbox_id) = &self.in_mailbox {
            conditions.push(json!({ "inMailbox": mailbox_id }));
        }
        if let Some(after) = &self.after {
            conditions.push(json!({ "after": after.format(UTC_DATE_FORMAT).to_string() }));
        }
        if let Some(before) = &self.before {
            conditions.push(json!({ "before": before.format(UTC_DATE_FORMAT).to_string() }));
        }
        if let Some(keyword) = &self.has_keyword {
            conditions.push(json!({ "hasKeyword": keyword }));
        }
        if let Some(keyword) = &self.not_keyword {
            conditions.push(json!({ "notKeyword": keyword }));
        }
        if let Some(subject) = &self.subject {
            conditions.push(json!({ "subject": subject }));
        }
        if let Some(from) = &self.from {
            conditions.push(json!({ "from": from }));
        }
        if let Some(to) = &self.to {
            conditions.push(json!({ "to": to }));
        }
        if let Some(text) = &self.text {
            conditions.push(json!({ "text": text }));
        }
        if let Some(min_size) = self.min_size {
            conditions.push(json!({ "minSize": min_size }));
        }
        if let Some(max_size) = self.max_size {
            conditions.push(json!({ "maxSize": max_size }));
        }

        json!({
            "operator": "AND",
            "conditions": conditions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_compile_emits_one_leaf_per_set_field() {
        let after = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let filter = EmailQuery::new()
            .in_mailbox("mb-inbox")
            .after(after)
            .compile();

        assert_eq!(
            filter,
            json!({
                "operator": "AND",
                "conditions": [
                    {"inMailbox": "mb-inbox"},
                    {"after": "2025-03-01T12:30:00Z"}
                ]
            })
        );
        // no leaf for unset fields
        assert!(!filter["conditions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|leaf| leaf.get("minSize").is_some()));
    }

    #[test]
    fn test_compile_empty_query_is_empty_and() {
        assert_eq!(
            EmailQuery::new().compile(),
            json!({"operator": "AND", "conditions": []})
        );
    }

    #[test]
    fn test_compile_single_leaf_keeps_and_container() {
        let filter = EmailQuery::new().has_keyword("$flagged").compile();
        assert_eq!(filter["operator"], "AND");
        assert_eq!(filter["conditions"], json!([{"hasKeyword": "$flagged"}]));
    }

    #[test]
    fn test_compile_size_bounds() {
        let filter = EmailQuery::new().min_size(1024).max_size(2048).compile();
        assert_eq!(
            filter["conditions"],
            json!([{"minSize": 1024}, {"maxSize": 2048}])
        );
    }

    #[test]
    fn test_comparator_serialization() {
        let wire = serde_json::to_value(Comparator::descending("receivedAt")).unwrap();
        assert_eq!(
            wire,
            json!({"property": "receivedAt", "isAscending": false})
        );
    }

    #[test]
    fn test_comparator_slice_serializes_as_sort_argument() {
        let sort = [
            Comparator::descending("receivedAt"),
            Comparator::ascending("subject"),
        ];
        let wire = serde_json::to_value(&sort[..]).unwrap();
        assert_eq!(
            wire,
            json!([
                {"property": "receivedAt", "isAscending": false},
                {"property": "subject", "isAscending": true}
            ])
        );
    }
}
