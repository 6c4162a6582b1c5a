//! Filter data model.

use super::engine::MatchInput;
use super::origin::origin_matches;
use serde::{Deserialize, Serialize};

/// A match rule pointing at a route.
///
/// Serialized with the field names used by the configuration file
/// (`Id`, `Order`, `Name`, `From`, `To`, `Subject`, `Origin`, `RouteId`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Filter {
    /// Unique identifier.
    pub id: String,
    /// Evaluation order; lower runs first.
    pub order: i64,
    /// Display name, recorded in the activity log on a match.
    pub name: String,
    /// Substring of the envelope sender.
    pub from: String,
    /// Substring of any envelope recipient.
    pub to: String,
    /// Substring of the decoded Subject header.
    pub subject: String,
    /// IP address or CIDR block of the submitting peer.
    pub origin: String,
    /// Destination route id.
    pub route_id: String,
}

impl Filter {
    /// True when at least one criterion is set.
    #[must_use]
    pub fn has_criteria(&self) -> bool {
        !(self.from.is_empty()
            && self.to.is_empty()
            && self.subject.is_empty()
            && self.origin.is_empty())
    }

    /// Tests the message against every set criterion.
    ///
    /// All comparisons are case-sensitive substring tests, except origin.
    #[must_use]
    pub fn matches(&self, input: &MatchInput<'_>) -> bool {
        self.has_criteria()
            && (self.from.is_empty() || self.match_from(input.sender))
            && (self.to.is_empty() || self.match_to(input.recipients))
            && (self.subject.is_empty() || self.match_subject(input.subject))
            && (self.origin.is_empty() || origin_matches(&self.origin, input.origin))
    }

    /// Sender criterion alone; false when unset.
    #[must_use]
    pub fn match_from(&self, sender: &str) -> bool {
        !self.from.is_empty() && sender.contains(&self.from)
    }

    /// Recipient criterion alone; true if any recipient contains it.
    #[must_use]
    pub fn match_to<S: AsRef<str>>(&self, recipients: &[S]) -> bool {
        !self.to.is_empty()
            && recipients
                .iter()
                .any(|rcpt| rcpt.as_ref().contains(&self.to))
    }

    /// Subject criterion alone; false when unset.
    #[must_use]
    pub fn match_subject(&self, subject: &str) -> bool {
        !self.subject.is_empty() && subject.contains(&self.subject)
    }

    /// One-line description of the set criteria, e.g.
    /// `From: billing@, Subject: Invoice`.
    #[must_use]
    pub fn summary(&self) -> String {
        [
            ("From", &self.from),
            ("To", &self.to),
            ("Subject", &self.subject),
            ("Origin", &self.origin),
        ]
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(label, value)| format!("{label}: {value}"))
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn input<'a>(sender: &'a str, recipients: &'a [String], subject: &'a str) -> MatchInput<'a> {
        MatchInput {
            sender,
            recipients,
            subject,
            origin: "127.0.0.1".parse::<IpAddr>().unwrap(),
        }
    }

    #[test]
    fn test_empty_filter_never_matches() {
        let filter = Filter::default();
        let rcpts = vec!["b@example.com".to_string()];
        assert!(!filter.matches(&input("a@example.com", &rcpts, "hi")));
    }

    #[test]
    fn test_all_set_criteria_must_hold() {
        let filter = Filter {
            from: "@example.com".into(),
            subject: "Invoice".into(),
            ..Filter::default()
        };
        let rcpts = vec!["x@y.z".to_string()];
        assert!(filter.matches(&input("billing@example.com", &rcpts, "Invoice 42")));
        assert!(!filter.matches(&input("billing@example.com", &rcpts, "Receipt")));
        assert!(!filter.matches(&input("billing@other.com", &rcpts, "Invoice 42")));
    }

    #[test]
    fn test_substring_is_case_sensitive() {
        let filter = Filter {
            subject: "invoice".into(),
            ..Filter::default()
        };
        assert!(!filter.matches(&input("a@b.c", &[], "Invoice")));
    }

    #[test]
    fn test_recipient_any() {
        let filter = Filter {
            to: "sales@".into(),
            ..Filter::default()
        };
        let rcpts = vec!["ops@corp.example".to_string(), "sales@corp.example".to_string()];
        assert!(filter.matches(&input("a@b.c", &rcpts, "")));
        assert!(!filter.matches(&input("a@b.c", &rcpts[..1], "")));
        assert!(!filter.matches(&input("a@b.c", &[], "")));
    }

    #[test]
    fn test_origin_criterion() {
        let filter = Filter {
            origin: "127.0.0.0/8".into(),
            ..Filter::default()
        };
        assert!(filter.matches(&input("", &[], "")));

        let filter = Filter {
            origin: "10.0.0.0/8".into(),
            ..Filter::default()
        };
        assert!(!filter.matches(&input("", &[], "")));
    }

    #[test]
    fn test_unset_single_criteria_are_false() {
        let filter = Filter::default();
        assert!(!filter.match_from("anything"));
        assert!(!filter.match_to(&["anything"]));
        assert!(!filter.match_subject("anything"));
    }

    #[test]
    fn test_summary() {
        let filter = Filter {
            from: "a@b".into(),
            origin: "10.0.0.0/8".into(),
            ..Filter::default()
        };
        assert_eq!(filter.summary(), "From: a@b, Origin: 10.0.0.0/8");
        assert_eq!(Filter::default().summary(), "");

        let full = Filter {
            from: "f".into(),
            to: "t".into(),
            subject: "s".into(),
            origin: "o".into(),
            ..Filter::default()
        };
        assert_eq!(full.summary(), "From: f, To: t, Subject: s, Origin: o");
    }

    #[test]
    fn test_serde_field_names() {
        let json = r#"{"Id":"f1","Order":3,"Name":"Ops","From":"","To":"ops@","Subject":"","Origin":"","RouteId":"r1","Summary":"ignored"}"#;
        let filter: Filter = serde_json::from_str(json).unwrap();
        assert_eq!(filter.id, "f1");
        assert_eq!(filter.order, 3);
        assert_eq!(filter.route_id, "r1");

        let out = serde_json::to_value(&filter).unwrap();
        assert_eq!(out["RouteId"], "r1");
        assert!(out.get("Summary").is_none());
    }
}
