//! Recent activity: the last few messages, newest first.

use crate::outcome::OutcomeKind;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};

/// Entries kept before the oldest is evicted.
pub const MAX_LOG_ENTRIES: usize = 20;

/// Route label for dropped messages.
pub const LABEL_DROP: &str = "Drop";
/// Route label for failed deliveries.
pub const LABEL_FAILED: &str = "Failed";
/// Route label for unparsable messages.
pub const LABEL_REJECTED: &str = "Rejected";

/// One processed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// When the message was processed.
    pub received: DateTime<Local>,
    /// Submitting peer.
    pub origin: IpAddr,
    /// Envelope sender.
    pub from: String,
    /// Recipients, joined with `", "`.
    pub to: String,
    /// Decoded subject.
    pub subject: String,
    /// Matching filter name; empty if none matched.
    pub filter: String,
    /// Route name, or `Drop` / `Failed` / `Rejected`.
    pub route: String,
    /// Outcome.
    pub status: OutcomeKind,
    /// Error detail for failures, rejections and unresolved routes.
    pub error: Option<String>,
}

impl LogEntry {
    /// Creates an entry stamped with the current local time.
    #[must_use]
    pub fn now(
        origin: IpAddr,
        from: impl Into<String>,
        to: &[String],
        subject: impl Into<String>,
        filter: impl Into<String>,
        route: impl Into<String>,
        status: OutcomeKind,
    ) -> Self {
        Self {
            received: Local::now(),
            origin,
            from: from.into(),
            to: to.join(", "),
            subject: subject.into(),
            filter: filter.into(),
            route: route.into(),
            status,
            error: None,
        }
    }

    /// Attaches error text.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// `YYYY-MM-DD HH:MM:SS` in local time.
    #[must_use]
    pub fn received_display(&self) -> String {
        self.received.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Fixed-capacity ring of [`LogEntry`], index 0 newest.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<LogEntry>>,
}

impl ActivityLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts at the front, evicting the oldest entry once full.
    pub fn add(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_front(entry);
        entries.truncate(MAX_LOG_ENTRIES);
    }

    /// Copy of the entries, newest first.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True before the first message.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
