//! Delivery outcomes.

use serde::Serialize;
use std::fmt;

/// What happened to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    /// Accepted by the destination server.
    Sent,
    /// Discarded, by the DROP route or because no route resolved.
    Dropped,
    /// The destination could not be reached or refused the message.
    Failed,
    /// The message itself could not be parsed.
    Rejected,
}

impl OutcomeKind {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Dropped => "dropped",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of handling one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Classification.
    pub kind: OutcomeKind,
    /// Message size in bytes.
    pub size: usize,
}

impl Outcome {
    /// Creates an outcome.
    #[must_use]
    pub const fn new(kind: OutcomeKind, size: usize) -> Self {
        Self { kind, size }
    }
}
