//! Errors raised while relaying to a downstream server.

use crate::types::{ReplyClass, ReplyCode};
use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a submission.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The server answered with a non-success reply.
    #[error("Server replied {code}: {message}")]
    Rejected {
        /// Reply code, e.g. 550.
        code: u16,
        /// Reply text, lines joined with `\n`.
        message: String,
    },

    /// The server said something that is not valid SMTP.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server closed the connection mid-exchange.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// A path that cannot be put on the wire.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// PLAIN credentials bound to a different host than the one dialed.
    #[error("Credentials for {expected} refused for connection to {actual}")]
    WrongHost {
        /// Host the credentials are bound to.
        expected: String,
        /// Host the connection was opened to.
        actual: String,
    },

    /// The server did not advertise something we need.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

impl Error {
    /// A rejection carrying the server's reply.
    #[must_use]
    pub fn rejected(code: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    fn reply_class(&self) -> Option<ReplyClass> {
        match self {
            Self::Rejected { code, .. } => Some(ReplyCode::new(*code).class()),
            _ => None,
        }
    }

    /// True for a 5yz rejection.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.reply_class() == Some(ReplyClass::Permanent)
    }

    /// True for a 4yz rejection.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.reply_class() == Some(ReplyClass::Transient)
    }
}
