//! Commands the client sends while relaying a message.

use crate::types::{Address, AuthMechanism};
use std::fmt;

/// One client command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO`, only sent after `EHLO` was refused.
    Helo {
        /// Name the router introduces itself with.
        hostname: String,
    },
    /// `EHLO`
    Ehlo {
        /// Name the router introduces itself with.
        hostname: String,
    },
    /// `AUTH <mechanism> [initial-response]`
    Auth {
        /// SASL mechanism.
        mechanism: AuthMechanism,
        /// Base64 initial response, sent inline for PLAIN.
        initial_response: Option<String>,
    },
    /// Bare base64 line answering a `334` challenge.
    AuthResponse {
        /// Base64 response.
        response: String,
    },
    /// `MAIL FROM:<reverse-path>`
    MailFrom {
        /// Reverse-path; the null sender renders as `<>`.
        from: Address,
    },
    /// `RCPT TO:<forward-path>`
    RcptTo {
        /// Recipient.
        to: Address,
    },
    /// `DATA`
    Data,
    /// `QUIT`
    Quit,
}

impl Command {
    /// The command line, CRLF-terminated.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }

    /// The command line with SASL material masked, for logging.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Auth { mechanism, .. } => format!("AUTH {}", mechanism.as_str()),
            Self::AuthResponse { .. } => "<auth response>".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo { hostname } => write!(f, "HELO {hostname}"),
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::Auth {
                mechanism,
                initial_response: Some(initial),
            } => write!(f, "AUTH {} {initial}", mechanism.as_str()),
            Self::Auth {
                mechanism,
                initial_response: None,
            } => write!(f, "AUTH {}", mechanism.as_str()),
            Self::AuthResponse { response } => f.write_str(response),
            Self::MailFrom { from } => write!(f, "MAIL FROM:<{}>", from.as_str()),
            Self::RcptTo { to } => write!(f, "RCPT TO:<{}>", to.as_str()),
            Self::Data => f.write_str("DATA"),
            Self::Quit => f.write_str("QUIT"),
        }
    }
}
