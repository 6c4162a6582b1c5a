//! SMTP replies, as read from a relay or written to an inbound client.

use std::fmt::{self, Write as _};

/// First digit of a reply code (RFC 5321 section 4.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 2yz
    Completed,
    /// 3yz, more input expected
    Intermediate,
    /// 4yz, worth retrying later
    Transient,
    /// 5yz
    Permanent,
    /// Anything outside 200..=599
    Invalid,
}

/// Three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 greeting
    pub const SERVICE_READY: Self = Self(220);
    /// 221 reply to QUIT
    pub const CLOSING: Self = Self(221);
    /// 250
    pub const OK: Self = Self(250);
    /// 334 SASL challenge
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 go ahead with the message
    pub const START_DATA: Self = Self(354);
    /// 421 closing the channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 452, used for too many recipients
    pub const INSUFFICIENT_STORAGE: Self = Self(452);
    /// 501 bad arguments
    pub const PARAMETER_ERROR: Self = Self(501);
    /// 502
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 503 bad sequence of commands
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 550
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 552 message too large
    pub const EXCEEDED_STORAGE: Self = Self(552);

    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// The numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Which class the code belongs to.
    #[must_use]
    pub const fn class(self) -> ReplyClass {
        match self.0 / 100 {
            2 => ReplyClass::Completed,
            3 => ReplyClass::Intermediate,
            4 => ReplyClass::Transient,
            5 => ReplyClass::Permanent,
            _ => ReplyClass::Invalid,
        }
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reply: one code and one or more text lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code.
    pub code: ReplyCode,
    /// Text lines, without the code prefix.
    pub message: Vec<String>,
}

impl Reply {
    /// Builds a reply from its lines.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Builds a one-line reply.
    #[must_use]
    pub fn single(code: ReplyCode, text: impl Into<String>) -> Self {
        Self::new(code, vec![text.into()])
    }

    /// 2yz.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code.class(), ReplyClass::Completed)
    }

    /// 5yz.
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        matches!(self.code.class(), ReplyClass::Permanent)
    }

    /// The text lines joined with `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Renders the reply as sent on the wire: `code-text` for every line but
    /// the last, which is `code text`.
    #[must_use]
    pub fn to_wire(&self) -> String {
        let Some((last, rest)) = self.message.split_last() else {
            return format!("{}\r\n", self.code);
        };

        let mut out = String::new();
        for line in rest {
            let _ = write!(out, "{}-{line}\r\n", self.code);
        }
        let _ = write!(out, "{} {last}\r\n", self.code);
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_code_class() {
        assert_eq!(ReplyCode::OK.class(), ReplyClass::Completed);
        assert_eq!(ReplyCode::START_DATA.class(), ReplyClass::Intermediate);
        assert_eq!(ReplyCode::new(451).class(), ReplyClass::Transient);
        assert_eq!(ReplyCode::EXCEEDED_STORAGE.class(), ReplyClass::Permanent);
        assert_eq!(ReplyCode::new(699).class(), ReplyClass::Invalid);
    }

    #[test]
    fn test_permanent_rejection() {
        let reply = Reply::single(ReplyCode::MAILBOX_UNAVAILABLE, "No such user");
        assert!(!reply.is_success());
        assert!(reply.is_permanent_error());
    }

    #[test]
    fn test_greeting_is_single_wire_line() {
        let reply = Reply::single(ReplyCode::SERVICE_READY, "mx.test Mailrouter ESMTP Service ready");
        assert_eq!(reply.to_wire(), "220 mx.test Mailrouter ESMTP Service ready\r\n");
    }

    #[test]
    fn test_ehlo_reply_uses_continuation_lines() {
        let reply = Reply::new(
            ReplyCode::OK,
            vec![
                "mx.test greets client".to_string(),
                "8BITMIME".to_string(),
                "SIZE 1024".to_string(),
            ],
        );
        assert_eq!(
            reply.to_wire(),
            "250-mx.test greets client\r\n250-8BITMIME\r\n250 SIZE 1024\r\n"
        );
        assert_eq!(reply.message_text(), "mx.test greets client\n8BITMIME\nSIZE 1024");
    }

    #[test]
    fn test_bare_code_reply() {
        assert_eq!(Reply::new(ReplyCode::CLOSING, vec![]).to_wire(), "221\r\n");
    }
}
