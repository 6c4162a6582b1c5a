//! SASL credential handling for PLAIN and CRAM-MD5.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::Md5;
use std::fmt::Write as _;

type HmacMd5 = Hmac<Md5>;

/// Credentials used to authenticate a submission.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// PLAIN, only offered to the host it was created for.
    Plain {
        /// Username.
        username: String,
        /// Password.
        password: String,
        /// Host the credentials may be sent to.
        host: String,
    },
    /// CRAM-MD5 challenge-response.
    CramMd5 {
        /// Username.
        username: String,
        /// Shared secret.
        password: String,
    },
}

impl Credentials {
    /// PLAIN credentials bound to `host`.
    #[must_use]
    pub fn plain(
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self::Plain {
            username: username.into(),
            password: password.into(),
            host: host.into(),
        }
    }

    /// CRAM-MD5 credentials.
    #[must_use]
    pub fn cram_md5(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::CramMd5 {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Passwords stay out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain { username, host, .. } => f
                .debug_struct("Plain")
                .field("username", username)
                .field("host", host)
                .finish_non_exhaustive(),
            Self::CramMd5 { username, .. } => f
                .debug_struct("CramMd5")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Builds the base64 PLAIN initial response (`\0username\0password`).
#[must_use]
pub fn plain_response(username: &str, password: &str) -> String {
    STANDARD.encode(format!("\0{username}\0{password}"))
}

/// Answers a base64 CRAM-MD5 challenge (RFC 2195).
///
/// # Errors
///
/// Returns an error if the challenge is not valid base64.
pub fn cram_md5_response(username: &str, password: &str, challenge: &str) -> Result<String> {
    let challenge = STANDARD
        .decode(challenge.trim())
        .map_err(|e| Error::Protocol(format!("Invalid CRAM-MD5 challenge: {e}")))?;

    let mut mac = <HmacMd5 as Mac>::new_from_slice(password.as_bytes())
        .map_err(|e| Error::Protocol(format!("Invalid CRAM-MD5 key: {e}")))?;
    mac.update(&challenge);
    let digest = mac.finalize().into_bytes();

    let mut answer = String::with_capacity(username.len() + 1 + digest.len() * 2);
    answer.push_str(username);
    answer.push(' ');
    for byte in digest {
        let _ = write!(answer, "{byte:02x}");
    }

    Ok(STANDARD.encode(answer))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_response() {
        assert_eq!(plain_response("user", "pass"), "AHVzZXIAcGFzcw==");
    }

    #[test]
    fn test_cram_md5_rfc2195_example() {
        // <1896.697170952@postoffice.reston.mci.net>
        let challenge = "PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+";
        let response = cram_md5_response("tim", "tanstaaftanstaaf", challenge).unwrap();
        assert_eq!(response, "dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw");
    }

    #[test]
    fn test_cram_md5_bad_challenge() {
        assert!(cram_md5_response("tim", "secret", "not base64!").is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::plain("user", "hunter2", "mx.example.com");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("hunter2"));
    }
}
