//! Envelope address type.

use crate::error::{Error, Result};

/// Envelope address (reverse-path or forward-path) without angle brackets.
///
/// The empty address is the null sender `<>` and can only be built with
/// [`Address::null`] or [`Address::parse_path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// The null reverse-path used for bounces.
    #[must_use]
    pub const fn null() -> Self {
        Self(String::new())
    }

    /// Parses the argument of `MAIL FROM:` / `RCPT TO:`.
    ///
    /// Accepts `<addr>` with optional trailing ESMTP parameters, and a bare
    /// address from lax clients. `<>` yields [`Address::null`].
    ///
    /// # Errors
    ///
    /// Returns an error if the brackets are unbalanced or the address is
    /// invalid.
    pub fn parse_path(arg: &str) -> Result<Self> {
        let arg = arg.trim();
        let path = if let Some(rest) = arg.strip_prefix('<') {
            let end = rest
                .find('>')
                .ok_or_else(|| Error::InvalidAddress(format!("Unterminated path: {arg}")))?;
            &rest[..end]
        } else {
            arg.split_whitespace().next().unwrap_or_default()
        };

        if path.is_empty() {
            return Ok(Self::null());
        }

        // Source routes (`@a,@b:user@host`) are ignored.
        let path = if path.starts_with('@') {
            path.split_once(':').map_or(path, |(_, mailbox)| mailbox)
        } else {
            path
        };
        Self::new(path)
    }

    /// Returns true for the null sender.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::InvalidAddress(format!(
                "Address contains whitespace: {addr}"
            )));
        }

        let Some((local, domain)) = addr.rsplit_once('@') else {
            return Err(Error::InvalidAddress("Address must contain @".into()));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
