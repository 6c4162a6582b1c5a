//! ESMTP extension keywords.

/// An extension line from an EHLO reply.
///
/// Only the keywords the router acts on get their own variant; the rest
/// are kept as [`Extension::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// `AUTH` with the mechanisms we know how to speak.
    Auth(Vec<AuthMechanism>),
    /// `SIZE [limit]`
    Size(Option<usize>),
    /// `8BITMIME`
    EightBitMime,
    /// Any other line, verbatim.
    Unknown(String),
}

impl Extension {
    /// Parses one EHLO line (code prefix already removed).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap_or_default();

        if keyword.eq_ignore_ascii_case("AUTH") {
            Self::Auth(words.filter_map(AuthMechanism::parse).collect())
        } else if keyword.eq_ignore_ascii_case("SIZE") {
            Self::Size(words.next().and_then(|limit| limit.parse().ok()))
        } else if keyword.eq_ignore_ascii_case("8BITMIME") {
            Self::EightBitMime
        } else {
            Self::Unknown(line.to_string())
        }
    }

    /// The line as the inbound listener advertises it.
    #[must_use]
    pub fn to_ehlo_line(&self) -> String {
        match self {
            Self::Auth(mechanisms) => mechanisms
                .iter()
                .fold(String::from("AUTH"), |mut line, mechanism| {
                    line.push(' ');
                    line.push_str(mechanism.as_str());
                    line
                }),
            Self::Size(Some(limit)) => format!("SIZE {limit}"),
            Self::Size(None) => "SIZE".to_string(),
            Self::EightBitMime => "8BITMIME".to_string(),
            Self::Unknown(raw) => raw.clone(),
        }
    }
}

/// SASL mechanisms a route can authenticate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// `PLAIN`
    Plain,
    /// `CRAM-MD5`
    CramMd5,
}

impl AuthMechanism {
    /// Matches a mechanism name, ignoring case. Unsupported names give
    /// `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("PLAIN") {
            Some(Self::Plain)
        } else if name.eq_ignore_ascii_case("CRAM-MD5") {
            Some(Self::CramMd5)
        } else {
            None
        }
    }

    /// Wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::CramMd5 => "CRAM-MD5",
        }
    }
}
