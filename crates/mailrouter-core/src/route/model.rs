//! Route data model.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Id of the discard route.
pub const DROP_ROUTE_ID: &str = "DROP";

/// Display name of the discard route.
pub const DROP_ROUTE_NAME: &str = "Drop";

/// How to authenticate to the destination server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthMode {
    /// Anonymous submission.
    #[default]
    None,
    /// SASL PLAIN, only to the route's own host.
    Plain,
    /// SASL CRAM-MD5.
    CramMd5,
}

impl AuthMode {
    /// Configuration file spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Plain => "plain",
            Self::CramMd5 => "crammd5",
        }
    }

    /// Parses the configuration file spelling. Unknown values mean no
    /// authentication.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Self::Plain,
            "crammd5" | "cram-md5" => Self::CramMd5,
            _ => Self::None,
        }
    }
}

impl From<String> for AuthMode {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<AuthMode> for String {
    fn from(mode: AuthMode) -> Self {
        mode.as_str().to_string()
    }
}

/// An outbound destination.
///
/// Serialized with the configuration file's field names (`Id`, `Name`,
/// `To`, `Hostname`, `Port`, `AuthType`, `Username`, `Password`,
/// `IsDefault`).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Route {
    /// Unique identifier.
    pub id: String,
    /// Display name, recorded in the activity log on delivery.
    pub name: String,
    /// When set, replaces every envelope recipient.
    pub to: String,
    /// Destination host.
    pub hostname: String,
    /// Destination port.
    pub port: u16,
    /// Authentication mode.
    #[serde(rename = "AuthType")]
    pub auth: AuthMode,
    /// Username for PLAIN / CRAM-MD5.
    pub username: String,
    /// Password for PLAIN / CRAM-MD5.
    pub password: String,
    /// Used when no filter matches.
    pub is_default: bool,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("to", &self.to)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("auth", &self.auth)
            .field("username", &self.username)
            .field("is_default", &self.is_default)
            .finish_non_exhaustive()
    }
}

impl Route {
    /// The discard route.
    #[must_use]
    pub fn drop_route(is_default: bool) -> Self {
        Self {
            id: DROP_ROUTE_ID.to_string(),
            name: DROP_ROUTE_NAME.to_string(),
            is_default,
            ..Self::default()
        }
    }

    /// True for the discard route.
    #[must_use]
    pub fn is_drop(&self) -> bool {
        self.id == DROP_ROUTE_ID
    }

    /// `hostname:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    /// Recipients to deliver to: the override if set, else `envelope`.
    #[must_use]
    pub fn recipients(&self, envelope: &[String]) -> Vec<String> {
        if self.to.is_empty() {
            envelope.to_vec()
        } else {
            vec![self.to.clone()]
        }
    }

    /// Checks that an ordinary route can be stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRoute`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        let problem = if self.id.is_empty() {
            "id is required"
        } else if self.is_drop() {
            "the DROP route is built in"
        } else if self.name.trim().is_empty() {
            "name is required"
        } else if self.hostname.trim().is_empty() {
            "hostname is required"
        } else if self.port == 0 {
            "port must be 1-65535"
        } else if self.auth != AuthMode::None && self.username.is_empty() {
            "username is required for authentication"
        } else {
            return Ok(());
        };
        Err(Error::InvalidRoute(format!("{}: {problem}", self.id)))
    }
}
