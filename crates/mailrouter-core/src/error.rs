//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound message could not be parsed.
    #[error("Message parse error: {0}")]
    Mime(#[from] mailrouter_mime::Error),

    /// A destination id that is not in the route table.
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// No route carries the default flag.
    #[error("No default route configured")]
    NoDefaultRoute,

    /// Filter not found.
    #[error("Filter not found: {0}")]
    FilterNotFound(String),

    /// A filter that cannot be stored as given.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// A route that cannot be stored as given.
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
