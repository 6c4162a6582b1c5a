//! Error types for header parsing.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A header line that is neither `Name: value` nor a continuation.
    #[error("Invalid header on line {line}: {text}")]
    InvalidHeader {
        /// 1-based line number within the header section.
        line: usize,
        /// The offending line, truncated.
        text: String,
    },

    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// The message has no content at all.
    #[error("Empty message")]
    Empty,
}
