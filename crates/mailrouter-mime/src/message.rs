//! Message view over raw bytes.

use crate::error::{Error, Result};
use crate::header::Headers;

/// Parsed header section of a raw message. The body is never read.
#[derive(Debug, Clone)]
pub struct Message {
    headers: Headers,
}

impl Message {
    /// Parses the header section of `data`.
    ///
    /// Non-UTF-8 header bytes are replaced rather than rejected. A message
    /// with no blank line is treated as all headers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] for empty input, or a header parse error.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::Empty);
        }

        let text = String::from_utf8_lossy(&data[..header_section_len(data)]);
        let headers = Headers::parse(&text)?;

        Ok(Self { headers })
    }

    /// Decoded Subject, or an empty string when absent.
    #[must_use]
    pub fn subject(&self) -> String {
        self.headers.get_decoded("Subject").unwrap_or_default()
    }

    /// Raw Message-ID header, if present.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("Message-ID")
    }
}

/// Length of the header text, up to and including the line break before
/// the blank separator line.
fn header_section_len(data: &[u8]) -> usize {
    // A message that opens with a blank line has no headers.
    if data.starts_with(b"\r\n") || data.starts_with(b"\n") {
        return 0;
    }

    let mut i = 0;
    while let Some(pos) = data[i..].iter().position(|&b| b == b'\n') {
        let nl = i + pos;
        let next = &data[nl + 1..];
        if next.starts_with(b"\r\n") || next.starts_with(b"\n") {
            return nl + 1;
        }
        i = nl + 1;
    }
    data.len()
}
