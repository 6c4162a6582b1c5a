//! Header section handling.

use crate::encoding::decode_header_value;
use crate::error::{Error, Result};

/// Header fields in the order they appeared.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Gets the first value for a header (case-insensitive name).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value of a header with encoded words decoded.
    #[must_use]
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_header_value)
    }

    /// Parses a header section.
    ///
    /// Parsing stops at the first empty line. Folded lines (starting with
    /// space or tab) are unfolded into the previous field with a single
    /// space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] for a line without a colon, an empty
    /// or non-printable field name, or a continuation with nothing to
    /// continue.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for (idx, raw) in text.split('\n').enumerate() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.is_empty() {
                break;
            }

            if line.starts_with([' ', '\t']) {
                let Some((_, value)) = current.as_mut() else {
                    return Err(invalid(idx, line));
                };
                let folded = line.trim();
                if !folded.is_empty() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(folded);
                }
                continue;
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(invalid(idx, line));
            };
            let name = name.trim_end();
            if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic()) {
                return Err(invalid(idx, line));
            }

            if let Some((n, v)) = current.take() {
                headers.add(n, v);
            }
            current = Some((name.to_string(), value.trim().to_string()));
        }

        if let Some((n, v)) = current {
            headers.add(n, v);
        }

        Ok(headers)
    }
}

fn invalid(idx: usize, line: &str) -> Error {
    Error::InvalidHeader {
        line: idx + 1,
        text: line.chars().take(78).collect(),
    }
}
