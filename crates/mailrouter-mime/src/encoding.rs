//! RFC 2047 encoded-word decoding for header values.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes every encoded word in a header value.
///
/// Words that fail to decode are kept verbatim, and whitespace between two
/// adjacent encoded words is dropped (RFC 2047 section 6.2).
#[must_use]
pub fn decode_header_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut last_was_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);

        let Some((word, consumed)) = parse_encoded_word(candidate) else {
            out.push_str(before);
            out.push_str("=?");
            last_was_word = false;
            rest = &candidate[2..];
            continue;
        };

        if let Ok(text) = decode_encoded_word(word.charset, word.encoding, word.text) {
            let folded_gap = last_was_word && before.chars().all(char::is_whitespace);
            if !folded_gap {
                out.push_str(before);
            }
            out.push_str(&text);
            last_was_word = true;
        } else {
            out.push_str(before);
            out.push_str(&candidate[..consumed]);
            last_was_word = false;
        }
        rest = &candidate[consumed..];
    }

    out.push_str(rest);
    out
}

struct EncodedWord<'a> {
    charset: &'a str,
    encoding: &'a str,
    text: &'a str,
}

/// Splits `=?charset?enc?text?=` off the front of `s`, returning the parts
/// and the number of bytes consumed.
fn parse_encoded_word(s: &str) -> Option<(EncodedWord<'_>, usize)> {
    let body = s.strip_prefix("=?")?;
    let (charset, after_charset) = body.split_once('?')?;
    let (encoding, after_encoding) = after_charset.split_once('?')?;
    let end = after_encoding.find("?=")?;
    let text = &after_encoding[..end];

    if charset.is_empty()
        || encoding.len() != 1
        || text.contains(char::is_whitespace)
        || charset.contains(char::is_whitespace)
    {
        return None;
    }

    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;
    Some((
        EncodedWord {
            charset,
            encoding,
            text,
        },
        consumed,
    ))
}

/// Decodes the payload of a single encoded word.
///
/// `charset` may carry an RFC 2231 language suffix (`utf-8*en`). UTF-8,
/// US-ASCII and ISO-8859-1 are understood; anything else is read as
/// UTF-8 with replacement characters.
///
/// # Errors
///
/// Returns an error for an unknown encoding letter or a malformed payload.
pub fn decode_encoded_word(charset: &str, encoding: &str, text: &str) -> Result<String> {
    let bytes = match encoding {
        "B" | "b" => STANDARD.decode(text)?,
        "Q" | "q" => decode_q(text)?,
        other => return Err(Error::InvalidEncoding(format!("Unknown encoding: {other}"))),
    };

    let charset = charset
        .split_once('*')
        .map_or(charset, |(name, _lang)| name)
        .to_ascii_lowercase();

    Ok(match charset.as_str() {
        "iso-8859-1" | "latin1" | "latin-1" => bytes.iter().map(|&b| char::from(b)).collect(),
        _ => String::from_utf8_lossy(&bytes).into_owned(),
    })
}

/// Q encoding: quoted-printable with `_` standing for a space.
fn decode_q(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();

    while let Some(b) = bytes.next() {
        match b {
            b'_' => out.push(b' '),
            b'=' => {
                let hi = bytes.next();
                let lo = bytes.next();
                let (Some(hi), Some(lo)) = (hi, lo) else {
                    return Err(Error::InvalidEncoding(
                        "Incomplete escape sequence".to_string(),
                    ));
                };
                let byte = hex_value(hi)
                    .zip(hex_value(lo))
                    .map(|(h, l)| (h << 4) | l)
                    .ok_or_else(|| {
                        Error::InvalidEncoding(format!(
                            "Invalid hex escape: ={}{}",
                            char::from(hi),
                            char::from(lo)
                        ))
                    })?;
                out.push(byte);
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_untouched() {
        assert_eq!(decode_header_value("Weekly report"), "Weekly report");
        assert_eq!(decode_header_value("a =? b"), "a =? b");
    }

    #[test]
    fn test_base64_word() {
        assert_eq!(decode_header_value("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_q_word_with_underscore() {
        assert_eq!(
            decode_header_value("=?UTF-8?Q?Caf=C3=A9_menu?="),
            "Café menu"
        );
    }

    #[test]
    fn test_adjacent_words_join_without_space() {
        assert_eq!(
            decode_header_value("=?utf-8?Q?Hello?= \r\n =?utf-8?Q?_World?="),
            "Hello World"
        );
    }

    #[test]
    fn test_mixed_plain_and_encoded() {
        assert_eq!(
            decode_header_value("Re: =?iso-8859-1?Q?caf=E9?= order"),
            "Re: café order"
        );
    }

    #[test]
    fn test_bad_word_kept_verbatim() {
        assert_eq!(
            decode_header_value("=?utf-8?B?!!!?= tail"),
            "=?utf-8?B?!!!?= tail"
        );
        assert_eq!(
            decode_header_value("=?utf-8?X?abc?="),
            "=?utf-8?X?abc?="
        );
    }

    #[test]
    fn test_language_suffix() {
        assert_eq!(decode_encoded_word("utf-8*en", "Q", "hi").unwrap(), "hi");
    }

    #[test]
    fn test_q_incomplete_escape() {
        assert!(decode_encoded_word("utf-8", "Q", "abc=4").is_err());
        assert!(decode_encoded_word("utf-8", "Q", "abc=zz").is_err());
    }
}
