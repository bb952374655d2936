//! Charset lookup and conversion.
//!
//! Labels are resolved with the WHATWG Encoding Standard rules, so the usual
//! aliases (`latin1`, `iso-8859-1`, `cp1252`, `utf8`) all work.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};

use crate::error::{Error, Result};

/// Looks up an encoding by charset label.
#[must_use]
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().trim_matches('"').as_bytes())
}

/// Returns true if `label` names UTF-8 or plain ASCII.
#[must_use]
pub fn is_utf8_compatible(label: &str) -> bool {
    let label = label.trim();
    label.eq_ignore_ascii_case("us-ascii")
        || label.eq_ignore_ascii_case("ascii")
        || lookup(label).is_some_and(|enc| enc == UTF_8)
}

/// Decodes `bytes` from `label` into UTF-8.
///
/// # Errors
///
/// Returns [`Error::Charset`] if the label is unknown or the bytes are not
/// valid in that charset.
pub fn decode<'a>(bytes: &'a [u8], label: &str) -> Result<Cow<'a, str>> {
    if label.trim().eq_ignore_ascii_case("us-ascii") {
        return std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|_| Error::Charset(label.to_string()));
    }
    let encoding = lookup(label).ok_or_else(|| Error::Charset(label.to_string()))?;
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| Error::Charset(label.to_string()))
}

/// Decodes `bytes` from `label`, replacing malformed sequences and falling
/// back to UTF-8 for unknown labels.
#[must_use]
pub fn decode_lossy<'a>(bytes: &'a [u8], label: &str) -> Cow<'a, str> {
    let encoding = lookup(label).unwrap_or(UTF_8);
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text
}

/// Encodes UTF-8 `text` into `label`.
///
/// # Errors
///
/// Returns [`Error::Charset`] if the label is unknown or the text contains
/// characters the charset cannot represent.
pub fn encode<'a>(text: &'a str, label: &str) -> Result<Cow<'a, [u8]>> {
    let encoding = lookup(label).ok_or_else(|| Error::Charset(label.to_string()))?;
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(Error::Charset(label.to_string()));
    }
    Ok(bytes)
}

/// Converts `bytes` from one charset to another.
///
/// # Errors
///
/// Returns [`Error::Charset`] if either label is unknown or the content
/// cannot be represented.
pub fn convert(bytes: &[u8], from: &str, to: &str) -> Result<Vec<u8>> {
    let text = decode(bytes, from)?;
    Ok(encode(&text, to)?.into_owned())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_aliases() {
        assert!(lookup("utf-8").is_some());
        assert!(lookup("UTF8").is_some());
        assert!(lookup("\"iso-8859-1\"").is_some());
        assert!(lookup("x-no-such-charset").is_none());
    }

    #[test]
    fn test_decode_latin1() {
        let text = decode(b"caf\xe9", "iso-8859-1").unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert!(matches!(decode(b"\xff\xfe", "utf-8"), Err(Error::Charset(_))));
        assert_eq!(decode_lossy(b"ok\xff", "utf-8"), "ok\u{fffd}");
    }

    #[test]
    fn test_unknown_label() {
        assert!(matches!(decode(b"x", "x-bogus"), Err(Error::Charset(l)) if l == "x-bogus"));
    }

    #[test]
    fn test_convert_roundtrip() {
        let latin = convert("naïve".as_bytes(), "utf-8", "windows-1252").unwrap();
        assert_eq!(latin, b"na\xefve");
        let back = convert(&latin, "windows-1252", "utf-8").unwrap();
        assert_eq!(back, "naïve".as_bytes());
    }

    #[test]
    fn test_utf8_compatible() {
        assert!(is_utf8_compatible("US-ASCII"));
        assert!(is_utf8_compatible("utf-8"));
        assert!(!is_utf8_compatible("iso-8859-1"));
    }
}
