//! RFC 2047 encoded-words for header values.
//!
//! Format: `=?charset?encoding?encoded-text?=`

use ::base64::Engine;
use ::base64::engine::general_purpose::STANDARD;

use super::base64::LENIENT;
use crate::charset;

/// Maximum length of a single encoded-word.
const MAX_WORD_LENGTH: usize = 75;

/// Encodes `text` as one or more B encoded-words when it contains non-ASCII
/// characters; ASCII text is returned unchanged.
///
/// Words are split on character boundaries so that each one stays within
/// 75 characters, and joined with a single space. Text that cannot be
/// represented in `charset` is encoded as UTF-8 instead.
#[must_use]
pub fn encode_word(text: &str, charset: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }
    let charset = if charset::encode(text, charset).is_ok() {
        charset
    } else {
        "UTF-8"
    };

    let overhead = charset.len() + "=??b??=".len();
    let max_bytes = MAX_WORD_LENGTH.saturating_sub(overhead).max(4) / 4 * 3;

    let mut words = Vec::new();
    let mut chunk_start = 0;
    let mut chunk_bytes = 0;
    for (idx, ch) in text.char_indices() {
        let len = encoded_len(ch, charset);
        if chunk_bytes + len > max_bytes && idx > chunk_start {
            words.push(make_word(&text[chunk_start..idx], charset));
            chunk_start = idx;
            chunk_bytes = 0;
        }
        chunk_bytes += len;
    }
    words.push(make_word(&text[chunk_start..], charset));
    words.join(" ")
}

fn encoded_len(ch: char, label: &str) -> usize {
    let mut buf = [0u8; 4];
    let s = ch.encode_utf8(&mut buf);
    charset::encode(s, label).map_or(s.len(), |b| b.len())
}

fn make_word(text: &str, label: &str) -> String {
    let bytes = charset::encode(text, label)
        .map_or_else(|_| text.as_bytes().to_vec(), std::borrow::Cow::into_owned);
    format!("=?{label}?b?{}?=", STANDARD.encode(bytes))
}

/// Decodes every encoded-word in a header value.
///
/// Whitespace between two adjacent encoded-words is dropped. Words with an
/// unknown charset or undecodable payload are left as they are.
#[must_use]
pub fn decode_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut previous_was_word = false;

    while let Some(pos) = rest.find("=?") {
        let (before, candidate) = rest.split_at(pos);
        if let Some((decoded, consumed)) = decode_word(candidate) {
            let only_space = before.bytes().all(|b| b == b' ' || b == b'\t');
            if !(previous_was_word && only_space) {
                out.push_str(before);
            }
            out.push_str(&decoded);
            rest = &candidate[consumed..];
            previous_was_word = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            previous_was_word = false;
        }
    }
    out.push_str(rest);
    out
}

/// Decodes one encoded-word at the start of `input`, returning the text and
/// the number of bytes consumed.
fn decode_word(input: &str) -> Option<(String, usize)> {
    let inner = input.strip_prefix("=?")?;
    let charset_end = inner.find('?')?;
    let label = &inner[..charset_end];
    let after_charset = &inner[charset_end + 1..];
    let mut chars = after_charset.chars();
    let kind = chars.next()?;
    if !kind.is_ascii() || chars.next()? != '?' {
        return None;
    }
    let payload_area = &after_charset[2..];
    let payload_end = payload_area.find("?=")?;
    let payload = &payload_area[..payload_end];
    if label.is_empty() || payload.contains(|c: char| c.is_ascii_whitespace()) {
        return None;
    }

    let bytes = match kind.to_ascii_uppercase() {
        'B' => LENIENT.decode(payload.trim_end_matches('=')).ok()?,
        'Q' => decode_q(payload),
        _ => return None,
    };

    // RFC 2231 language suffix: `charset*lang`.
    let label = label.split('*').next().unwrap_or(label);
    charset::lookup(label)?;
    let text = charset::decode_lossy(&bytes, label).into_owned();
    let consumed = 2 + charset_end + 1 + 2 + payload_end + 2;
    Some((text, consumed))
}

fn decode_q(payload: &str) -> Vec<u8> {
    let spaced: Vec<u8> = payload
        .bytes()
        .map(|b| if b == b'_' { b' ' } else { b })
        .collect();
    super::quoted_printable::decode_slice(&spaced)
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
    fn test_encode_ascii_passthrough() {
        assert_eq!(encode_word("Hello", "UTF-8"), "Hello");
    }

    #[test]
    fn test_encode_word() {
        assert_eq!(encode_word("Héllo", "UTF-8"), "=?UTF-8?b?SMOpbGxv?=");
    }

    #[test]
    fn test_encode_with_legacy_charset() {
        assert_eq!(encode_word("café", "iso-8859-1"), "=?iso-8859-1?b?Y2Fm6Q==?=");
        // Not representable in latin1: falls back to UTF-8.
        assert!(encode_word("日本", "iso-8859-1").starts_with("=?UTF-8?b?"));
    }

    #[test]
    fn test_encode_splits_long_text() {
        let text = "ü".repeat(80);
        let encoded = encode_word(&text, "UTF-8");
        let words: Vec<&str> = encoded.split(' ').collect();
        assert!(words.len() > 1);
        for word in &words {
            assert!(word.len() <= MAX_WORD_LENGTH);
            assert!(word.starts_with("=?UTF-8?b?"));
        }
        assert_eq!(decode_header(&encoded), text);
    }

    #[test]
    fn test_decode_b_and_q() {
        assert_eq!(decode_header("=?utf-8?B?SMOpbGxv?="), "Héllo");
        assert_eq!(decode_header("=?utf-8?Q?H=C3=A9llo_there?="), "Héllo there");
        assert_eq!(decode_header("=?ISO-8859-1?q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_adjacent_words_drop_whitespace() {
        assert_eq!(decode_header("=?utf-8?q?a?= =?utf-8?q?b?="), "ab");
        assert_eq!(decode_header("=?utf-8?q?a?= x =?utf-8?q?b?="), "a x b");
        assert_eq!(decode_header("Re: =?utf-8?q?caf=C3=A9?= ok"), "Re: café ok");
    }

    #[test]
    fn test_decode_leaves_bad_words() {
        assert_eq!(decode_header("=?x-bogus?q?abc?="), "=?x-bogus?q?abc?=");
        assert_eq!(decode_header("=?utf-8?z?abc?="), "=?utf-8?z?abc?=");
        assert_eq!(decode_header("price =? 5"), "price =? 5");
    }

    #[test]
    fn test_decode_language_suffix() {
        assert_eq!(decode_header("=?utf-8*en?q?hi?="), "hi");
    }
}
