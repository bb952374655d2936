//! MIME header handling.
//!
//! [`HeaderList`] keeps headers in wire order, allows duplicates and looks
//! names up case-insensitively. Values are stored unfolded.

use std::fmt;

use crate::encoding::rfc2047;
use crate::error::{Error, Result};
use crate::options::FormatOptions;

/// Column at which long header lines are folded.
const FOLD_WIDTH: usize = 78;

/// A single header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    /// Creates a header, unfolding the value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: &str) -> Self {
        Self {
            name: name.into(),
            value: unfold(value),
        }
    }

    /// Field name with its original spelling.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw (possibly RFC 2047 encoded) value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Value with encoded-words decoded.
    #[must_use]
    pub fn decoded_value(&self) -> String {
        rfc2047::decode_header(&self.value)
    }

    /// Returns true if the name matches case-insensitively.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered collection of email headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    headers: Vec<Header>,
}

impl HeaderList {
    /// Creates a new empty header collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Number of header fields, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.is(name))
            .map(|h| h.value.as_str())
    }

    /// Gets all values for a header, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| h.is(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    /// Returns true if at least one field named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.is(name))
    }

    /// Adds a header at the end.
    pub fn append(&mut self, name: impl Into<String>, value: &str) {
        self.headers.push(Header::new(name, value));
    }

    /// Adds a header at the end, RFC 2047 encoding non-ASCII text with
    /// `charset`.
    pub fn append_encoded(&mut self, name: impl Into<String>, value: &str, charset: &str) {
        self.append(name, &rfc2047::encode_word(value, charset));
    }

    /// Adds a header at the front.
    pub fn prepend(&mut self, name: impl Into<String>, value: &str) {
        self.headers.insert(0, Header::new(name, value));
    }

    /// Sets a header value in place of the first existing field and removes
    /// any duplicates. Appends if the header is absent.
    pub fn set(&mut self, name: impl Into<String>, value: &str) {
        let name = name.into();
        let value = unfold(value);
        let mut seen = false;
        self.headers.retain_mut(|h| {
            if !h.is(&name) {
                return true;
            }
            if seen {
                return false;
            }
            seen = true;
            h.value.clone_from(&value);
            true
        });
        if !seen {
            self.headers.push(Header { name, value });
        }
    }

    /// Sets a header, RFC 2047 encoding non-ASCII text with `charset`.
    pub fn set_encoded(&mut self, name: impl Into<String>, value: &str, charset: &str) {
        let encoded = rfc2047::encode_word(value, charset);
        self.set(name, &encoded);
    }

    /// Removes the first field named `name`. Returns true if one was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        if let Some(pos) = self.headers.iter().position(|h| h.is(name)) {
            self.headers.remove(pos);
            true
        } else {
            false
        }
    }

    /// Removes every field named `name`. Returns true if any were removed.
    pub fn remove_all(&mut self, name: &str) -> bool {
        let before = self.headers.len();
        self.headers.retain(|h| !h.is(name));
        self.headers.len() != before
    }

    /// Replaces the value of the first `name` field whose value equals `old`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderNotFound`] if no such field exists.
    pub fn replace(&mut self, name: &str, old: &str, new: &str) -> Result<()> {
        let header = self
            .headers
            .iter_mut()
            .find(|h| h.is(name) && h.value == old)
            .ok_or_else(|| Error::HeaderNotFound {
                name: name.to_string(),
                value: old.to_string(),
            })?;
        header.value = unfold(new);
        Ok(())
    }

    /// Calls `f` for every field in order, duplicates included. The first
    /// error stops the walk and is returned.
    ///
    /// # Errors
    ///
    /// Propagates the callback's error.
    pub fn walk<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> Result<()>,
    {
        for header in &self.headers {
            f(&header.name, &header.value)?;
        }
        Ok(())
    }

    /// Returns an iterator over all headers.
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.headers.iter()
    }

    /// Groups values by name, in order of first appearance.
    #[must_use]
    pub fn to_multimap(&self) -> Vec<(String, Vec<String>)> {
        let mut map: Vec<(String, Vec<String>)> = Vec::new();
        for header in &self.headers {
            if let Some((_, values)) = map
                .iter_mut()
                .find(|(name, _)| name.eq_ignore_ascii_case(&header.name))
            {
                values.push(header.value.clone());
            } else {
                map.push((header.name.clone(), vec![header.value.clone()]));
            }
        }
        map
    }

    /// Moves every field matching `pred` out of this list, keeping order.
    pub(crate) fn extract(&mut self, pred: impl Fn(&Header) -> bool) -> Self {
        let (taken, kept): (Vec<Header>, Vec<Header>) = std::mem::take(&mut self.headers)
            .into_iter()
            .partition(|h| pred(h));
        self.headers = kept;
        Self { headers: taken }
    }

    /// Parses a header block from text.
    ///
    /// Headers are in the format:
    /// ```text
    /// Header-Name: value
    ///  continuation
    /// ```
    ///
    /// Parsing stops at the first empty line.
    ///
    /// # Errors
    ///
    /// Returns a structural error for a line that is not a header field.
    #[cfg(test)]
    pub(crate) fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut offset = 0;
        for line in text.split_inclusive('\n') {
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                break;
            }
            if trimmed.starts_with([' ', '\t']) {
                if let Some(last) = headers.headers.last_mut() {
                    last.value.push(' ');
                    last.value.push_str(trimmed.trim());
                    last.value = last.value.trim().to_string();
                }
            } else {
                let (name, value) = split_field(trimmed)
                    .ok_or_else(|| Error::structural(offset, "header line without a field name"))?;
                headers.append(name, value);
            }
            offset += line.len();
        }
        Ok(headers)
    }

    /// Writes every field as `Name: Value` plus newline.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>, options: &FormatOptions) {
        let newline = options.newline.as_bytes();
        for header in &self.headers {
            write_field(out, &header.name, &header.value, options.fold_headers, newline);
        }
    }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}

impl fmt::Display for HeaderList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Vec::new();
        self.write_to(&mut out, &FormatOptions::default());
        f.write_str(&String::from_utf8_lossy(&out))
    }
}

/// Splits `Name: value`, rejecting empty names and names with whitespace.
pub(crate) fn split_field(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim_end_matches([' ', '\t']);
    if name.is_empty() || name.contains(|c: char| c.is_ascii_whitespace() || c.is_ascii_control()) {
        return None;
    }
    Some((name, value.trim()))
}

/// Removes line breaks from a folded value and trims it.
pub(crate) fn unfold(value: &str) -> String {
    if !value.contains(['\r', '\n']) {
        return value.trim().to_string();
    }
    value
        .chars()
        .filter(|&c| c != '\r' && c != '\n')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Writes one field, folding at whitespace once a line passes 78 columns.
pub(crate) fn write_field(out: &mut Vec<u8>, name: &str, value: &str, fold: bool, newline: &[u8]) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    if !fold || name.len() + 2 + value.len() <= FOLD_WIDTH {
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(newline);
        return;
    }

    let mut column = name.len() + 2;
    for (i, piece) in split_at_whitespace(value).into_iter().enumerate() {
        let leads_with_space = piece.starts_with([' ', '\t']);
        if i > 0 && leads_with_space && column + piece.len() > FOLD_WIDTH && column > 0 {
            out.extend_from_slice(newline);
            column = 0;
        }
        out.extend_from_slice(piece.as_bytes());
        column += piece.len();
    }
    out.extend_from_slice(newline);
}

/// Splits `value` into pieces that each start with their leading whitespace.
fn split_at_whitespace(value: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let bytes = value.as_bytes();
    for i in 1..bytes.len() {
        let is_space = matches!(bytes[i], b' ' | b'\t');
        let prev_space = matches!(bytes[i - 1], b' ' | b'\t');
        if is_space && !prev_space {
            pieces.push(&value[start..i]);
            start = i;
        }
    }
    pieces.push(&value[start..]);
    pieces
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
    use crate::options::Newline;

    #[test]
    fn test_headers_new() {
        let headers = HeaderList::new();
        assert!(headers.is_empty());
        assert_eq!(headers.get("Subject"), None);
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = HeaderList::new();
        headers.append("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.iter().next().unwrap().name(), "Content-Type");
    }

    #[test]
    fn test_headers_preserve_order_and_duplicates() {
        let mut headers = HeaderList::new();
        headers.append("Received", "b");
        headers.prepend("Received", "a");
        headers.append("X-Other", "x");
        headers.append("received", "c");
        assert_eq!(headers.get_all("RECEIVED"), vec!["a", "b", "c"]);
        let names: Vec<&str> = headers.iter().map(Header::name).collect();
        assert_eq!(names, vec!["Received", "Received", "X-Other", "received"]);
    }

    #[test]
    fn test_headers_set() {
        let mut headers = HeaderList::new();
        headers.append("X-A", "1");
        headers.append("To", "alice@example.com");
        headers.append("X-B", "2");
        headers.append("To", "bob@example.com");

        headers.set("to", "charlie@example.com");
        assert_eq!(headers.get_all("To"), vec!["charlie@example.com"]);
        let names: Vec<&str> = headers.iter().map(Header::name).collect();
        assert_eq!(names, vec!["X-A", "To", "X-B"]);

        headers.set("Subject", "new");
        assert_eq!(headers.iter().last().unwrap().name(), "Subject");
    }

    #[test]
    fn test_set_encoded() {
        let mut headers = HeaderList::new();
        headers.set_encoded("Subject", "Héllo", "UTF-8");
        assert_eq!(headers.get("Subject"), Some("=?UTF-8?b?SMOpbGxv?="));
        assert_eq!(headers.iter().next().unwrap().decoded_value(), "Héllo");
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = HeaderList::new();
        headers.append("Subject", "one");
        headers.append("Subject", "two");
        assert!(headers.remove("subject"));
        assert_eq!(headers.get("Subject"), Some("two"));
        assert!(headers.remove_all("Subject"));
        assert!(!headers.remove_all("Subject"));
        assert!(!headers.remove("Subject"));
    }

    #[test]
    fn test_replace() {
        let mut headers = HeaderList::new();
        headers.append("X-Tag", "a");
        headers.append("X-Tag", "b");
        headers.replace("x-tag", "b", "c").unwrap();
        assert_eq!(headers.get_all("X-Tag"), vec!["a", "c"]);

        let err = headers.replace("X-Tag", "zzz", "d").unwrap_err();
        assert!(matches!(err, Error::HeaderNotFound { .. }));
    }

    #[test]
    fn test_walk_stops_on_error() {
        let mut headers = HeaderList::new();
        headers.append("A", "1");
        headers.append("B", "2");
        headers.append("A", "3");

        let mut seen = Vec::new();
        headers
            .walk(|name, value| {
                seen.push(format!("{name}={value}"));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec!["A=1", "B=2", "A=3"]);

        let mut count = 0;
        let result = headers.walk(|_, _| {
            count += 1;
            Err(Error::Stream("stop".into()))
        });
        assert!(result.is_err());
        assert_eq!(count, 1);
    }

    #[test]
    fn test_multimap() {
        let mut headers = HeaderList::new();
        headers.append("To", "a");
        headers.append("Subject", "s");
        headers.append("to", "b");
        let map = headers.to_multimap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0], ("To".to_string(), vec!["a".to_string(), "b".to_string()]));
        assert_eq!(map[1].0, "Subject");
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            "\tcharset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = HeaderList::parse(text).unwrap();
        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_parse_rejects_bad_line() {
        let err = HeaderList::parse("Subject: ok\nnot a header\n\n").unwrap_err();
        assert!(matches!(err, Error::Structural { offset: 12, .. }));
        assert!(HeaderList::parse("Bad Name: x\n").is_err());
    }

    #[test]
    fn test_append_encoded() {
        let mut headers = HeaderList::new();
        headers.append_encoded("X-Note", "naïve", "UTF-8");
        headers.append_encoded("X-Note", "ascii", "UTF-8");
        assert_eq!(headers.get_all("X-Note"), vec!["=?UTF-8?b?bmHDr3Zl?=", "ascii"]);
        assert!(headers.to_string().is_ascii());
    }

    #[test]
    fn test_unfolded_storage() {
        let mut headers = HeaderList::new();
        headers.append("Subject", "  folded\r\n value  ");
        assert_eq!(headers.get("Subject"), Some("folded value"));
    }

    #[test]
    fn test_display_and_folding() {
        let mut headers = HeaderList::new();
        headers.append("From", "sender@example.com");
        assert_eq!(headers.to_string(), "From: sender@example.com\r\n");

        let long = "word ".repeat(30);
        headers.set("Subject", long.trim());
        let mut out = Vec::new();
        headers.write_to(&mut out, &FormatOptions::builder().newline(Newline::Unix).build());
        let text = String::from_utf8(out).unwrap();
        for line in text.lines() {
            assert!(line.len() <= FOLD_WIDTH);
        }
        let reparsed = HeaderList::parse(&text).unwrap();
        assert_eq!(reparsed.get("Subject"), Some(long.trim()));
    }

    #[test]
    fn test_no_folding_when_disabled() {
        let mut headers = HeaderList::new();
        let long = "x ".repeat(60);
        headers.append("X-Long", &long);
        let mut out = Vec::new();
        headers.write_to(&mut out, &FormatOptions::builder().fold_headers(false).build());
        assert_eq!(out.iter().filter(|&&b| b == b'\n').count(), 1);
    }
}
