//! Ordered header parameter lists (`; name=value` pairs).
//!
//! Parsing understands quoted strings, RFC 2231 extended and continued
//! parameters (`name*=utf-8''caf%C3%A9`, `name*0=...; name*1=...`) and
//! RFC 2047 encoded-words inside quoted values. Values are stored decoded.

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::charset;
use crate::encoding::rfc2047;

/// `tspecials` from RFC 2045; values containing any of these are quoted.
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// Characters left unescaped in RFC 2231 extended values.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// A single `name=value` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    name: String,
    value: String,
}

impl Param {
    /// Creates a parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parameter name as written.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded parameter value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Ordered parameter list with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamList {
    params: Vec<Param>,
}

impl ParamList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Returns the value of the first parameter named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }

    /// Sets `name` to `value`, keeping its position if it already exists.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self
            .params
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&name))
        {
            existing.value = value;
        } else {
            self.params.push(Param { name, value });
        }
    }

    /// Removes `name`. Returns true if it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.params.len();
        self.params.retain(|p| !p.name.eq_ignore_ascii_case(name));
        self.params.len() != before
    }

    /// Iterates over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_str()))
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parses the parameter section of a header value (everything after the
    /// first `;`). Malformed entries are skipped.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let mut raw = Vec::new();
        let mut rest = s;
        loop {
            rest = rest.trim_start_matches(|c: char| c == ';' || c.is_ascii_whitespace());
            if rest.is_empty() {
                break;
            }
            let name_end = rest.find(['=', ';']).unwrap_or(rest.len());
            let name = rest[..name_end].trim();
            rest = &rest[name_end..];
            let Some(after_eq) = rest.strip_prefix('=') else {
                if !name.is_empty() {
                    tracing::trace!(name, "skipping parameter without value");
                }
                continue;
            };
            let (value, quoted, remaining) = read_value(after_eq.trim_start());
            rest = remaining;
            if !name.is_empty() && !name.contains(char::is_whitespace) {
                raw.push(RawParam {
                    name: name.to_string(),
                    value,
                    quoted,
                });
            }
        }
        Self::from_raw(raw)
    }

    fn from_raw(raw: Vec<RawParam>) -> Self {
        let mut list = Self::new();
        let mut extended: Vec<(String, Vec<Section>)> = Vec::new();

        for param in raw {
            match split_extended(&param.name) {
                Some((base, index, encoded)) => {
                    let section = Section {
                        index,
                        encoded,
                        value: param.value,
                    };
                    if let Some((_, sections)) = extended
                        .iter_mut()
                        .find(|(name, _)| name.eq_ignore_ascii_case(base))
                    {
                        sections.push(section);
                    } else {
                        // Reserve the position of the first section.
                        if list.get(base).is_none() {
                            list.params.push(Param::new(base, String::new()));
                        }
                        extended.push((base.to_string(), vec![section]));
                    }
                }
                None => {
                    let value = if param.quoted && param.value.contains("=?") {
                        rfc2047::decode_header(&param.value)
                    } else {
                        param.value
                    };
                    if list.get(&param.name).is_none() {
                        list.params.push(Param::new(param.name, value));
                    }
                }
            }
        }

        for (base, mut sections) in extended {
            sections.sort_by_key(|s| s.index);
            let value = join_sections(&sections);
            list.set(base, value);
        }
        list
    }

    /// Writes `; name=value` for every parameter, quoting where required
    /// and using RFC 2231 for non-ASCII values.
    pub(crate) fn write_to(&self, out: &mut String) {
        for param in &self.params {
            out.push_str("; ");
            if param.value.is_ascii() {
                out.push_str(&param.name);
                out.push('=');
                push_value(out, &param.value);
            } else {
                out.push_str(&param.name);
                out.push_str("*=UTF-8''");
                out.extend(utf8_percent_encode(&param.value, ATTR_CHAR));
            }
        }
    }
}

impl fmt::Display for ParamList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out);
        f.write_str(&out)
    }
}

impl<'a> IntoIterator for &'a ParamList {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

struct RawParam {
    name: String,
    value: String,
    quoted: bool,
}

struct Section {
    index: u32,
    encoded: bool,
    value: String,
}

/// Returns true if `value` must be written as a quoted string.
pub(crate) fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_ascii_whitespace() || c.is_ascii_control() || TSPECIALS.contains(c))
}

fn push_value(out: &mut String, value: &str) {
    if needs_quoting(value) {
        out.push('"');
        for c in value.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(value);
    }
}

/// Reads a token or quoted string. Returns the value, whether it was quoted
/// and the unconsumed input.
fn read_value(s: &str) -> (String, bool, &str) {
    if let Some(body) = s.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = body.char_indices();
        while let Some((idx, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                }
                '"' => return (value, true, &body[idx + 1..]),
                _ => value.push(c),
            }
        }
        // Unterminated quote: take everything.
        return (value, true, "");
    }
    let end = s.find(';').unwrap_or(s.len());
    (s[..end].trim().to_string(), false, &s[end..])
}

/// Splits `name*`, `name*N` and `name*N*` into `(name, N, encoded)`.
fn split_extended(name: &str) -> Option<(&str, u32, bool)> {
    let star = name.find('*')?;
    let base = &name[..star];
    let suffix = &name[star + 1..];
    if base.is_empty() {
        return None;
    }
    if suffix.is_empty() {
        return Some((base, 0, true));
    }
    let (digits, encoded) = suffix
        .strip_suffix('*')
        .map_or((suffix, false), |d| (d, true));
    let index = digits.parse().ok()?;
    Some((base, index, encoded))
}

fn join_sections(sections: &[Section]) -> String {
    let mut label = None;
    let mut bytes = Vec::new();
    for (i, section) in sections.iter().enumerate() {
        if !section.encoded {
            bytes.extend_from_slice(section.value.as_bytes());
            continue;
        }
        let mut value = section.value.as_str();
        if i == 0 {
            let mut pieces = value.splitn(3, '\'');
            if let (Some(cs), Some(_lang), Some(rest)) = (pieces.next(), pieces.next(), pieces.next()) {
                if !cs.is_empty() {
                    label = Some(cs.to_string());
                }
                value = rest;
            }
        }
        bytes.extend(percent_decode_str(value));
    }
    let label = label.unwrap_or_else(|| "utf-8".to_string());
    charset::decode_lossy(&bytes, &label).into_owned()
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
    fn test_parse_simple() {
        let params = ParamList::parse("; charset=utf-8; format=flowed");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("CHARSET"), Some("utf-8"));
        assert_eq!(params.get("format"), Some("flowed"));
        let names: Vec<&str> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["charset", "format"]);
    }

    #[test]
    fn test_parse_quoted() {
        let params = ParamList::parse("; boundary=\"----=_Part_1; x\"; name=\"a \\\"b\\\"\"");
        assert_eq!(params.get("boundary"), Some("----=_Part_1; x"));
        assert_eq!(params.get("name"), Some("a \"b\""));
    }

    #[test]
    fn test_parse_skips_garbage() {
        let params = ParamList::parse(";; novalue; =orphan; ok=1");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("ok"), Some("1"));
    }

    #[test]
    fn test_rfc2231_extended() {
        let params = ParamList::parse("; filename*=utf-8''caf%C3%A9.txt");
        assert_eq!(params.get("filename"), Some("café.txt"));
    }

    #[test]
    fn test_rfc2231_continuations() {
        let params = ParamList::parse(
            "; title*0*=iso-8859-1'en'caf%E9; title*1=\" au lait\"; title*2*=%21; x=y",
        );
        assert_eq!(params.get("title"), Some("café au lait!"));
        let names: Vec<&str> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["title", "x"]);
    }

    #[test]
    fn test_rfc2231_overrides_plain() {
        let params = ParamList::parse("; filename=a.txt; filename*=utf-8''b%C3%A9.txt");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("filename"), Some("bé.txt"));
    }

    #[test]
    fn test_rfc2047_in_quoted_value() {
        let params = ParamList::parse("; name=\"=?UTF-8?B?w6kudHh0?=\"");
        assert_eq!(params.get("name"), Some("é.txt"));
    }

    #[test]
    fn test_set_and_remove() {
        let mut params = ParamList::new();
        params.set("charset", "us-ascii");
        params.set("format", "flowed");
        params.set("Charset", "utf-8");
        assert_eq!(params.to_string(), "; charset=utf-8; format=flowed");
        assert!(params.remove("FORMAT"));
        assert!(!params.remove("format"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_display_quoting() {
        let mut params = ParamList::new();
        params.set("boundary", "=-abc");
        params.set("name", "my file.txt");
        params.set("filename", "résumé.pdf");
        assert_eq!(
            params.to_string(),
            "; boundary=\"=-abc\"; name=\"my file.txt\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
        );
        assert_eq!(
            ParamList::parse(&params.to_string()).get("filename"),
            Some("résumé.pdf")
        );
    }
}
