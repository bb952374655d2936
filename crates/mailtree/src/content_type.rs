//! MIME content type handling.

use std::fmt;

use crate::param::ParamList;

/// Returns true if `s` is a non-empty RFC 2045 token.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b)
        })
}

/// MIME content type with ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentType {
    media_type: String,
    media_subtype: String,
    params: ParamList,
}

impl ContentType {
    /// Creates a content type. Type and subtype are lower-cased.
    #[must_use]
    pub fn new(media_type: impl Into<String>, media_subtype: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into().to_ascii_lowercase(),
            media_subtype: media_subtype.into().to_ascii_lowercase(),
            params: ParamList::new(),
        }
    }

    /// `application/octet-stream`, the fallback for anything unparseable.
    #[must_use]
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    /// Creates a text/plain content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Creates a text/html content type.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html")
    }

    /// Creates a multipart content type with a boundary.
    #[must_use]
    pub fn multipart(subtype: &str, boundary: impl Into<String>) -> Self {
        Self::new("multipart", subtype).with_param("boundary", boundary)
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.set(name, value);
        self
    }

    /// Media type (`text`, `multipart`, ...).
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Media subtype (`plain`, `mixed`, ...).
    #[must_use]
    pub fn media_subtype(&self) -> &str {
        &self.media_subtype
    }

    /// Sets the media type.
    pub fn set_media_type(&mut self, media_type: &str) {
        self.media_type = media_type.to_ascii_lowercase();
    }

    /// Sets the media subtype.
    pub fn set_media_subtype(&mut self, media_subtype: &str) {
        self.media_subtype = media_subtype.to_ascii_lowercase();
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.media_type, self.media_subtype)
    }

    /// Checks the type and subtype. `*` matches anything.
    #[must_use]
    pub fn is_type(&self, media_type: &str, media_subtype: &str) -> bool {
        (media_type == "*" || self.media_type.eq_ignore_ascii_case(media_type))
            && (media_subtype == "*" || self.media_subtype.eq_ignore_ascii_case(media_subtype))
    }

    /// Returns a parameter value.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Sets a parameter value.
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.set(name, value);
    }

    /// All parameters in order.
    #[must_use]
    pub const fn params(&self) -> &ParamList {
        &self.params
    }

    /// Mutable access to the parameters.
    pub const fn params_mut(&mut self) -> &mut ParamList {
        &mut self.params
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary")
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.media_type == "multipart"
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.media_type == "text"
    }

    /// Parses a content type header value.
    ///
    /// Format: `type/subtype; param1=value1; param2=value2`
    ///
    /// Never fails: an empty or malformed `type/subtype` yields
    /// `application/octet-stream` with whatever parameters could be read.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (type_str, params) = s.split_once(';').unwrap_or((s, ""));
        let params = ParamList::parse(params);

        let parsed = type_str.split_once('/').and_then(|(t, st)| {
            let (t, st) = (t.trim(), st.trim());
            (is_token(t) && is_token(st)).then(|| Self::new(t, st))
        });
        let mut content_type = parsed.unwrap_or_else(|| {
            if !type_str.trim().is_empty() {
                tracing::debug!(value = s, "invalid content type, using application/octet-stream");
            }
            Self::octet_stream()
        });
        content_type.params = params;
        content_type
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::text_plain()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}{}", self.media_type, self.media_subtype, self.params)
    }
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
    fn test_content_type_new() {
        let ct = ContentType::new("Text", "PLAIN");
        assert_eq!(ct.media_type(), "text");
        assert_eq!(ct.media_subtype(), "plain");
        assert!(ct.params().is_empty());
    }

    #[test]
    fn test_multipart() {
        let ct = ContentType::multipart("mixed", "boundary123");
        assert_eq!(ct.mime_type(), "multipart/mixed");
        assert_eq!(ct.boundary(), Some("boundary123"));
        assert!(ct.is_multipart());
        assert!(ct.is_type("multipart", "*"));
        assert!(!ct.is_type("text", "*"));
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/Plain; charset=utf-8");
        assert_eq!(ct.media_type(), "text");
        assert_eq!(ct.media_subtype(), "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_content_type_parse_quoted() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part_123\"");
        assert_eq!(ct.mime_type(), "multipart/mixed");
        assert_eq!(ct.boundary(), Some("----=_Part_123"));
    }

    #[test]
    fn test_parse_invalid_falls_back() {
        assert_eq!(ContentType::parse("").mime_type(), "application/octet-stream");
        assert_eq!(ContentType::parse("garbage").mime_type(), "application/octet-stream");
        assert_eq!(ContentType::parse("text/").mime_type(), "application/octet-stream");
        let ct = ContentType::parse("bad type/x; name=a.bin");
        assert_eq!(ct.mime_type(), "application/octet-stream");
        assert_eq!(ct.param("name"), Some("a.bin"));
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::text_plain().with_param("charset", "utf-8");
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");

        let ct = ContentType::multipart("alternative", "=-xyz");
        assert_eq!(ct.to_string(), "multipart/alternative; boundary=\"=-xyz\"");
    }

    #[test]
    fn test_display_parse_stable() {
        let ct = ContentType::parse("image/png; name=\"a b.png\"; x-extra=1");
        assert_eq!(ContentType::parse(&ct.to_string()), ct);
    }
}
