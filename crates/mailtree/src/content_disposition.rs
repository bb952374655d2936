//! Content-Disposition header handling.

use std::fmt;

use crate::param::ParamList;

/// `attachment` disposition token.
pub const ATTACHMENT: &str = "attachment";
/// `inline` disposition token.
pub const INLINE: &str = "inline";

/// Disposition token plus ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentDisposition {
    disposition: String,
    params: ParamList,
}

impl ContentDisposition {
    /// Creates a disposition with no parameters.
    #[must_use]
    pub fn new(disposition: impl Into<String>) -> Self {
        Self {
            disposition: disposition.into(),
            params: ParamList::new(),
        }
    }

    /// `attachment; filename=...`.
    #[must_use]
    pub fn attachment(filename: impl Into<String>) -> Self {
        let mut disposition = Self::new(ATTACHMENT);
        disposition.set_param("filename", filename);
        disposition
    }

    /// `inline`.
    #[must_use]
    pub fn inline() -> Self {
        Self::new(INLINE)
    }

    /// Parses a header value. Never fails.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (token, params) = s.split_once(';').unwrap_or((s, ""));
        Self {
            disposition: token.trim().to_string(),
            params: ParamList::parse(params),
        }
    }

    /// Disposition token as written.
    #[must_use]
    pub fn disposition(&self) -> &str {
        &self.disposition
    }

    /// Replaces the disposition token.
    pub fn set_disposition(&mut self, disposition: impl Into<String>) {
        self.disposition = disposition.into();
    }

    /// Returns true for any non-empty disposition token.
    ///
    /// Node classification uses the stricter rule in
    /// [`crate::Object::is_attachment`]; this one only asks whether a
    /// disposition was given at all.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        !self.disposition.trim().is_empty()
    }

    /// Returns true if the token is `attachment` (case-insensitive).
    #[must_use]
    pub fn is_attachment_token(&self) -> bool {
        self.disposition.eq_ignore_ascii_case(ATTACHMENT)
    }

    /// Returns true if the token is `inline` (case-insensitive).
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.disposition.eq_ignore_ascii_case(INLINE)
    }

    /// `filename` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.params.get("filename")
    }

    /// Returns a parameter value.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Sets a parameter.
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.set(name, value);
    }

    /// All parameters in order.
    #[must_use]
    pub const fn params(&self) -> &ParamList {
        &self.params
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.disposition, self.params)
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
    fn test_parse() {
        let cd = ContentDisposition::parse("Attachment; filename=\"report 1.pdf\"; size=42");
        assert_eq!(cd.disposition(), "Attachment");
        assert!(cd.is_attachment_token());
        assert_eq!(cd.filename(), Some("report 1.pdf"));
        assert_eq!(cd.param("size"), Some("42"));
    }

    #[test]
    fn test_token_rule() {
        assert!(ContentDisposition::parse("inline").is_attachment());
        assert!(ContentDisposition::parse("x-whatever").is_attachment());
        assert!(!ContentDisposition::parse("").is_attachment());
        assert!(!ContentDisposition::parse("  ; filename=a").is_attachment());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ContentDisposition::attachment("a.txt").to_string(),
            "attachment; filename=a.txt"
        );
        assert_eq!(ContentDisposition::inline().to_string(), "inline");
    }
}
