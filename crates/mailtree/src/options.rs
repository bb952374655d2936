//! Parser and formatter options.

/// Line ending style used when writing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Newline {
    /// `\r\n`, as required on the wire.
    #[default]
    Dos,
    /// `\n`, for local storage.
    Unix,
}

impl Newline {
    /// Returns the line ending bytes.
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Dos => b"\r\n",
            Self::Unix => b"\n",
        }
    }
}

/// Options controlling how messages are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Line ending style.
    pub newline: Newline,
    /// Fold header lines longer than 78 columns at whitespace.
    pub fold_headers: bool,
}

impl FormatOptions {
    /// Wire format: DOS newlines, folded headers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            newline: Newline::Dos,
            fold_headers: true,
        }
    }

    /// Creates a format options builder.
    #[must_use]
    pub const fn builder() -> FormatOptionsBuilder {
        FormatOptionsBuilder::new()
    }
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`FormatOptions`].
#[derive(Debug, Clone)]
pub struct FormatOptionsBuilder {
    newline: Newline,
    fold_headers: bool,
}

impl FormatOptionsBuilder {
    /// Creates a builder with wire defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            newline: Newline::Dos,
            fold_headers: true,
        }
    }

    /// Sets the line ending style.
    #[must_use]
    pub const fn newline(mut self, newline: Newline) -> Self {
        self.newline = newline;
        self
    }

    /// Enables or disables header folding.
    #[must_use]
    pub const fn fold_headers(mut self, fold: bool) -> Self {
        self.fold_headers = fold;
        self
    }

    /// Builds the options.
    #[must_use]
    pub const fn build(self) -> FormatOptions {
        FormatOptions {
            newline: self.newline,
            fold_headers: self.fold_headers,
        }
    }
}

impl Default for FormatOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Default limit for nested multiparts and embedded messages.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Options controlling how input is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Treat the input as an mbox: capture `From ` envelope lines and end
    /// each message before the next one.
    pub scan_from: bool,
    /// Deepest allowed nesting of multiparts and embedded messages. The
    /// top-level entity is depth 0.
    pub max_depth: usize,
}

impl ParserOptions {
    /// Creates default options (single message, no mbox scanning).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scan_from: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Creates a parser options builder.
    #[must_use]
    pub const fn builder() -> ParserOptionsBuilder {
        ParserOptionsBuilder::new()
    }
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ParserOptions`].
#[derive(Debug, Clone)]
pub struct ParserOptionsBuilder {
    options: ParserOptions,
}

impl ParserOptionsBuilder {
    /// Creates a builder with default options.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            options: ParserOptions::new(),
        }
    }

    /// Enables or disables mbox `From ` scanning.
    #[must_use]
    pub const fn scan_from(mut self, scan: bool) -> Self {
        self.options.scan_from = scan;
        self
    }

    /// Sets the nesting limit.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = depth;
        self
    }

    /// Builds the options.
    #[must_use]
    pub const fn build(self) -> ParserOptions {
        self.options
    }
}

impl Default for ParserOptionsBuilder {
    fn default() -> Self {
        Self::new()
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
    fn test_newline_bytes() {
        assert_eq!(Newline::Dos.as_bytes(), b"\r\n");
        assert_eq!(Newline::Unix.as_bytes(), b"\n");
    }

    #[test]
    fn test_format_defaults() {
        let opts = FormatOptions::default();
        assert_eq!(opts.newline, Newline::Dos);
        assert!(opts.fold_headers);
    }

    #[test]
    fn test_format_builder() {
        let opts = FormatOptions::builder()
            .newline(Newline::Unix)
            .fold_headers(false)
            .build();
        assert_eq!(opts.newline, Newline::Unix);
        assert!(!opts.fold_headers);
    }

    #[test]
    fn test_parser_builder() {
        assert!(!ParserOptions::new().scan_from);
        assert!(ParserOptions::builder().scan_from(true).build().scan_from);
        assert_eq!(ParserOptions::default().max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(ParserOptions::builder().max_depth(3).build().max_depth, 3);
    }
}
