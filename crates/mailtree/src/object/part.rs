//! Leaf parts and their content wrapper.

use std::fmt;
use std::sync::OnceLock;

use bytes::Bytes;

use super::Entity;
use crate::charset;
use crate::content_type::ContentType;
use crate::encoding::{self, ContentEncoding, rfc2047};
use crate::error::Result;
use crate::stream::{MemStream, Stream};

const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";

/// Content bytes plus the transfer encoding they are stored in.
///
/// The decoded form is computed on first access and cached.
#[derive(Clone)]
pub struct DataWrapper {
    stream: MemStream,
    encoding: ContentEncoding,
    decoded: OnceLock<Vec<u8>>,
}

impl DataWrapper {
    /// Wraps a stream whose bytes are encoded with `encoding`.
    #[must_use]
    pub const fn new(stream: MemStream, encoding: ContentEncoding) -> Self {
        Self {
            stream,
            encoding,
            decoded: OnceLock::new(),
        }
    }

    /// Wraps shared bytes without copying.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>, encoding: ContentEncoding) -> Self {
        Self::new(MemStream::from_bytes(data), encoding)
    }

    /// Encoding of the stored bytes.
    #[must_use]
    pub const fn encoding(&self) -> ContentEncoding {
        self.encoding
    }

    /// Underlying stream.
    #[must_use]
    pub const fn stream(&self) -> &MemStream {
        &self.stream
    }

    /// Stored bytes, still encoded.
    #[must_use]
    pub fn raw_bytes(&self) -> &[u8] {
        self.stream.bytes()
    }

    /// Decoded bytes.
    #[must_use]
    pub fn decoded(&self) -> &[u8] {
        self.decoded
            .get_or_init(|| encoding::decode(self.encoding, self.stream.bytes()))
    }

    /// Writes the decoded content to `stream`.
    ///
    /// # Errors
    ///
    /// Propagates write errors.
    pub fn write_to_stream(&self, stream: &mut dyn Stream) -> Result<()> {
        stream.write_all(self.decoded())
    }
}

impl fmt::Debug for DataWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataWrapper")
            .field("encoding", &self.encoding)
            .field("len", &self.stream.bytes().len())
            .finish_non_exhaustive()
    }
}

impl PartialEq for DataWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.encoding == other.encoding && self.raw_bytes() == other.raw_bytes()
    }
}

impl Eq for DataWrapper {}

/// A leaf MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    entity: Entity,
    content: Option<DataWrapper>,
}

entity_accessors!(Part);

impl Default for Part {
    fn default() -> Self {
        Self::new()
    }
}

impl Part {
    /// Creates an empty `text/plain` part.
    #[must_use]
    pub fn new() -> Self {
        Self::from_entity(Entity::default(), None)
    }

    /// Creates an empty part of the given type.
    #[must_use]
    pub fn with_type(media_type: &str, media_subtype: &str) -> Self {
        Self::from_entity(Entity::new(ContentType::new(media_type, media_subtype)), None)
    }

    pub(crate) const fn from_entity(entity: Entity, content: Option<DataWrapper>) -> Self {
        Self { entity, content }
    }

    /// Content wrapper, if any content was set or parsed.
    #[must_use]
    pub const fn content(&self) -> Option<&DataWrapper> {
        self.content.as_ref()
    }

    /// Replaces the content wrapper. The declared transfer encoding is left
    /// alone.
    pub fn set_content(&mut self, content: DataWrapper) {
        self.content = Some(content);
    }

    /// Declared Content-Transfer-Encoding.
    #[must_use]
    pub fn content_encoding(&self) -> ContentEncoding {
        self.entity
            .header(CONTENT_TRANSFER_ENCODING)
            .map_or(ContentEncoding::Default, ContentEncoding::parse)
    }

    /// Declares a transfer encoding. `Default` removes the header.
    pub fn set_content_encoding(&mut self, encoding: ContentEncoding) {
        if encoding == ContentEncoding::Default {
            self.entity.remove_all_headers(CONTENT_TRANSFER_ENCODING);
        } else {
            self.entity.headers_mut().set(CONTENT_TRANSFER_ENCODING, encoding.as_str());
        }
    }

    /// File name from the disposition `filename` or the content-type
    /// `name` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.entity.filename()
    }

    /// Sets `filename` on the disposition (creating an `attachment`
    /// disposition) and `name` on the content type.
    pub fn set_filename(&mut self, filename: &str) {
        self.entity.set_disposition_param("filename", filename);
        self.entity.set_content_type_param("name", filename);
    }

    /// Decoded Content-Description.
    #[must_use]
    pub fn description(&self) -> Option<String> {
        self.entity.header("Content-Description").map(rfc2047::decode_header)
    }

    /// Sets Content-Description.
    pub fn set_description(&mut self, description: &str) {
        self.entity.set_header("Content-Description", description);
    }

    /// Content-Id without angle brackets.
    #[must_use]
    pub fn content_id(&self) -> Option<&str> {
        self.entity
            .header("Content-Id")
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>'))
    }

    /// Sets Content-Id, adding angle brackets.
    pub fn set_content_id(&mut self, id: &str) {
        let id = id.trim_start_matches('<').trim_end_matches('>');
        self.entity.set_header("Content-Id", &format!("<{id}>"));
    }

    /// Content-Location.
    #[must_use]
    pub fn content_location(&self) -> Option<&str> {
        self.entity.header("Content-Location")
    }

    /// Decoded content; empty when there is none.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.content.as_ref().map_or(&[], DataWrapper::decoded)
    }

    /// Stored content before transfer decoding.
    #[must_use]
    pub fn raw_bytes(&self) -> &[u8] {
        self.content.as_ref().map_or(&[], DataWrapper::raw_bytes)
    }

    /// Decoded content converted to UTF-8 through the declared charset.
    ///
    /// A charset that cannot be converted falls back to lossy UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        let bytes = self.bytes();
        let label = self.entity.content_type().charset().unwrap_or("us-ascii");
        match charset::decode(bytes, label) {
            Ok(text) => text.into_owned(),
            Err(e) => {
                tracing::warn!(?e, charset = label, "Falling back to lossy text conversion");
                charset::decode_lossy(bytes, label).into_owned()
            }
        }
    }

    /// Replaces the content with UTF-8 text.
    ///
    /// Non-ASCII text records `charset=utf-8`; a 7bit or absent transfer
    /// encoding is upgraded to whatever the text needs.
    pub fn set_text(&mut self, text: &str) {
        if !text.is_ascii() {
            self.entity.set_content_type_param("charset", "utf-8");
        }
        self.replace_content(text.as_bytes().to_vec());
    }

    /// Replaces the content with raw bytes, upgrading a 7bit or absent
    /// transfer encoding when the bytes need it.
    pub fn set_bytes(&mut self, bytes: impl Into<Bytes>) {
        self.replace_content(bytes);
    }

    fn replace_content(&mut self, bytes: impl Into<Bytes>) {
        let bytes = bytes.into();
        if matches!(
            self.content_encoding(),
            ContentEncoding::Default | ContentEncoding::SevenBit
        ) {
            let best = ContentEncoding::best_for(&bytes);
            if best != ContentEncoding::SevenBit {
                tracing::debug!(encoding = %best, "Upgrading transfer encoding");
                self.set_content_encoding(best);
            }
        }
        self.content = Some(DataWrapper::from_bytes(bytes, ContentEncoding::Default));
    }

    /// Returns true for `text/*` parts.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.entity.content_type().is_text()
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
    fn test_new_part_defaults() {
        let part = Part::new();
        assert_eq!(part.content_type().mime_type(), "text/plain");
        assert_eq!(part.content_encoding(), ContentEncoding::Default);
        assert!(part.content().is_none());
        assert!(part.bytes().is_empty());
        assert!(!part.is_attachment());
    }

    #[test]
    fn test_data_wrapper_decodes_lazily() {
        let wrapper = DataWrapper::from_bytes(&b"aGVsbG8=\n"[..], ContentEncoding::Base64);
        assert_eq!(wrapper.raw_bytes(), b"aGVsbG8=\n");
        assert_eq!(wrapper.decoded(), b"hello");
        assert_eq!(wrapper.decoded(), b"hello");

        let mut sink = MemStream::new();
        wrapper.write_to_stream(&mut sink).unwrap();
        assert_eq!(sink.bytes(), b"hello");
    }

    #[test]
    fn test_content_encoding_header() {
        let mut part = Part::with_type("application", "pdf");
        part.set_content_encoding(ContentEncoding::Base64);
        assert_eq!(part.header("Content-Transfer-Encoding"), Some("base64"));
        assert_eq!(part.content_encoding(), ContentEncoding::Base64);

        part.set_content_encoding(ContentEncoding::Default);
        assert!(part.header("Content-Transfer-Encoding").is_none());
    }

    #[test]
    fn test_set_text_ascii_stays_7bit() {
        let mut part = Part::new();
        part.set_text("hello world\n");
        assert_eq!(part.content_encoding(), ContentEncoding::Default);
        assert!(part.content_type().charset().is_none());
        assert_eq!(part.text(), "hello world\n");
    }

    #[test]
    fn test_set_text_non_ascii_upgrades() {
        let mut part = Part::new();
        part.set_text("Grüße aus der schönen Stadt am Fluss\n");
        assert_eq!(part.content_type().charset(), Some("utf-8"));
        assert_eq!(part.content_encoding(), ContentEncoding::QuotedPrintable);
        assert_eq!(part.text(), "Grüße aus der schönen Stadt am Fluss\n");
    }

    #[test]
    fn test_set_text_keeps_explicit_encoding() {
        let mut part = Part::new();
        part.set_content_encoding(ContentEncoding::Base64);
        part.set_text("plain");
        assert_eq!(part.content_encoding(), ContentEncoding::Base64);
    }

    #[test]
    fn test_set_bytes_binary_goes_base64() {
        let mut part = Part::with_type("image", "png");
        part.set_bytes(vec![0x89, b'P', b'N', b'G', 0, 0, 0xff, 0xfe]);
        assert_eq!(part.content_encoding(), ContentEncoding::Base64);
        assert_eq!(part.bytes(), &[0x89, b'P', b'N', b'G', 0, 0, 0xff, 0xfe]);
    }

    #[test]
    fn test_text_converts_charset() {
        let mut part = Part::from_entity(
            Entity::new(ContentType::text_plain().with_param("charset", "iso-8859-1")),
            None,
        );
        part.set_content(DataWrapper::from_bytes(&b"caf\xe9"[..], ContentEncoding::EightBit));
        assert_eq!(part.text(), "café");
    }

    #[test]
    fn test_text_unknown_charset_is_lossy() {
        let mut part = Part::from_entity(
            Entity::new(ContentType::text_plain().with_param("charset", "x-bogus")),
            None,
        );
        part.set_content(DataWrapper::from_bytes(&b"ok \xff"[..], ContentEncoding::EightBit));
        assert_eq!(part.text(), "ok \u{fffd}");
    }

    #[test]
    fn test_filename_and_ids() {
        let mut part = Part::with_type("application", "pdf");
        part.set_filename("report.pdf");
        assert_eq!(part.filename(), Some("report.pdf"));
        assert!(part.is_attachment());
        assert_eq!(
            part.header("Content-Disposition"),
            Some("attachment; filename=report.pdf")
        );

        part.set_content_id("logo@example.com");
        assert_eq!(part.header("Content-Id"), Some("<logo@example.com>"));
        assert_eq!(part.content_id(), Some("logo@example.com"));

        part.set_description("Quartalsbericht für Q3");
        assert_eq!(part.description().as_deref(), Some("Quartalsbericht für Q3"));
        assert!(part.content_location().is_none());
    }
}
