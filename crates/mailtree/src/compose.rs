//! Serialization of the object tree, and a builder for new messages.
//!
//! The [`Composer`] writes headers, an empty line and the body for every
//! node. Leaf content whose stored encoding already matches the declared
//! Content-Transfer-Encoding is written verbatim; anything else is decoded
//! and re-encoded. Line endings of non-binary bodies follow
//! [`FormatOptions::newline`].

use std::borrow::Cow;

use bytes::Bytes;

use crate::address::{Address, AddressList};
use crate::content_disposition::ContentDisposition;
use crate::content_type::ContentType;
use crate::encoding::{ContentEncoding, Encoder};
use crate::error::Result;
use crate::message::{AddressField, Message};
use crate::object::{DataWrapper, Entity, Multipart, Object, Part};
use crate::options::FormatOptions;
use crate::stream::Stream;

/// Writes messages and objects in wire form.
#[derive(Debug, Clone, Copy, Default)]
pub struct Composer {
    options: FormatOptions,
}

impl Composer {
    /// Creates a composer.
    #[must_use]
    pub const fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Options in use.
    #[must_use]
    pub const fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Writes a whole message.
    ///
    /// # Errors
    ///
    /// Propagates stream write errors.
    pub fn write_message(&self, message: &Message, stream: &mut dyn Stream) -> Result<()> {
        stream.write_all(&self.message_to_bytes(message))
    }

    /// Writes one object with its headers.
    ///
    /// # Errors
    ///
    /// Propagates stream write errors.
    pub fn write_object(&self, object: &Object, stream: &mut dyn Stream) -> Result<()> {
        stream.write_all(&self.object_to_bytes(object))
    }

    /// Writes only the body of an object.
    ///
    /// # Errors
    ///
    /// Propagates stream write errors.
    pub fn write_body(&self, object: &Object, stream: &mut dyn Stream) -> Result<()> {
        let mut out = Vec::new();
        self.append_body(&mut out, object);
        stream.write_all(&out)
    }

    /// Wire form of a message.
    #[must_use]
    pub fn message_to_bytes(&self, message: &Message) -> Vec<u8> {
        let mut out = Vec::new();
        self.append_message(&mut out, message);
        out
    }

    /// Wire form of an object.
    #[must_use]
    pub fn object_to_bytes(&self, object: &Object) -> Vec<u8> {
        let mut out = Vec::new();
        self.append_object(&mut out, object);
        out
    }

    fn newline(&self) -> &'static [u8] {
        self.options.newline.as_bytes()
    }

    fn append_message(&self, out: &mut Vec<u8>, message: &Message) {
        message.header_list().write_to(out, &self.options);
        match message.mime_part() {
            Some(root) => {
                root.headers().write_to(out, &self.options);
                out.extend_from_slice(self.newline());
                self.append_body(out, root);
            }
            None => out.extend_from_slice(self.newline()),
        }
    }

    fn append_object(&self, out: &mut Vec<u8>, object: &Object) {
        object.headers().write_to(out, &self.options);
        out.extend_from_slice(self.newline());
        self.append_body(out, object);
    }

    fn append_body(&self, out: &mut Vec<u8>, object: &Object) {
        match object {
            Object::Part(part) => {
                if let Some(content) = part.content() {
                    self.append_content(out, content, part.content_encoding(), part.filename());
                }
            }
            Object::MessagePartial(partial) => {
                if let Some(content) = partial.content() {
                    let declared = partial
                        .header("Content-Transfer-Encoding")
                        .map_or(ContentEncoding::Default, ContentEncoding::parse);
                    self.append_content(out, content, declared, None);
                }
            }
            Object::MessagePart(part) => {
                if let Some(message) = part.message() {
                    self.append_message(out, message);
                }
            }
            Object::Multipart(multipart) => self.append_multipart(out, multipart),
        }
    }

    fn append_multipart(&self, out: &mut Vec<u8>, multipart: &Multipart) {
        let boundary = multipart.boundary().unwrap_or_default();
        if boundary.is_empty() {
            tracing::warn!("Writing multipart without a boundary parameter");
        }
        let newline = self.newline();
        for child in multipart.parts() {
            out.extend_from_slice(b"--");
            out.extend_from_slice(boundary.as_bytes());
            out.extend_from_slice(newline);
            self.append_object(out, child);
            out.extend_from_slice(newline);
        }
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"--");
        out.extend_from_slice(newline);
    }

    fn append_content(
        &self,
        out: &mut Vec<u8>,
        content: &DataWrapper,
        declared: ContentEncoding,
        filename: Option<&str>,
    ) {
        let stored = content.encoding();
        let verbatim = stored == declared || (stored.is_identity() && declared.is_identity());
        let data: Cow<'_, [u8]> = if verbatim {
            Cow::Borrowed(content.raw_bytes())
        } else {
            tracing::trace!(from = %stored, to = %declared, "Re-encoding part content");
            let mut encoder = match (declared, filename) {
                (ContentEncoding::UuEncode, Some(name)) => Encoder::uuencode_named(name),
                _ => Encoder::new(declared),
            };
            Cow::Owned(encoder.flush(content.decoded()))
        };

        if declared == ContentEncoding::Binary {
            out.extend_from_slice(&data);
        } else {
            normalize_newlines(out, &data, self.newline());
        }
    }
}

/// Copies `data` to `out`, rewriting every `\n` or `\r\n` as `newline`.
fn normalize_newlines(out: &mut Vec<u8>, data: &[u8], newline: &[u8]) {
    out.reserve(data.len());
    let mut rest = data;
    while let Some(i) = rest.iter().position(|&b| b == b'\n') {
        let line = rest[..i].strip_suffix(b"\r").unwrap_or(&rest[..i]);
        out.extend_from_slice(line);
        out.extend_from_slice(newline);
        rest = &rest[i + 1..];
    }
    out.extend_from_slice(rest);
}

/// Builds a new message from addresses, bodies and attachments.
///
/// A single body becomes the root part. A text and an HTML body alone
/// become `multipart/alternative`; any other combination becomes
/// `multipart/mixed`.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: AddressList,
    to: AddressList,
    cc: AddressList,
    bcc: AddressList,
    subject: Option<String>,
    text: Option<Part>,
    html: Option<Part>,
    attachments: Vec<Part>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `From` mailbox.
    #[must_use]
    pub fn from(mut self, name: &str, email: &str) -> Self {
        self.from.add(Address::mailbox(name, email));
        self
    }

    /// Adds a `To` mailbox.
    #[must_use]
    pub fn to(mut self, name: &str, email: &str) -> Self {
        self.to.add(Address::mailbox(name, email));
        self
    }

    /// Adds a `Cc` mailbox.
    #[must_use]
    pub fn cc(mut self, name: &str, email: &str) -> Self {
        self.cc.add(Address::mailbox(name, email));
        self
    }

    /// Adds a `Bcc` mailbox.
    #[must_use]
    pub fn bcc(mut self, name: &str, email: &str) -> Self {
        self.bcc.add(Address::mailbox(name, email));
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the `text/plain` body. `ContentEncoding::Default` picks an
    /// encoding that fits the text.
    #[must_use]
    pub fn text(mut self, body: &str, encoding: ContentEncoding) -> Self {
        self.text = Some(text_part("plain", body, encoding));
        self
    }

    /// Sets the `text/html` body. `ContentEncoding::Default` picks an
    /// encoding that fits the text.
    #[must_use]
    pub fn html(mut self, body: &str, encoding: ContentEncoding) -> Self {
        self.html = Some(text_part("html", body, encoding));
        self
    }

    /// Adds a base64 encoded attachment.
    #[must_use]
    pub fn attachment(
        mut self,
        filename: &str,
        content_type: ContentType,
        data: impl Into<Bytes>,
    ) -> Self {
        let mut part = Part::from_entity(Entity::new(content_type), None);
        part.set_content_disposition(Some(ContentDisposition::attachment(filename)));
        part.set_content_encoding(ContentEncoding::Base64);
        part.set_content(DataWrapper::from_bytes(data, ContentEncoding::Default));
        self.attachments.push(part);
        self
    }

    /// Assembles the message.
    #[must_use]
    pub fn build(self) -> Message {
        let mut message = Message::new();
        for (field, list) in [
            (AddressField::From, self.from),
            (AddressField::To, self.to),
            (AddressField::Cc, self.cc),
            (AddressField::Bcc, self.bcc),
        ] {
            if !list.is_empty() {
                message.set_addresses(field, list);
            }
        }
        if let Some(subject) = &self.subject {
            message.set_subject(subject);
        }
        message.append_header("MIME-Version", "1.0");

        let mut bodies: Vec<Object> = self.text.into_iter().chain(self.html).map(Object::from).collect();
        let attachments: Vec<Object> = self.attachments.into_iter().map(Object::from).collect();

        let root = if attachments.is_empty() && bodies.len() == 2 {
            let mut alternative = Multipart::with_subtype("alternative");
            for body in bodies {
                alternative.add_part(body);
            }
            Some(Object::Multipart(alternative))
        } else if attachments.is_empty() && bodies.len() == 1 {
            bodies.pop()
        } else if attachments.len() == 1 && bodies.is_empty() {
            attachments.into_iter().next()
        } else if bodies.is_empty() && attachments.is_empty() {
            None
        } else {
            let mut mixed = Multipart::new();
            for part in bodies.into_iter().chain(attachments) {
                mixed.add_part(part);
            }
            Some(Object::Multipart(mixed))
        };

        if let Some(root) = root {
            message.set_mime_part(root);
        }
        message
    }
}

fn text_part(subtype: &str, body: &str, encoding: ContentEncoding) -> Part {
    let mut part = Part::with_type("text", subtype);
    part.entity_mut().set_content_type_param("charset", "utf-8");
    if encoding != ContentEncoding::Default {
        part.set_content_encoding(encoding);
    }
    part.set_text(body);
    part
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
    use crate::stream::MemStream;

    fn leaf(subtype: &str, body: &str) -> Part {
        let mut part = Part::with_type("text", subtype);
        part.set_text(body);
        part
    }

    #[test]
    fn test_multipart_exact_output() {
        let mut multipart = Multipart::with_content_type(ContentType::multipart("mixed", "B1"));
        multipart.add_part(leaf("plain", "A"));
        multipart.add_part(leaf("html", "B"));

        let mut sink = MemStream::new();
        Composer::default()
            .write_body(&Object::Multipart(multipart), &mut sink)
            .unwrap();
        assert_eq!(
            sink.bytes(),
            b"--B1\r\nContent-Type: text/plain\r\n\r\nA\r\n--B1\r\nContent-Type: text/html\r\n\r\nB\r\n--B1--\r\n"
        );
    }

    #[test]
    fn test_unix_newlines() {
        let mut part = leaf("plain", "one\r\ntwo\n");
        part.set_header("X-Test", "yes");
        let options = FormatOptions::builder().newline(Newline::Unix).build();
        let bytes = Composer::new(options).object_to_bytes(&Object::Part(part));
        assert_eq!(bytes, b"Content-Type: text/plain\nX-Test: yes\n\none\ntwo\n");
    }

    #[test]
    fn test_verbatim_when_encoding_matches() {
        let mut part = Part::with_type("application", "octet-stream");
        part.set_content_encoding(ContentEncoding::Base64);
        part.set_content(DataWrapper::from_bytes(&b"AAEC\n"[..], ContentEncoding::Base64));
        let mut sink = MemStream::new();
        Composer::default()
            .write_body(&Object::Part(part), &mut sink)
            .unwrap();
        assert_eq!(sink.bytes(), b"AAEC\r\n");
    }

    #[test]
    fn test_reencodes_on_mismatch() {
        let mut part = Part::with_type("application", "octet-stream");
        part.set_content(DataWrapper::from_bytes(&b"AAEC\n"[..], ContentEncoding::Base64));
        part.set_content_encoding(ContentEncoding::QuotedPrintable);
        let body = Composer::default().object_to_bytes(&Object::Part(part));
        assert!(body.ends_with(b"\r\n\r\n=00=01=02"));
    }

    #[test]
    fn test_binary_left_alone() {
        let mut part = Part::with_type("application", "octet-stream");
        part.set_content_encoding(ContentEncoding::Binary);
        part.set_content(DataWrapper::from_bytes(&b"a\nb\r\n"[..], ContentEncoding::Binary));
        let mut sink = MemStream::new();
        Composer::default()
            .write_body(&Object::Part(part), &mut sink)
            .unwrap();
        assert_eq!(sink.bytes(), b"a\nb\r\n");
    }

    #[test]
    fn test_normalize_newlines() {
        let mut out = Vec::new();
        normalize_newlines(&mut out, b"a\nb\r\nc\rd", b"\r\n");
        assert_eq!(out, b"a\r\nb\r\nc\rd");
    }

    #[test]
    fn test_builder_single_body() {
        let message = MessageBuilder::new()
            .from("Alice", "alice@example.com")
            .to("", "bob@example.com")
            .subject("Hello")
            .text("Hi Bob\n", ContentEncoding::Default)
            .build();
        assert_eq!(message.header("From"), Some("Alice <alice@example.com>"));
        assert_eq!(message.header("To"), Some("bob@example.com"));
        assert_eq!(message.header("MIME-Version"), Some("1.0"));
        let part = message.mime_part().unwrap().as_part().unwrap();
        assert_eq!(part.content_type().charset(), Some("utf-8"));
        assert_eq!(message.text_body().as_deref(), Some("Hi Bob\n"));
    }

    #[test]
    fn test_builder_alternative_and_mixed() {
        let alternative = MessageBuilder::new()
            .text("plain", ContentEncoding::SevenBit)
            .html("<p>html</p>", ContentEncoding::QuotedPrintable)
            .build();
        assert_eq!(alternative.content_type().mime_type(), "multipart/alternative");

        let mixed = MessageBuilder::new()
            .text("see attached", ContentEncoding::Default)
            .html("<p>see attached</p>", ContentEncoding::Default)
            .attachment("data.bin", ContentType::octet_stream(), vec![0u8, 1, 2, 255])
            .build();
        assert_eq!(mixed.content_type().mime_type(), "multipart/mixed");
        let root = mixed.mime_part().unwrap().as_multipart().unwrap();
        assert_eq!(root.count(), 3);
        let attachments = mixed.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].0, "data.bin");
        assert_eq!(attachments[0].1, &[0u8, 1, 2, 255]);
    }

    #[test]
    fn test_builder_output_parses_back() {
        let message = MessageBuilder::new()
            .from("Jürgen", "j@example.de")
            .to("Bob", "bob@example.com")
            .subject("Grüße")
            .text("Grüße aus der schönen Stadt am Fluss\n", ContentEncoding::Default)
            .attachment("a.txt", ContentType::text_plain(), &b"attached\n"[..])
            .build();
        let wire = message.export();
        let parsed = Message::parse(wire).unwrap();
        assert_eq!(parsed.subject().as_deref(), Some("Grüße"));
        assert_eq!(parsed.from().get(0).unwrap().name(), "Jürgen");
        assert_eq!(
            parsed.text_body().as_deref(),
            Some("Grüße aus der schönen Stadt am Fluss\r\n")
        );
        let attachments = parsed.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].1, b"attached\n");
    }
}
