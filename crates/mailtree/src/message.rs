//! Top-level message: envelope headers, address lists and the MIME tree.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, TimeZone};

use crate::address::{Address, AddressList};
use crate::compose::Composer;
use crate::content_type::ContentType;
use crate::encoding::rfc2047;
use crate::error::{Error, Result};
use crate::header::HeaderList;
use crate::iter::PartIter;
use crate::object::{Multipart, Object, Part};
use crate::options::{FormatOptions, Newline, ParserOptions};
use crate::parser::Parser;
use crate::stream::Stream;

/// Header fields that hold address lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressField {
    /// `From`.
    From,
    /// `Sender`.
    Sender,
    /// `Reply-To`.
    ReplyTo,
    /// `To`.
    To,
    /// `Cc`.
    Cc,
    /// `Bcc`.
    Bcc,
}

impl AddressField {
    /// Every address field, in canonical order.
    pub const ALL: [Self; 6] = [
        Self::From,
        Self::Sender,
        Self::ReplyTo,
        Self::To,
        Self::Cc,
        Self::Bcc,
    ];

    /// Looks up a field by header name (case-insensitive).
    #[must_use]
    pub fn from_header(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.header_name().eq_ignore_ascii_case(name.trim()))
    }

    /// Canonical header name.
    #[must_use]
    pub const fn header_name(self) -> &'static str {
        match self {
            Self::From => "From",
            Self::Sender => "Sender",
            Self::ReplyTo => "Reply-To",
            Self::To => "To",
            Self::Cc => "Cc",
            Self::Bcc => "Bcc",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_name())
    }
}

/// Returns true for `Content-*` fields, which belong to the root object.
pub(crate) fn is_content_header(name: &str) -> bool {
    name.len() > 8
        && name.is_char_boundary(8)
        && name[..8].eq_ignore_ascii_case("content-")
}

/// An email message.
///
/// Envelope headers live on the message; `Content-*` headers live on the
/// root [`Object`]. Address headers are mirrored into [`AddressList`]s and
/// rewritten from them whenever a list changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    headers: HeaderList,
    addresses: [AddressList; 6],
    mime_part: Option<Object>,
}

impl Message {
    /// Creates a message with no headers and no body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a message from its own (non-`Content-*`) headers and root
    /// object, parsing the address headers.
    pub(crate) fn from_parts(headers: HeaderList, mime_part: Option<Object>) -> Self {
        let mut addresses: [AddressList; 6] = Default::default();
        for field in AddressField::ALL {
            for value in headers.get_all(field.header_name()) {
                addresses[field.index()].append(AddressList::parse(value));
            }
        }
        Self {
            headers,
            addresses,
            mime_part,
        }
    }

    /// Parses a message from bytes.
    ///
    /// # Errors
    ///
    /// Returns a structural error if the input is not a message.
    pub fn parse(bytes: impl Into<Bytes>) -> Result<Self> {
        Self::parse_with(bytes, &ParserOptions::default())
    }

    /// Parses a message from bytes with explicit options.
    ///
    /// # Errors
    ///
    /// Returns a structural error if the input is not a message.
    pub fn parse_with(bytes: impl Into<Bytes>, options: &ParserOptions) -> Result<Self> {
        Parser::from_bytes(bytes, *options).construct_message()
    }

    // ----- envelope -----

    /// Decoded Subject.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers.get("Subject").map(rfc2047::decode_header)
    }

    /// Sets Subject, RFC 2047 encoding non-ASCII text as UTF-8.
    pub fn set_subject(&mut self, subject: &str) {
        self.set_subject_with_charset(subject, "UTF-8");
    }

    /// Sets Subject, RFC 2047 encoding non-ASCII text with `charset`.
    pub fn set_subject_with_charset(&mut self, subject: &str, charset: &str) {
        self.headers.set_encoded("Subject", subject, charset);
    }

    /// Message-ID without angle brackets.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers
            .get("Message-Id")
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>'))
    }

    /// Sets Message-ID, adding angle brackets.
    pub fn set_message_id(&mut self, id: &str) {
        let id = id.trim().trim_start_matches('<').trim_end_matches('>');
        self.headers.set("Message-Id", &format!("<{id}>"));
    }

    /// Date header parsed as RFC 2822. `None` if absent or unparseable.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.date_as_string()?;
        match DateTime::parse_from_rfc2822(raw) {
            Ok(date) => Some(date),
            Err(e) => {
                tracing::debug!(?e, date = raw, "Unparseable Date header");
                None
            }
        }
    }

    /// Raw Date header.
    #[must_use]
    pub fn date_as_string(&self) -> Option<&str> {
        self.headers.get("Date")
    }

    /// Sets Date in RFC 2822 form.
    pub fn set_date<Tz: TimeZone>(&mut self, date: &DateTime<Tz>)
    where
        Tz::Offset: fmt::Display,
    {
        self.headers.set("Date", &date.to_rfc2822());
    }

    /// Sets Date verbatim.
    pub fn set_date_as_string(&mut self, date: &str) {
        self.headers.set("Date", date);
    }

    /// Originator (`From`) as written in the header.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.headers.get("From")
    }

    /// Replaces the `From` list with the addresses parsed from `sender`.
    pub fn set_sender(&mut self, sender: &str) {
        self.replace_list(AddressField::From, AddressList::parse(sender));
    }

    /// `Reply-To` as written in the header.
    #[must_use]
    pub fn reply_to(&self) -> Option<&str> {
        self.headers.get("Reply-To")
    }

    /// Replaces the `Reply-To` list with the addresses parsed from `reply_to`.
    pub fn set_reply_to(&mut self, reply_to: &str) {
        self.replace_list(AddressField::ReplyTo, AddressList::parse(reply_to));
    }

    // ----- address lists -----

    /// `From` addresses.
    #[must_use]
    pub const fn from(&self) -> &AddressList {
        self.addresses(AddressField::From)
    }

    /// `Sender` addresses.
    #[must_use]
    pub const fn sender_list(&self) -> &AddressList {
        self.addresses(AddressField::Sender)
    }

    /// `Reply-To` addresses.
    #[must_use]
    pub const fn reply_to_list(&self) -> &AddressList {
        self.addresses(AddressField::ReplyTo)
    }

    /// `To` addresses.
    #[must_use]
    pub const fn to(&self) -> &AddressList {
        self.addresses(AddressField::To)
    }

    /// `Cc` addresses.
    #[must_use]
    pub const fn cc(&self) -> &AddressList {
        self.addresses(AddressField::Cc)
    }

    /// `Bcc` addresses.
    #[must_use]
    pub const fn bcc(&self) -> &AddressList {
        self.addresses(AddressField::Bcc)
    }

    /// Address list for `field`.
    #[must_use]
    pub const fn addresses(&self, field: AddressField) -> &AddressList {
        &self.addresses[field.index()]
    }

    /// Adds a `To` mailbox.
    pub fn add_to(&mut self, name: &str, email: &str) {
        self.push_address(AddressField::To, Address::mailbox(name, email));
    }

    /// Adds a `Cc` mailbox.
    pub fn add_cc(&mut self, name: &str, email: &str) {
        self.push_address(AddressField::Cc, Address::mailbox(name, email));
    }

    /// Adds a `Bcc` mailbox.
    pub fn add_bcc(&mut self, name: &str, email: &str) {
        self.push_address(AddressField::Bcc, Address::mailbox(name, email));
    }

    /// Copies of every `To`, `Cc` and `Bcc` entry.
    #[must_use]
    pub fn all_recipients(&self) -> AddressList {
        [AddressField::To, AddressField::Cc, AddressField::Bcc]
            .into_iter()
            .flat_map(|field| self.addresses(field).iter().cloned())
            .collect()
    }

    /// Adds a mailbox to the list named by `header`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeaderTarget`] if `header` holds no addresses.
    pub fn add_address(&mut self, header: &str, name: &str, email: &str) -> Result<()> {
        let field = address_field(header)?;
        self.push_address(field, Address::mailbox(name, email));
        Ok(())
    }

    /// Empties the list named by `header`. The header field stays, with an
    /// empty value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeaderTarget`] if `header` holds no addresses.
    pub fn clear_address(&mut self, header: &str) -> Result<()> {
        let field = address_field(header)?;
        self.replace_list(field, AddressList::new());
        Ok(())
    }

    /// Parses `text` and appends the result to the list named by `header`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeaderTarget`] if `header` holds no addresses.
    pub fn parse_and_append_addresses(&mut self, header: &str, text: &str) -> Result<()> {
        self.append_addresses(header, AddressList::parse(text))
    }

    /// Appends addresses to the list named by `header`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeaderTarget`] if `header` holds no addresses.
    pub fn append_addresses<I>(&mut self, header: &str, addresses: I) -> Result<()>
    where
        I: IntoIterator<Item = Address>,
    {
        let field = address_field(header)?;
        self.addresses[field.index()].extend(addresses);
        self.sync_address_header(field);
        Ok(())
    }

    /// Replaces a whole list.
    pub fn set_addresses(&mut self, field: AddressField, list: AddressList) {
        self.replace_list(field, list);
    }

    fn push_address(&mut self, field: AddressField, address: Address) {
        self.addresses[field.index()].add(address);
        self.sync_address_header(field);
    }

    fn replace_list(&mut self, field: AddressField, list: AddressList) {
        self.addresses[field.index()] = list;
        self.sync_address_header(field);
    }

    fn sync_address_header(&mut self, field: AddressField) {
        let value = self.addresses[field.index()].to_string_encoded(true);
        self.headers.set(field.header_name(), &value);
    }

    fn resync_list_from_header(&mut self, field: AddressField) {
        let mut list = AddressList::new();
        for value in self.headers.get_all(field.header_name()) {
            list.append(AddressList::parse(value));
        }
        self.addresses[field.index()] = list;
    }

    // ----- generic headers -----

    /// First value of a header, looking at the message then the root object.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| self.mime_part.as_ref().and_then(|p| p.header(name)))
    }

    /// The message's own header fields (without the root's `Content-*`).
    #[must_use]
    pub const fn header_list(&self) -> &HeaderList {
        &self.headers
    }

    /// Every header as name → values, message headers first, then the root
    /// object's.
    #[must_use]
    pub fn headers(&self) -> Vec<(String, Vec<String>)> {
        let mut map = self.headers.to_multimap();
        if let Some(root) = &self.mime_part {
            for (name, values) in root.headers().to_multimap() {
                if let Some((_, existing)) =
                    map.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name))
                {
                    existing.extend(values);
                } else {
                    map.push((name, values));
                }
            }
        }
        map
    }

    /// Sets a header.
    ///
    /// `Content-*` fields go to the root object (creating one if needed);
    /// everything else goes to the message. Non-ASCII values are RFC 2047
    /// encoded as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeaderTarget`] for address headers, which
    /// must be changed through the address APIs.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        if AddressField::from_header(name).is_some() {
            return Err(Error::InvalidHeaderTarget(name.to_string(), "use add_address"));
        }
        if is_content_header(name) {
            if name.eq_ignore_ascii_case("Content-Type") && self.mime_part.is_none() {
                self.mime_part = Some(Object::new(ContentType::parse(value)));
            } else {
                self.root_or_default().set_header(name, value);
            }
        } else {
            self.headers.set_encoded(name, value, "UTF-8");
        }
        Ok(())
    }

    /// Appends a header field without replacing existing ones. Address
    /// fields are parsed into their list. Non-ASCII text is RFC 2047
    /// encoded as UTF-8.
    pub fn append_header(&mut self, name: &str, value: &str) {
        if is_content_header(name) {
            self.root_or_default().append_header(name, value);
            return;
        }
        if let Some(field) = AddressField::from_header(name) {
            let list = AddressList::parse(value);
            self.headers.append(name, &list.to_string_encoded(true));
            self.addresses[field.index()].append(list);
        } else {
            self.headers.append_encoded(name, value, "UTF-8");
        }
    }

    /// Removes the first field named `name`. Returns true if one existed.
    pub fn remove_header(&mut self, name: &str) -> bool {
        if is_content_header(name) {
            return self.mime_part.as_mut().is_some_and(|p| p.remove_header(name));
        }
        let removed = self.headers.remove(name);
        if removed && let Some(field) = AddressField::from_header(name) {
            self.resync_list_from_header(field);
        }
        removed
    }

    /// Removes every field named `name`. Returns true if any existed.
    pub fn remove_all_headers(&mut self, name: &str) -> bool {
        if is_content_header(name) {
            return self
                .mime_part
                .as_mut()
                .is_some_and(|p| p.entity_mut().remove_all_headers(name));
        }
        let removed = self.headers.remove_all(name);
        if removed && let Some(field) = AddressField::from_header(name) {
            self.resync_list_from_header(field);
        }
        removed
    }

    /// Replaces the value of the first `name` field equal to `old`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderNotFound`] if no such field exists.
    pub fn replace_header(&mut self, name: &str, old: &str, new: &str) -> Result<()> {
        if is_content_header(name) {
            return match self.mime_part.as_mut() {
                Some(root) => root.entity_mut().replace_header(name, old, new),
                None => Err(Error::HeaderNotFound {
                    name: name.to_string(),
                    value: old.to_string(),
                }),
            };
        }
        self.headers.replace(name, old, new)?;
        if let Some(field) = AddressField::from_header(name) {
            self.resync_list_from_header(field);
        }
        Ok(())
    }

    fn root_or_default(&mut self) -> &mut Object {
        self.mime_part.get_or_insert_with(|| Object::Part(Part::new()))
    }

    // ----- body -----

    /// Content-Type of the root object (`text/plain` without one).
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.mime_part
            .as_ref()
            .map_or_else(ContentType::text_plain, |p| p.content_type().clone())
    }

    /// Root object.
    #[must_use]
    pub const fn mime_part(&self) -> Option<&Object> {
        self.mime_part.as_ref()
    }

    /// Mutable root object.
    pub const fn mime_part_mut(&mut self) -> Option<&mut Object> {
        self.mime_part.as_mut()
    }

    /// Replaces the root object.
    pub fn set_mime_part(&mut self, part: impl Into<Object>) {
        self.mime_part = Some(part.into());
    }

    /// Removes and returns the root object.
    pub fn take_mime_part(&mut self) -> Option<Object> {
        self.mime_part.take()
    }

    /// Boundary of a multipart root.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.mime_part
            .as_ref()
            .and_then(Object::as_multipart)
            .and_then(Multipart::boundary)
    }

    /// First inline text part, preferring `text/plain`.
    #[must_use]
    pub fn body(&self) -> Option<&Part> {
        let mut plain = None;
        let mut any_text = None;
        for node in self.parts() {
            let Some(part) = node.object.as_part() else {
                continue;
            };
            if !part.is_text() || part.is_attachment() {
                continue;
            }
            if part.content_type().is_type("text", "plain") {
                plain = Some(part);
                break;
            }
            any_text.get_or_insert(part);
        }
        plain.or(any_text)
    }

    /// Concatenated text of every inline `text/plain` part.
    #[must_use]
    pub fn text_body(&self) -> Option<String> {
        self.collect_text("plain")
    }

    /// Concatenated text of every inline `text/html` part.
    #[must_use]
    pub fn html_body(&self) -> Option<String> {
        self.collect_text("html")
    }

    fn collect_text(&self, subtype: &str) -> Option<String> {
        let mut found = false;
        let mut text = String::new();
        for node in self.parts() {
            if let Some(part) = node.object.as_part()
                && part.content_type().is_type("text", subtype)
                && !part.is_attachment()
            {
                found = true;
                text.push_str(&part.text());
            }
        }
        found.then_some(text)
    }

    /// File name and decoded bytes of every leaf part that classifies as an
    /// attachment. Parts without a file name get an empty name.
    #[must_use]
    pub fn attachments(&self) -> Vec<(String, &[u8])> {
        self.parts()
            .filter(|node| node.is_attachment_strict())
            .filter_map(|node| node.object.as_part())
            .map(|part| (part.filename().unwrap_or_default().to_string(), part.bytes()))
            .collect()
    }

    /// Iterator over every node of the tree.
    #[must_use]
    pub fn parts(&self) -> PartIter<'_> {
        PartIter::new(self)
    }

    /// Visits every non-container node in pre-order. Embedded messages are
    /// visited but not entered. The first error stops the walk.
    ///
    /// # Errors
    ///
    /// Propagates the callback's error.
    pub fn walk<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&Object) -> Result<()>,
    {
        match &self.mime_part {
            Some(root) => walk_object(root, &mut f),
            None => Ok(()),
        }
    }

    /// Mutable variant of [`Self::walk`].
    ///
    /// # Errors
    ///
    /// Propagates the callback's error.
    pub fn walk_mut<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Object) -> Result<()>,
    {
        match &mut self.mime_part {
            Some(root) => walk_object_mut(root, &mut f),
            None => Ok(()),
        }
    }

    /// Turns a `text/plain` root into `multipart/alternative` holding the
    /// original part and a new `text/html` part. Returns false, changing
    /// nothing, for any other root.
    pub fn add_html_alternative(&mut self, html: &str) -> bool {
        let is_plain = self
            .mime_part
            .as_ref()
            .and_then(Object::as_part)
            .is_some_and(|p| p.content_type().is_type("text", "plain"));
        if !is_plain {
            return false;
        }
        let Some(plain) = self.mime_part.take() else {
            return false;
        };

        let mut html_part = Part::with_type("text", "html");
        html_part.set_text(html);

        let mut alternative = Multipart::with_subtype("alternative");
        alternative.add_part(plain);
        alternative.add_part(html_part);
        tracing::debug!("Wrapped text/plain root into multipart/alternative");
        self.mime_part = Some(Object::Multipart(alternative));
        true
    }

    // ----- export -----

    /// Wire form with DOS newlines.
    #[must_use]
    pub fn export(&self) -> Vec<u8> {
        self.to_bytes_with(&FormatOptions::builder().newline(Newline::Dos).build())
    }

    /// Wire form with default options.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_bytes_with(&FormatOptions::default())
    }

    /// Wire form with the given options.
    #[must_use]
    pub fn to_bytes_with(&self, options: &FormatOptions) -> Vec<u8> {
        Composer::new(*options).message_to_bytes(self)
    }

    /// Writes the wire form to `stream`.
    ///
    /// # Errors
    ///
    /// Propagates stream write errors.
    pub fn write_to_stream(&self, stream: &mut dyn Stream, options: &FormatOptions) -> Result<()> {
        Composer::new(*options).write_message(self, stream)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

fn address_field(header: &str) -> Result<AddressField> {
    AddressField::from_header(header)
        .ok_or_else(|| Error::InvalidHeaderTarget(header.to_string(), "not an address header"))
}

fn walk_object<F>(object: &Object, f: &mut F) -> Result<()>
where
    F: FnMut(&Object) -> Result<()>,
{
    match object {
        Object::Multipart(multipart) => {
            for child in multipart.parts() {
                walk_object(child, f)?;
            }
            Ok(())
        }
        other => f(other),
    }
}

fn walk_object_mut<F>(object: &mut Object, f: &mut F) -> Result<()>
where
    F: FnMut(&mut Object) -> Result<()>,
{
    match object {
        Object::Multipart(multipart) => {
            for child in multipart.parts_mut() {
                walk_object_mut(child, f)?;
            }
            Ok(())
        }
        other => f(other),
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
    use crate::object::MessagePart;

    const SIMPLE: &str = "From: Alice <alice@example.com>\r\n\
        To: bob@example.com, \"Carol C.\" <carol@example.com>\r\n\
        Cc: team: dan@example.com, erin@example.com;\r\n\
        Subject: =?UTF-8?B?SGVsbG8gV8O2cmxk?=\r\n\
        Date: Mon, 2 Jan 2006 15:04:05 -0700\r\n\
        Message-Id: <1234@example.com>\r\n\
        Content-Type: text/plain; charset=utf-8\r\n\
        \r\n\
        Hi Bob\r\n";

    fn simple() -> Message {
        Message::parse(SIMPLE.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_is_content_header() {
        assert!(is_content_header("Content-Type"));
        assert!(is_content_header("content-transfer-encoding"));
        assert!(!is_content_header("Content-"));
        assert!(!is_content_header("Contents"));
        assert!(!is_content_header("X-Content-Foo"));
    }

    #[test]
    fn test_envelope_accessors() {
        let msg = simple();
        assert_eq!(msg.subject().as_deref(), Some("Hello Wörld"));
        assert_eq!(msg.message_id(), Some("1234@example.com"));
        assert_eq!(msg.sender(), Some("Alice <alice@example.com>"));
        let date = msg.date().unwrap();
        assert_eq!(date.offset().local_minus_utc(), -7 * 3600);
        assert_eq!(msg.date_as_string(), Some("Mon, 2 Jan 2006 15:04:05 -0700"));
    }

    #[test]
    fn test_address_lists_parsed() {
        let msg = simple();
        assert_eq!(msg.from().len(), 1);
        assert_eq!(msg.from().get(0).unwrap().email(), Some("alice@example.com"));
        assert_eq!(msg.to().len(), 2);
        assert_eq!(msg.to().get(1).unwrap().name(), "Carol C.");
        assert_eq!(msg.cc().len(), 1);
        assert!(msg.cc().get(0).unwrap().is_group());
        assert_eq!(msg.all_recipients().flatten().len(), 4);
    }

    #[test]
    fn test_content_headers_on_root() {
        let msg = simple();
        assert!(msg.header_list().get("Content-Type").is_none());
        assert_eq!(msg.header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(msg.content_type().charset(), Some("utf-8"));

        let names: Vec<_> = msg.headers().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names.last().map(String::as_str), Some("Content-Type"));
    }

    #[test]
    fn test_set_header_rejects_address_fields() {
        let mut msg = simple();
        for name in ["From", "sender", "REPLY-TO", "To", "cc", "Bcc"] {
            let err = msg.set_header(name, "x@example.com").unwrap_err();
            assert!(matches!(err, Error::InvalidHeaderTarget(..)));
        }
        msg.set_header("X-Mailer", "mailtree").unwrap();
        assert_eq!(msg.header("X-Mailer"), Some("mailtree"));
        msg.set_header("Content-Transfer-Encoding", "8bit").unwrap();
        assert_eq!(
            msg.mime_part().unwrap().header("Content-Transfer-Encoding"),
            Some("8bit")
        );
    }

    #[test]
    fn test_address_apis_reject_other_fields() {
        let mut msg = Message::new();
        assert!(matches!(
            msg.add_address("Subject", "A", "a@example.com"),
            Err(Error::InvalidHeaderTarget(..))
        ));
        assert!(msg.clear_address("X-Foo").is_err());
        assert!(msg.parse_and_append_addresses("Date", "a@b.c").is_err());
    }

    #[test]
    fn test_address_mutation_syncs_header() {
        let mut msg = Message::new();
        msg.add_to("Bob", "bob@example.com");
        msg.add_address("cc", "", "carol@example.com").unwrap();
        msg.parse_and_append_addresses("To", "Dan <dan@example.com>").unwrap();
        assert_eq!(
            msg.header("To"),
            Some("Bob <bob@example.com>, Dan <dan@example.com>")
        );
        assert_eq!(msg.header("Cc"), Some("carol@example.com"));

        msg.clear_address("To").unwrap();
        assert!(msg.to().is_empty());
        assert_eq!(msg.header("To"), Some(""));

        msg.add_bcc("Jürgen", "j@example.de");
        assert_eq!(msg.header("Bcc"), Some("=?UTF-8?b?SsO8cmdlbg==?= <j@example.de>"));
    }

    #[test]
    fn test_append_header_encodes_non_ascii() {
        use crate::encoding::rfc2047;

        let mut msg = Message::new();
        msg.append_header("X-Note", "héllo");
        msg.append_header("X-Note", "plain");
        msg.append_header("Cc", "Jürgen <j@example.de>");
        msg.append_header("Content-Description", "résumé");

        let notes = msg.header_list().get_all("X-Note");
        assert_eq!(rfc2047::decode_header(notes[0]), "héllo");
        assert_eq!(notes[1], "plain");
        assert_eq!(msg.header("Cc"), Some("=?UTF-8?b?SsO8cmdlbg==?= <j@example.de>"));
        assert_eq!(msg.cc().get(0).unwrap().email(), Some("j@example.de"));

        let wire = msg.export();
        assert!(wire.is_ascii());
        let reparsed = Message::parse(wire).unwrap();
        assert_eq!(rfc2047::decode_header(reparsed.header("X-Note").unwrap()), "héllo");
        assert_eq!(
            rfc2047::decode_header(reparsed.header("Content-Description").unwrap()),
            "résumé"
        );
    }

    #[test]
    fn test_remove_and_replace_address_header() {
        let mut msg = simple();
        let old = msg.header("To").unwrap().to_string();
        msg.replace_header("To", &old, "zed@example.com").unwrap();
        assert_eq!(msg.to().len(), 1);
        assert_eq!(msg.to().get(0).unwrap().email(), Some("zed@example.com"));

        assert!(msg.remove_header("to"));
        assert!(msg.to().is_empty());
        assert!(!msg.remove_header("to"));

        let err = msg.replace_header("X-None", "a", "b").unwrap_err();
        assert!(matches!(err, Error::HeaderNotFound { .. }));
    }

    #[test]
    fn test_set_subject_and_ids() {
        let mut msg = Message::new();
        msg.set_subject("Grüße");
        assert_eq!(msg.header("Subject"), Some("=?UTF-8?b?R3LDvMOfZQ==?="));
        assert_eq!(msg.subject().as_deref(), Some("Grüße"));

        msg.set_message_id("<abc@host>");
        assert_eq!(msg.header("Message-Id"), Some("<abc@host>"));
        assert_eq!(msg.message_id(), Some("abc@host"));

        let date = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 12, 30, 0)
            .unwrap();
        msg.set_date(&date);
        assert_eq!(msg.date_as_string(), Some("Fri, 1 Mar 2024 12:30:00 +0100"));
        assert_eq!(msg.date(), Some(date));

        msg.set_sender("Alice <alice@example.com>");
        assert_eq!(msg.from().len(), 1);
        msg.set_reply_to("list@example.com");
        assert_eq!(msg.reply_to(), Some("list@example.com"));
        assert_eq!(msg.reply_to_list().len(), 1);
    }

    #[test]
    fn test_body_helpers() {
        let msg = simple();
        assert_eq!(msg.body().unwrap().text(), "Hi Bob\r\n");
        assert_eq!(msg.text_body().as_deref(), Some("Hi Bob\r\n"));
        assert!(msg.html_body().is_none());
        assert!(msg.attachments().is_empty());
        assert!(msg.boundary().is_none());
    }

    #[test]
    fn test_add_html_alternative() {
        let mut msg = simple();
        assert!(msg.add_html_alternative("<p>Hi Bob</p>"));
        let root = msg.mime_part().unwrap().as_multipart().unwrap();
        assert_eq!(root.content_type().mime_type(), "multipart/alternative");
        assert_eq!(root.count(), 2);
        assert_eq!(msg.html_body().as_deref(), Some("<p>Hi Bob</p>"));
        assert!(msg.boundary().is_some());

        assert!(!msg.add_html_alternative("<p>again</p>"));
        assert!(!Message::new().add_html_alternative("<p/>"));
    }

    #[test]
    fn test_walk_skips_containers() {
        let mut inner = Multipart::with_subtype("alternative");
        inner.add_part(Part::with_type("text", "plain"));
        inner.add_part(Part::with_type("text", "html"));
        let mut outer = Multipart::new();
        outer.add_part(inner);
        outer.add_part(MessagePart::new("rfc822"));

        let mut msg = Message::new();
        msg.set_mime_part(outer);

        let mut seen = Vec::new();
        msg.walk(|obj| {
            seen.push(obj.content_type().mime_type());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, ["text/plain", "text/html", "message/rfc822"]);

        msg.walk_mut(|obj| {
            obj.set_header("X-Seen", "yes");
            Ok(())
        })
        .unwrap();
        let mut tagged = 0;
        msg.walk(|obj| {
            if obj.header("X-Seen").is_some() {
                tagged += 1;
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(tagged, 3);

        let result = msg.walk(|_| Err(Error::Stream("stop".into())));
        assert!(result.is_err());
    }
}
