//! The MIME object tree.
//!
//! A message body is a tree of [`Object`]s: leaf [`Part`]s, [`Multipart`]
//! containers, embedded messages ([`MessagePart`]) and `message/partial`
//! fragments ([`MessagePartial`]). Every node carries an [`Entity`] with its
//! headers and the parsed Content-Type / Content-Disposition, which are kept
//! in sync with the corresponding header fields.
//!
//! Nodes do not point at their parents. Traversal hands the parent out
//! instead (see [`crate::PartIter`] and [`Multipart::walk`]).

/// Forwards the common header accessors of a node type to its [`Entity`].
macro_rules! entity_accessors {
    ($ty:ty) => {
        impl $ty {
            /// Shared header block.
            #[must_use]
            pub const fn entity(&self) -> &$crate::object::Entity {
                &self.entity
            }

            /// Mutable header block.
            pub const fn entity_mut(&mut self) -> &mut $crate::object::Entity {
                &mut self.entity
            }

            /// Parsed Content-Type.
            #[must_use]
            pub const fn content_type(&self) -> &$crate::ContentType {
                self.entity.content_type()
            }

            /// Replaces the Content-Type.
            pub fn set_content_type(&mut self, content_type: $crate::ContentType) {
                self.entity.set_content_type(content_type);
            }

            /// Parsed Content-Disposition.
            #[must_use]
            pub const fn content_disposition(&self) -> Option<&$crate::ContentDisposition> {
                self.entity.content_disposition()
            }

            /// Replaces or removes the Content-Disposition.
            pub fn set_content_disposition(
                &mut self,
                disposition: Option<$crate::ContentDisposition>,
            ) {
                self.entity.set_content_disposition(disposition);
            }

            /// All header fields.
            #[must_use]
            pub const fn headers(&self) -> &$crate::HeaderList {
                self.entity.headers()
            }

            /// First value of a header.
            #[must_use]
            pub fn header(&self, name: &str) -> Option<&str> {
                self.entity.header(name)
            }

            /// Sets a header (RFC 2047 encoding non-ASCII values as UTF-8).
            pub fn set_header(&mut self, name: &str, value: &str) {
                self.entity.set_header(name, value);
            }

            /// Sets a header, encoding non-ASCII values with `charset`.
            pub fn set_header_with_charset(&mut self, name: &str, value: &str, charset: &str) {
                self.entity.set_header_with_charset(name, value, charset);
            }

            /// Appends a header field.
            pub fn append_header(&mut self, name: &str, value: &str) {
                self.entity.append_header(name, value);
            }

            /// Removes the first field named `name`.
            pub fn remove_header(&mut self, name: &str) -> bool {
                self.entity.remove_header(name)
            }

            /// Visits every header field; an error stops the walk.
            ///
            /// # Errors
            ///
            /// Propagates the callback's error.
            pub fn walk_headers<F>(&self, f: F) -> $crate::Result<()>
            where
                F: FnMut(&str, &str) -> $crate::Result<()>,
            {
                self.entity.walk_headers(f)
            }

            /// See [`Entity::is_attachment`](crate::object::Entity::is_attachment).
            #[must_use]
            pub fn is_attachment(&self) -> bool {
                self.entity.is_attachment()
            }
        }
    };
}

mod message_part;
mod multipart;
mod part;
mod partial;

pub use message_part::MessagePart;
pub use multipart::{Multipart, generate_boundary};
pub use part::{DataWrapper, Part};
pub use partial::MessagePartial;

use std::fmt;

use crate::content_disposition::{ATTACHMENT, ContentDisposition};
use crate::content_type::ContentType;
use crate::error::Result;
use crate::header::HeaderList;
use crate::options::FormatOptions;

const CONTENT_TYPE: &str = "Content-Type";
const CONTENT_DISPOSITION: &str = "Content-Disposition";

/// Headers plus the structured Content-Type and Content-Disposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    headers: HeaderList,
    content_type: ContentType,
    disposition: Option<ContentDisposition>,
}

impl Default for Entity {
    fn default() -> Self {
        Self::new(ContentType::text_plain())
    }
}

impl Entity {
    /// Creates an entity whose only header is `Content-Type`.
    #[must_use]
    pub fn new(content_type: ContentType) -> Self {
        let mut headers = HeaderList::new();
        headers.append(CONTENT_TYPE, &content_type.to_string());
        Self {
            headers,
            content_type,
            disposition: None,
        }
    }

    /// Builds an entity from parsed headers. A missing Content-Type means
    /// `text/plain`.
    #[must_use]
    pub fn from_headers(headers: HeaderList) -> Self {
        let content_type = headers
            .get(CONTENT_TYPE)
            .map_or_else(ContentType::text_plain, ContentType::parse);
        let disposition = headers.get(CONTENT_DISPOSITION).map(ContentDisposition::parse);
        Self {
            headers,
            content_type,
            disposition,
        }
    }

    /// All header fields in order.
    #[must_use]
    pub const fn headers(&self) -> &HeaderList {
        &self.headers
    }

    /// First value of a header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Sets a header, replacing existing fields. Non-ASCII values are
    /// RFC 2047 encoded as UTF-8.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.set_header_with_charset(name, value, "UTF-8");
    }

    /// Sets a header, RFC 2047 encoding non-ASCII values with `charset`.
    pub fn set_header_with_charset(&mut self, name: &str, value: &str, charset: &str) {
        if name.eq_ignore_ascii_case(CONTENT_TYPE) {
            self.set_content_type(ContentType::parse(value));
        } else if name.eq_ignore_ascii_case(CONTENT_DISPOSITION) {
            self.set_content_disposition(Some(ContentDisposition::parse(value)));
        } else {
            self.headers.set_encoded(name, value, charset);
        }
    }

    /// Appends a header field, keeping existing ones. Non-ASCII values of
    /// fields other than Content-Type and Content-Disposition are RFC 2047
    /// encoded as UTF-8.
    pub fn append_header(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case(CONTENT_TYPE) {
            if !self.headers.contains(CONTENT_TYPE) {
                self.content_type = ContentType::parse(value);
            }
        } else if name.eq_ignore_ascii_case(CONTENT_DISPOSITION) {
            if !self.headers.contains(CONTENT_DISPOSITION) {
                self.disposition = Some(ContentDisposition::parse(value));
            }
        } else {
            self.headers.append_encoded(name, value, "UTF-8");
            return;
        }
        self.headers.append(name, value);
    }

    /// Removes the first field named `name`. Returns true if one existed.
    pub fn remove_header(&mut self, name: &str) -> bool {
        let removed = self.headers.remove(name);
        if removed {
            self.resync(name);
        }
        removed
    }

    /// Removes every field named `name`. Returns true if any existed.
    pub fn remove_all_headers(&mut self, name: &str) -> bool {
        let removed = self.headers.remove_all(name);
        if removed {
            self.resync(name);
        }
        removed
    }

    /// Replaces the value of the first `name` field equal to `old`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::HeaderNotFound`] if no such field exists.
    pub fn replace_header(&mut self, name: &str, old: &str, new: &str) -> Result<()> {
        self.headers.replace(name, old, new)?;
        self.resync(name);
        Ok(())
    }

    fn resync(&mut self, name: &str) {
        if name.eq_ignore_ascii_case(CONTENT_TYPE) {
            self.content_type = self
                .headers
                .get(CONTENT_TYPE)
                .map_or_else(ContentType::text_plain, ContentType::parse);
        } else if name.eq_ignore_ascii_case(CONTENT_DISPOSITION) {
            self.disposition = self.headers.get(CONTENT_DISPOSITION).map(ContentDisposition::parse);
        }
    }

    /// Visits every header field, duplicates included. The first error
    /// stops the walk.
    ///
    /// # Errors
    ///
    /// Propagates the callback's error.
    pub fn walk_headers<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> Result<()>,
    {
        self.headers.walk(f)
    }

    /// Parsed Content-Type.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Replaces the Content-Type and its header field.
    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.headers.set(CONTENT_TYPE, &content_type.to_string());
        self.content_type = content_type;
    }

    /// Sets one Content-Type parameter and updates the header field.
    pub fn set_content_type_param(&mut self, name: &str, value: &str) {
        self.content_type.set_param(name, value);
        self.headers.set(CONTENT_TYPE, &self.content_type.to_string());
    }

    /// Parsed Content-Disposition, if present.
    #[must_use]
    pub const fn content_disposition(&self) -> Option<&ContentDisposition> {
        self.disposition.as_ref()
    }

    /// Replaces or removes the Content-Disposition and its header field.
    pub fn set_content_disposition(&mut self, disposition: Option<ContentDisposition>) {
        match &disposition {
            Some(d) => self.headers.set(CONTENT_DISPOSITION, &d.to_string()),
            None => {
                self.headers.remove_all(CONTENT_DISPOSITION);
            }
        }
        self.disposition = disposition;
    }

    /// Sets one Content-Disposition parameter, creating an `attachment`
    /// disposition if there is none.
    pub fn set_disposition_param(&mut self, name: &str, value: &str) {
        let mut disposition = self
            .disposition
            .take()
            .unwrap_or_else(|| ContentDisposition::new(ATTACHMENT));
        disposition.set_param(name, value);
        self.set_content_disposition(Some(disposition));
    }

    /// `filename` from Content-Disposition, else `name` from Content-Type.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.disposition
            .as_ref()
            .and_then(ContentDisposition::filename)
            .filter(|f| !f.is_empty())
            .or_else(|| self.content_type.param("name").filter(|n| !n.is_empty()))
    }

    /// True when the disposition is `attachment`, or when a non-empty
    /// filename is declared on either header.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition
            .as_ref()
            .is_some_and(ContentDisposition::is_attachment_token)
            || self.filename().is_some()
    }

    pub(crate) const fn headers_mut(&mut self) -> &mut HeaderList {
        &mut self.headers
    }
}

/// A node of the MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    /// Leaf with content.
    Part(Part),
    /// `multipart/*` container.
    Multipart(Multipart),
    /// `message/rfc822` or `message/news`.
    MessagePart(MessagePart),
    /// `message/partial` fragment.
    MessagePartial(MessagePartial),
}

impl Object {
    /// Creates an empty node of the variant `content_type` calls for.
    #[must_use]
    pub fn new(content_type: ContentType) -> Self {
        match (content_type.media_type(), content_type.media_subtype()) {
            ("multipart", _) => Self::Multipart(Multipart::with_content_type(content_type)),
            ("message", "rfc822" | "news") => {
                Self::MessagePart(MessagePart::from_entity(Entity::new(content_type), None))
            }
            ("message", "partial") => {
                Self::MessagePartial(MessagePartial::from_entity(Entity::new(content_type), None))
            }
            _ => Self::Part(Part::from_entity(Entity::new(content_type), None)),
        }
    }

    /// Shared header block.
    #[must_use]
    pub const fn entity(&self) -> &Entity {
        match self {
            Self::Part(p) => p.entity(),
            Self::Multipart(m) => m.entity(),
            Self::MessagePart(m) => m.entity(),
            Self::MessagePartial(m) => m.entity(),
        }
    }

    /// Mutable header block.
    pub const fn entity_mut(&mut self) -> &mut Entity {
        match self {
            Self::Part(p) => p.entity_mut(),
            Self::Multipart(m) => m.entity_mut(),
            Self::MessagePart(m) => m.entity_mut(),
            Self::MessagePartial(m) => m.entity_mut(),
        }
    }

    /// Parsed Content-Type.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        self.entity().content_type()
    }

    /// Replaces the Content-Type.
    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.entity_mut().set_content_type(content_type);
    }

    /// Parsed Content-Disposition.
    #[must_use]
    pub const fn content_disposition(&self) -> Option<&ContentDisposition> {
        self.entity().content_disposition()
    }

    /// Replaces or removes the Content-Disposition.
    pub fn set_content_disposition(&mut self, disposition: Option<ContentDisposition>) {
        self.entity_mut().set_content_disposition(disposition);
    }

    /// All header fields.
    #[must_use]
    pub const fn headers(&self) -> &HeaderList {
        self.entity().headers()
    }

    /// First value of a header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.entity().header(name)
    }

    /// Sets a header (RFC 2047 encoding non-ASCII values as UTF-8).
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.entity_mut().set_header(name, value);
    }

    /// Sets a header, encoding non-ASCII values with `charset`.
    pub fn set_header_with_charset(&mut self, name: &str, value: &str, charset: &str) {
        self.entity_mut().set_header_with_charset(name, value, charset);
    }

    /// Appends a header field.
    pub fn append_header(&mut self, name: &str, value: &str) {
        self.entity_mut().append_header(name, value);
    }

    /// Removes the first field named `name`.
    pub fn remove_header(&mut self, name: &str) -> bool {
        self.entity_mut().remove_header(name)
    }

    /// Visits every header field; an error stops the walk.
    ///
    /// # Errors
    ///
    /// Propagates the callback's error.
    pub fn walk_headers<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> Result<()>,
    {
        self.entity().walk_headers(f)
    }

    /// See [`Entity::is_attachment`].
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.entity().is_attachment()
    }

    /// [`Self::is_attachment`], or: the parent is
    /// `multipart/alternative|related|mixed` and this node is neither
    /// `text/plain`, `text/html` nor a multipart.
    #[must_use]
    pub fn is_attachment_strict(&self, parent: Option<&Multipart>) -> bool {
        if self.is_attachment() {
            return true;
        }
        let Some(parent) = parent else {
            return false;
        };
        let parent_type = parent.entity().content_type();
        let container = ["alternative", "related", "mixed"]
            .iter()
            .any(|s| parent_type.is_type("multipart", s));
        let ct = self.content_type();
        container
            && !ct.is_type("text", "plain")
            && !ct.is_type("text", "html")
            && !matches!(self, Self::Multipart(_))
    }

    /// Returns true for `multipart/*` containers.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }

    /// The leaf part, if this is one.
    #[must_use]
    pub const fn as_part(&self) -> Option<&Part> {
        match self {
            Self::Part(p) => Some(p),
            _ => None,
        }
    }

    /// The mutable leaf part, if this is one.
    pub const fn as_part_mut(&mut self) -> Option<&mut Part> {
        match self {
            Self::Part(p) => Some(p),
            _ => None,
        }
    }

    /// The container, if this is one.
    #[must_use]
    pub const fn as_multipart(&self) -> Option<&Multipart> {
        match self {
            Self::Multipart(m) => Some(m),
            _ => None,
        }
    }

    /// The mutable container, if this is one.
    pub const fn as_multipart_mut(&mut self) -> Option<&mut Multipart> {
        match self {
            Self::Multipart(m) => Some(m),
            _ => None,
        }
    }

    /// The embedded message part, if this is one.
    #[must_use]
    pub const fn as_message_part(&self) -> Option<&MessagePart> {
        match self {
            Self::MessagePart(m) => Some(m),
            _ => None,
        }
    }

    /// The partial fragment, if this is one.
    #[must_use]
    pub const fn as_message_partial(&self) -> Option<&MessagePartial> {
        match self {
            Self::MessagePartial(m) => Some(m),
            _ => None,
        }
    }

    /// Wire form with default format options.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_bytes_with(&FormatOptions::default())
    }

    /// Wire form with the given options.
    #[must_use]
    pub fn to_bytes_with(&self, options: &FormatOptions) -> Vec<u8> {
        crate::compose::Composer::new(*options).object_to_bytes(self)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

impl From<Part> for Object {
    fn from(part: Part) -> Self {
        Self::Part(part)
    }
}

impl From<Multipart> for Object {
    fn from(multipart: Multipart) -> Self {
        Self::Multipart(multipart)
    }
}

impl From<MessagePart> for Object {
    fn from(part: MessagePart) -> Self {
        Self::MessagePart(part)
    }
}

impl From<MessagePartial> for Object {
    fn from(partial: MessagePartial) -> Self {
        Self::MessagePartial(partial)
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
    use crate::error::Error;

    #[test]
    fn test_object_new_picks_variant() {
        assert!(matches!(Object::new(ContentType::new("multipart", "related")), Object::Multipart(_)));
        assert!(matches!(Object::new(ContentType::new("message", "rfc822")), Object::MessagePart(_)));
        assert!(matches!(Object::new(ContentType::new("message", "news")), Object::MessagePart(_)));
        assert!(matches!(
            Object::new(ContentType::new("message", "partial")),
            Object::MessagePartial(_)
        ));
        assert!(matches!(Object::new(ContentType::new("image", "png")), Object::Part(_)));
    }

    #[test]
    fn test_content_type_header_sync() {
        let mut entity = Entity::default();
        assert_eq!(entity.header("content-type"), Some("text/plain"));

        entity.set_header("Content-Type", "text/html; charset=\"utf-8\"");
        assert_eq!(entity.content_type().mime_type(), "text/html");
        assert_eq!(entity.content_type().charset(), Some("utf-8"));
        assert_eq!(entity.header("Content-Type"), Some("text/html; charset=utf-8"));

        entity.set_content_type(ContentType::new("image", "gif"));
        assert_eq!(entity.header("Content-Type"), Some("image/gif"));

        assert!(entity.remove_header("CONTENT-TYPE"));
        assert_eq!(entity.content_type().mime_type(), "text/plain");
    }

    #[test]
    fn test_disposition_header_sync() {
        let mut entity = Entity::default();
        assert!(entity.content_disposition().is_none());
        entity.set_header("Content-Disposition", "attachment; filename=a.pdf");
        assert_eq!(entity.content_disposition().unwrap().filename(), Some("a.pdf"));
        assert_eq!(entity.filename(), Some("a.pdf"));

        entity.set_content_disposition(None);
        assert!(entity.header("Content-Disposition").is_none());
        assert!(entity.filename().is_none());
    }

    #[test]
    fn test_set_header_encodes_non_ascii() {
        let mut entity = Entity::default();
        entity.set_header("X-Note", "naïve");
        assert_eq!(entity.header("X-Note"), Some("=?UTF-8?b?bmHDr3Zl?="));
        entity.set_header_with_charset("X-Note", "naïve", "iso-8859-1");
        assert_eq!(entity.header("X-Note"), Some("=?iso-8859-1?b?bmHvdmU=?="));
    }

    #[test]
    fn test_append_header_encodes_non_ascii() {
        let mut entity = Entity::default();
        entity.append_header("X-Note", "naïve");
        entity.append_header("X-Note", "plain");
        entity.append_header("Content-Type", "text/plain; name=\"café.txt\"");
        assert_eq!(entity.headers().get_all("X-Note"), vec!["=?UTF-8?b?bmHDr3Zl?=", "plain"]);
        assert_eq!(entity.content_type().mime_type(), "text/plain");
    }

    #[test]
    fn test_walk_headers_aborts() {
        let mut entity = Entity::default();
        entity.append_header("X-A", "1");
        entity.append_header("X-A", "2");
        let mut seen = 0;
        let result = entity.walk_headers(|name, _| {
            seen += 1;
            if name == "X-A" {
                return Err(Error::Stream("abort".into()));
            }
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_is_attachment_rules() {
        let mut entity = Entity::default();
        assert!(!entity.is_attachment());

        entity.set_header("Content-Disposition", "inline");
        assert!(!entity.is_attachment());

        entity.set_header("Content-Disposition", "ATTACHMENT");
        assert!(entity.is_attachment());

        let mut named = Entity::new(ContentType::new("image", "png").with_param("name", "logo.png"));
        assert!(named.is_attachment());
        named.set_content_type_param("name", "");
        assert!(!named.is_attachment());
        named.set_header("Content-Disposition", "inline; filename=x.png");
        assert!(named.is_attachment());
    }

    #[test]
    fn test_is_attachment_strict() {
        let related = Multipart::with_subtype("related");
        let digest = Multipart::with_subtype("digest");
        let image = Object::new(ContentType::new("image", "png"));
        let html = Object::new(ContentType::new("text", "html"));
        let nested = Object::new(ContentType::new("multipart", "alternative"));

        assert!(!image.is_attachment_strict(None));
        assert!(image.is_attachment_strict(Some(&related)));
        assert!(!image.is_attachment_strict(Some(&digest)));
        assert!(!html.is_attachment_strict(Some(&related)));
        assert!(!nested.is_attachment_strict(Some(&related)));
    }
}
