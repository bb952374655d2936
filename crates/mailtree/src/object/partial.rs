//! `message/partial` fragments.

use super::{DataWrapper, Entity};
use crate::content_type::ContentType;

/// One fragment of a message split across several `message/partial`
/// parts. Only the identifying parameters and the payload are exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePartial {
    entity: Entity,
    content: Option<DataWrapper>,
}

entity_accessors!(MessagePartial);

impl MessagePartial {
    /// Creates fragment `number` of `total` for the message `id`.
    #[must_use]
    pub fn new(id: &str, number: u32, total: u32) -> Self {
        let content_type = ContentType::new("message", "partial")
            .with_param("id", id)
            .with_param("number", number.to_string())
            .with_param("total", total.to_string());
        Self::from_entity(Entity::new(content_type), None)
    }

    pub(crate) const fn from_entity(entity: Entity, content: Option<DataWrapper>) -> Self {
        Self { entity, content }
    }

    /// `id` parameter.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.entity.content_type().param("id")
    }

    /// `number` parameter; `None` if absent or not a number.
    #[must_use]
    pub fn number(&self) -> Option<u32> {
        self.numeric_param("number")
    }

    /// `total` parameter; `None` if absent or not a number.
    #[must_use]
    pub fn total(&self) -> Option<u32> {
        self.numeric_param("total")
    }

    fn numeric_param(&self, name: &str) -> Option<u32> {
        self.entity
            .content_type()
            .param(name)
            .and_then(|v| v.trim().parse().ok())
    }

    /// Fragment payload.
    #[must_use]
    pub const fn content(&self) -> Option<&DataWrapper> {
        self.content.as_ref()
    }

    /// Replaces the fragment payload.
    pub fn set_content(&mut self, content: DataWrapper) {
        self.content = Some(content);
    }

    /// Decoded payload; empty when there is none.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.content.as_ref().map_or(&[], DataWrapper::decoded)
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
    use crate::encoding::ContentEncoding;

    #[test]
    fn test_parameters() {
        let partial = MessagePartial::new("abc@host", 2, 3);
        assert_eq!(partial.id(), Some("abc@host"));
        assert_eq!(partial.number(), Some(2));
        assert_eq!(partial.total(), Some(3));
        assert_eq!(
            partial.header("Content-Type"),
            Some("message/partial; id=\"abc@host\"; number=2; total=3")
        );
    }

    #[test]
    fn test_bad_numbers() {
        let mut partial = MessagePartial::new("x", 1, 1);
        partial.set_header("Content-Type", "message/partial; id=x; number=two");
        assert_eq!(partial.number(), None);
        assert_eq!(partial.total(), None);
    }

    #[test]
    fn test_payload() {
        let mut partial = MessagePartial::new("x", 1, 2);
        assert!(partial.bytes().is_empty());
        partial.set_content(DataWrapper::from_bytes(&b"Subject: a\r\n"[..], ContentEncoding::SevenBit));
        assert_eq!(partial.bytes(), b"Subject: a\r\n");
    }
}
