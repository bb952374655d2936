//! Embedded messages (`message/rfc822`, `message/news`).

use super::Entity;
use crate::content_type::ContentType;
use crate::message::Message;

/// A part whose body is a complete message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePart {
    entity: Entity,
    message: Option<Box<Message>>,
}

entity_accessors!(MessagePart);

impl Default for MessagePart {
    fn default() -> Self {
        Self::new("rfc822")
    }
}

impl MessagePart {
    /// Creates an empty `message/<subtype>` part.
    #[must_use]
    pub fn new(subtype: &str) -> Self {
        Self::from_entity(Entity::new(ContentType::new("message", subtype)), None)
    }

    /// Creates a `message/<subtype>` part holding `message`.
    #[must_use]
    pub fn with_message(subtype: &str, message: Message) -> Self {
        let mut part = Self::new(subtype);
        part.set_message(message);
        part
    }

    pub(crate) fn from_entity(entity: Entity, message: Option<Message>) -> Self {
        Self {
            entity,
            message: message.map(Box::new),
        }
    }

    /// Embedded message.
    #[must_use]
    pub fn message(&self) -> Option<&Message> {
        self.message.as_deref()
    }

    /// Mutable embedded message.
    pub fn message_mut(&mut self) -> Option<&mut Message> {
        self.message.as_deref_mut()
    }

    /// Replaces the embedded message.
    pub fn set_message(&mut self, message: Message) {
        self.message = Some(Box::new(message));
    }

    /// Removes and returns the embedded message.
    pub fn take_message(&mut self) -> Option<Message> {
        self.message.take().map(|m| *m)
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
    fn test_new_is_empty() {
        let part = MessagePart::new("news");
        assert_eq!(part.content_type().mime_type(), "message/news");
        assert!(part.message().is_none());
        assert_eq!(MessagePart::default().content_type().mime_type(), "message/rfc822");
    }

    #[test]
    fn test_set_and_take_message() {
        let mut inner = Message::new();
        inner.set_subject("forwarded");
        let mut part = MessagePart::with_message("rfc822", inner);
        assert_eq!(part.message().unwrap().subject().as_deref(), Some("forwarded"));

        part.message_mut().unwrap().set_subject("edited");
        assert_eq!(part.message().unwrap().subject().as_deref(), Some("edited"));

        let taken = part.take_message().unwrap();
        assert_eq!(taken.subject().as_deref(), Some("edited"));
        assert!(part.message().is_none());
    }
}
