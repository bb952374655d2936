//! Depth-first cursor over the MIME tree.
//!
//! [`PartIter`] visits the root and then every descendant of every
//! multipart in pre-order. Embedded messages are yielded but not entered.
//! The parent of the current node is tracked on an explicit frame stack,
//! so classification that depends on the parent works without back links.

use crate::message::Message;
use crate::object::{Multipart, Object};

/// A node yielded by [`PartIter`] with its traversal context.
#[derive(Debug, Clone, Copy)]
pub struct PartRef<'a> {
    /// The node.
    pub object: &'a Object,
    /// The multipart holding the node; `None` for the root.
    pub parent: Option<&'a Multipart>,
    /// Nesting depth; the root is 0.
    pub depth: usize,
}

impl PartRef<'_> {
    /// See [`Object::is_attachment_strict`].
    #[must_use]
    pub fn is_attachment_strict(&self) -> bool {
        self.object.is_attachment_strict(self.parent)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame<'a> {
    container: &'a Multipart,
    index: usize,
}

#[derive(Debug, Clone)]
enum State<'a> {
    AtRoot(&'a Object),
    InContainer(Vec<Frame<'a>>),
    Exhausted,
}

/// Pre-order cursor over a MIME tree.
///
/// `current()` is `Some` exactly while `has_next()` is true. Advancing past
/// the last node exhausts the cursor; further advances do nothing.
#[derive(Debug, Clone)]
pub struct PartIter<'a> {
    state: State<'a>,
}

impl<'a> PartIter<'a> {
    /// Starts at the message's root object.
    #[must_use]
    pub fn new(message: &'a Message) -> Self {
        message
            .mime_part()
            .map_or(Self { state: State::Exhausted }, Self::from_object)
    }

    /// Starts at `root`.
    #[must_use]
    pub const fn from_object(root: &'a Object) -> Self {
        Self {
            state: State::AtRoot(root),
        }
    }

    /// Returns true while the cursor points at a node.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        !matches!(self.state, State::Exhausted)
    }

    /// Node under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&'a Object> {
        match &self.state {
            State::AtRoot(root) => Some(*root),
            State::InContainer(stack) => stack
                .last()
                .and_then(|frame| frame.container.get_part(frame.index)),
            State::Exhausted => None,
        }
    }

    /// Multipart holding the current node.
    #[must_use]
    pub fn parent(&self) -> Option<&'a Multipart> {
        match &self.state {
            State::InContainer(stack) => stack.last().map(|frame| frame.container),
            _ => None,
        }
    }

    /// Nesting depth of the current node; the root is 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        match &self.state {
            State::InContainer(stack) => stack.len(),
            _ => 0,
        }
    }

    /// 1-based section path of the current node, e.g. `[2, 1]`. Empty for
    /// the root.
    #[must_use]
    pub fn path(&self) -> Vec<usize> {
        match &self.state {
            State::InContainer(stack) => stack.iter().map(|frame| frame.index + 1).collect(),
            _ => Vec::new(),
        }
    }

    /// Moves to the next node in pre-order. Returns `has_next()`.
    pub fn advance(&mut self) -> bool {
        let current = self.current();
        self.state = match std::mem::replace(&mut self.state, State::Exhausted) {
            State::AtRoot(_) => match current.and_then(non_empty_multipart) {
                Some(container) => State::InContainer(vec![Frame {
                    container,
                    index: 0,
                }]),
                None => State::Exhausted,
            },
            State::InContainer(mut stack) => {
                if let Some(container) = current.and_then(non_empty_multipart) {
                    stack.push(Frame {
                        container,
                        index: 0,
                    });
                } else {
                    next_sibling(&mut stack);
                }
                if stack.is_empty() {
                    State::Exhausted
                } else {
                    State::InContainer(stack)
                }
            }
            State::Exhausted => State::Exhausted,
        };
        self.has_next()
    }
}

fn non_empty_multipart(object: &Object) -> Option<&Multipart> {
    object.as_multipart().filter(|m| m.count() > 0)
}

/// Steps to the next sibling, popping finished containers.
fn next_sibling(stack: &mut Vec<Frame<'_>>) {
    while let Some(frame) = stack.last_mut() {
        frame.index += 1;
        if frame.index < frame.container.count() {
            return;
        }
        stack.pop();
    }
}

impl<'a> Iterator for PartIter<'a> {
    type Item = PartRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = PartRef {
            object: self.current()?,
            parent: self.parent(),
            depth: self.depth(),
        };
        self.advance();
        Some(item)
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
    use crate::object::{MessagePart, Part};

    /// mixed[ alternative[ plain, related[ html, png ] ], pdf, rfc822, mixed[] ]
    fn tree() -> Message {
        let mut related = Multipart::with_subtype("related");
        related.add_part(Part::with_type("text", "html"));
        related.add_part(Part::with_type("image", "png"));

        let mut alternative = Multipart::with_subtype("alternative");
        alternative.add_part(Part::with_type("text", "plain"));
        alternative.add_part(related);

        let mut mixed = Multipart::new();
        mixed.add_part(alternative);
        mixed.add_part(Part::with_type("application", "pdf"));
        let mut inner = Message::new();
        inner.set_mime_part(Part::new());
        mixed.add_part(MessagePart::with_message("rfc822", inner));
        mixed.add_part(Multipart::new());

        let mut msg = Message::new();
        msg.set_mime_part(mixed);
        msg
    }

    #[test]
    fn test_preorder_with_paths() {
        let msg = tree();
        let mut iter = PartIter::new(&msg);
        let mut seen = Vec::new();
        while iter.has_next() {
            let node = iter.current().unwrap();
            seen.push((node.content_type().mime_type(), iter.path(), iter.depth()));
            iter.advance();
        }
        let expected: Vec<(String, Vec<usize>, usize)> = vec![
            ("multipart/mixed".into(), vec![], 0),
            ("multipart/alternative".into(), vec![1], 1),
            ("text/plain".into(), vec![1, 1], 2),
            ("multipart/related".into(), vec![1, 2], 2),
            ("text/html".into(), vec![1, 2, 1], 3),
            ("image/png".into(), vec![1, 2, 2], 3),
            ("application/pdf".into(), vec![2], 1),
            ("message/rfc822".into(), vec![3], 1),
            ("multipart/mixed".into(), vec![4], 1),
        ];
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_cursor_contract() {
        let msg = tree();
        let mut iter = PartIter::new(&msg);
        let total = iter.clone().count();
        assert_eq!(total, 9);

        for _ in 0..total {
            assert!(iter.has_next());
            assert!(iter.current().is_some());
            iter.advance();
        }
        assert!(!iter.has_next());
        assert!(iter.current().is_none());
        assert!(!iter.advance());
        assert!(!iter.has_next());
        assert!(iter.current().is_none());
        assert!(iter.parent().is_none());
    }

    #[test]
    fn test_parent_tracking() {
        let msg = tree();
        let parents: Vec<Option<String>> = PartIter::new(&msg)
            .map(|node| node.parent.map(|p| p.content_type().media_subtype().to_string()))
            .collect();
        assert_eq!(parents[0], None);
        assert_eq!(parents[2].as_deref(), Some("alternative"));
        assert_eq!(parents[5].as_deref(), Some("related"));
        assert_eq!(parents[6].as_deref(), Some("mixed"));
    }

    #[test]
    fn test_strict_classification_uses_parent() {
        let msg = tree();
        let strict: Vec<String> = PartIter::new(&msg)
            .filter(|node| node.is_attachment_strict())
            .map(|node| node.object.content_type().mime_type())
            .collect();
        assert_eq!(strict, ["image/png", "application/pdf", "message/rfc822"]);
    }

    #[test]
    fn test_single_part_and_empty() {
        let mut msg = Message::new();
        assert!(!PartIter::new(&msg).has_next());

        msg.set_mime_part(Part::new());
        let mut iter = PartIter::new(&msg);
        assert!(iter.has_next());
        assert!(iter.parent().is_none());
        assert!(!iter.advance());

        let root = Object::new(crate::ContentType::new("multipart", "mixed"));
        let mut iter = PartIter::from_object(&root);
        assert_eq!(iter.current().unwrap().content_type().mime_type(), "multipart/mixed");
        assert!(!iter.advance());
    }
}
