//! `multipart/*` containers.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{Entity, Object};
use crate::content_type::ContentType;
use crate::error::Result;

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Container of child objects separated by a boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    entity: Entity,
    parts: Vec<Object>,
}

entity_accessors!(Multipart);

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    /// Creates an empty `multipart/mixed` container with a fresh boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_subtype("mixed")
    }

    /// Creates an empty `multipart/<subtype>` container with a fresh
    /// boundary.
    #[must_use]
    pub fn with_subtype(subtype: &str) -> Self {
        Self::with_content_type(ContentType::new("multipart", subtype))
    }

    /// Creates an empty container from a content type, generating a
    /// boundary if the type carries none.
    #[must_use]
    pub fn with_content_type(mut content_type: ContentType) -> Self {
        if content_type.boundary().is_none_or(str::is_empty) {
            content_type.set_param("boundary", generate_boundary());
        }
        Self::from_entity(Entity::new(content_type))
    }

    pub(crate) const fn from_entity(entity: Entity) -> Self {
        Self {
            entity,
            parts: Vec::new(),
        }
    }

    /// Boundary parameter.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.entity.content_type().boundary()
    }

    /// Sets the boundary, or generates a new one for `None`.
    pub fn set_boundary(&mut self, boundary: Option<&str>) {
        let boundary = boundary.map_or_else(generate_boundary, str::to_string);
        self.entity.set_content_type_param("boundary", &boundary);
    }

    /// Appends a child.
    pub fn add_part(&mut self, part: impl Into<Object>) {
        self.parts.push(part.into());
    }

    /// Inserts a child at `index`, appending when out of range.
    pub fn insert_part(&mut self, index: usize, part: impl Into<Object>) {
        let index = index.min(self.parts.len());
        self.parts.insert(index, part.into());
    }

    /// Removes and returns the child at `index`.
    pub fn remove_part_at(&mut self, index: usize) -> Option<Object> {
        (index < self.parts.len()).then(|| self.parts.remove(index))
    }

    /// Child at `index`.
    #[must_use]
    pub fn get_part(&self, index: usize) -> Option<&Object> {
        self.parts.get(index)
    }

    /// Mutable child at `index`.
    pub fn get_part_mut(&mut self, index: usize) -> Option<&mut Object> {
        self.parts.get_mut(index)
    }

    /// Number of direct children.
    #[must_use]
    pub fn count(&self) -> usize {
        self.parts.len()
    }

    /// Removes every child.
    pub fn clear(&mut self) {
        self.parts.clear();
    }

    /// Direct children.
    #[must_use]
    pub fn parts(&self) -> &[Object] {
        &self.parts
    }

    /// Mutable direct children.
    pub fn parts_mut(&mut self) -> &mut [Object] {
        &mut self.parts
    }

    /// Calls `f` for every direct child. The first error stops the walk.
    ///
    /// # Errors
    ///
    /// Propagates the callback's error.
    pub fn walk<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&Object) -> Result<()>,
    {
        for part in &self.parts {
            f(part)?;
        }
        Ok(())
    }
}

/// Returns a new boundary token: `=-` followed by 20 base64 characters.
#[must_use]
pub fn generate_boundary() -> String {
    let mut seed = [0u8; 15];
    if let Err(e) = getrandom::getrandom(&mut seed) {
        tracing::warn!(?e, "No system randomness, deriving boundary from the clock");
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes();
        let count = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes();
        seed[..8].copy_from_slice(&nanos);
        seed[8..].copy_from_slice(&count[..7]);
    }
    format!("=-{}", STANDARD.encode(seed))
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
    use crate::object::Part;

    #[test]
    fn test_boundary_generated_once() {
        let multipart = Multipart::new();
        let boundary = multipart.boundary().unwrap().to_string();
        assert!(boundary.starts_with("=-"));
        assert_eq!(boundary.len(), 22);
        assert_eq!(multipart.boundary(), Some(boundary.as_str()));
        assert_eq!(multipart.content_type().mime_type(), "multipart/mixed");
        assert!(multipart.header("Content-Type").unwrap().contains(&boundary));
    }

    #[test]
    fn test_boundaries_differ() {
        assert_ne!(generate_boundary(), generate_boundary());
    }

    #[test]
    fn test_explicit_boundary_kept() {
        let multipart = Multipart::with_content_type(ContentType::multipart("related", "B1"));
        assert_eq!(multipart.boundary(), Some("B1"));

        let mut multipart = Multipart::with_subtype("alternative");
        multipart.set_boundary(Some("XYZ"));
        assert_eq!(multipart.boundary(), Some("XYZ"));
        assert_eq!(
            multipart.header("Content-Type"),
            Some("multipart/alternative; boundary=XYZ")
        );
        multipart.set_boundary(None);
        assert_ne!(multipart.boundary(), Some("XYZ"));
    }

    #[test]
    fn test_child_management() {
        let mut multipart = Multipart::new();
        multipart.add_part(Part::with_type("text", "plain"));
        multipart.add_part(Part::with_type("text", "html"));
        multipart.insert_part(0, Part::with_type("image", "png"));
        multipart.insert_part(99, Part::with_type("application", "pdf"));
        assert_eq!(multipart.count(), 4);
        assert_eq!(
            multipart.get_part(0).unwrap().content_type().mime_type(),
            "image/png"
        );
        assert_eq!(
            multipart.get_part(3).unwrap().content_type().mime_type(),
            "application/pdf"
        );

        let removed = multipart.remove_part_at(0).unwrap();
        assert_eq!(removed.content_type().mime_type(), "image/png");
        assert!(multipart.remove_part_at(10).is_none());
        assert!(multipart.get_part(3).is_none());

        multipart
            .get_part_mut(0)
            .unwrap()
            .set_header("Content-Id", "<a@b>");
        assert_eq!(multipart.parts()[0].header("Content-Id"), Some("<a@b>"));

        multipart.clear();
        assert_eq!(multipart.count(), 0);
    }

    #[test]
    fn test_walk_is_one_level_and_abortable() {
        let mut inner = Multipart::with_subtype("alternative");
        inner.add_part(Part::new());
        inner.add_part(Part::new());
        let mut outer = Multipart::new();
        outer.add_part(inner);
        outer.add_part(Part::with_type("image", "gif"));
        outer.add_part(Part::with_type("image", "jpeg"));

        let mut seen = Vec::new();
        outer
            .walk(|obj| {
                seen.push(obj.content_type().mime_type());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, ["multipart/alternative", "image/gif", "image/jpeg"]);

        let mut visits = 0;
        let result = outer.walk(|obj| {
            visits += 1;
            if obj.content_type().is_type("image", "*") {
                return Err(Error::Stream("stop".into()));
            }
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(visits, 2);
    }
}
