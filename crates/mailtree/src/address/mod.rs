//! Email addresses: mailboxes, groups and address lists.
//!
//! Every [`Address`] carries an identity token. [`AddressList`] membership
//! operations (`contains`, `remove`, `index_of`) compare identities, so two
//! equal-looking entries are still distinct. Cloning an address mints a new
//! identity.

mod parser;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::encoding::rfc2047;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Characters that force a display name into a quoted string.
const NAME_SPECIALS: &str = "()<>[]:;@\\,.\"";

/// Single mailbox: optional display name plus address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mailbox {
    /// Display name, empty when absent.
    pub name: String,
    /// `local@domain`.
    pub email: String,
}

/// Named group of addresses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Group {
    /// Group display name.
    pub name: String,
    /// Members, possibly nested groups.
    pub members: AddressList,
}

/// Mailbox or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressKind {
    /// A single mailbox.
    Mailbox(Mailbox),
    /// A group of addresses.
    Group(Group),
}

/// An address with identity.
#[derive(Debug)]
pub struct Address {
    id: u64,
    kind: AddressKind,
}

impl Address {
    /// Creates a mailbox address. Pass an empty name for a bare address.
    #[must_use]
    pub fn mailbox(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::from_kind(AddressKind::Mailbox(Mailbox {
            name: name.into(),
            email: email.into(),
        }))
    }

    /// Creates an empty group.
    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self::from_kind(AddressKind::Group(Group {
            name: name.into(),
            members: AddressList::new(),
        }))
    }

    /// Wraps an address kind with a fresh identity.
    #[must_use]
    pub fn from_kind(kind: AddressKind) -> Self {
        Self { id: next_id(), kind }
    }

    /// Identity token.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns true if `other` is this very address, not just an equal one.
    #[must_use]
    pub const fn same(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// Mailbox or group payload.
    #[must_use]
    pub const fn kind(&self) -> &AddressKind {
        &self.kind
    }

    /// Returns true for groups.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        matches!(self.kind, AddressKind::Group(_))
    }

    /// Display name (empty when absent).
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.kind {
            AddressKind::Mailbox(m) => &m.name,
            AddressKind::Group(g) => &g.name,
        }
    }

    /// Sets the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        match &mut self.kind {
            AddressKind::Mailbox(m) => m.name = name.into(),
            AddressKind::Group(g) => g.name = name.into(),
        }
    }

    /// Address of a mailbox; `None` for groups.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        match &self.kind {
            AddressKind::Mailbox(m) => Some(&m.email),
            AddressKind::Group(_) => None,
        }
    }

    /// Sets the address of a mailbox. Returns false for groups.
    pub fn set_email(&mut self, email: impl Into<String>) -> bool {
        match &mut self.kind {
            AddressKind::Mailbox(m) => {
                m.email = email.into();
                true
            }
            AddressKind::Group(_) => false,
        }
    }

    /// Members of a group; `None` for mailboxes.
    #[must_use]
    pub const fn members(&self) -> Option<&AddressList> {
        match &self.kind {
            AddressKind::Group(g) => Some(&g.members),
            AddressKind::Mailbox(_) => None,
        }
    }

    /// Mutable members of a group; `None` for mailboxes.
    pub const fn members_mut(&mut self) -> Option<&mut AddressList> {
        match &mut self.kind {
            AddressKind::Group(g) => Some(&mut g.members),
            AddressKind::Mailbox(_) => None,
        }
    }

    /// Adds a member to a group. Hands the address back for mailboxes.
    ///
    /// # Errors
    ///
    /// Returns `member` unchanged if `self` is not a group.
    pub fn add_member(&mut self, member: Self) -> std::result::Result<usize, Self> {
        match self.members_mut() {
            Some(members) => Ok(members.add(member)),
            None => Err(member),
        }
    }

    /// Renders the address, optionally RFC 2047 encoding non-ASCII names.
    #[must_use]
    pub fn to_string_encoded(&self, encode_names: bool) -> String {
        let mut out = String::new();
        self.write_to(&mut out, encode_names);
        out
    }

    fn write_to(&self, out: &mut String, encode_names: bool) {
        match &self.kind {
            AddressKind::Mailbox(m) => {
                if m.name.is_empty() {
                    out.push_str(&m.email);
                } else {
                    push_name(out, &m.name, encode_names);
                    out.push_str(" <");
                    out.push_str(&m.email);
                    out.push('>');
                }
            }
            AddressKind::Group(g) => {
                push_name(out, &g.name, encode_names);
                out.push(':');
                if !g.members.is_empty() {
                    out.push(' ');
                    g.members.write_to(out, encode_names);
                }
                out.push(';');
            }
        }
    }
}

impl Clone for Address {
    fn clone(&self) -> Self {
        Self::from_kind(self.kind.clone())
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Address {}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_encoded(false))
    }
}

fn push_name(out: &mut String, name: &str, encode: bool) {
    if encode && !name.is_ascii() {
        out.push_str(&rfc2047::encode_word(name, "UTF-8"));
    } else if name.contains(|c: char| NAME_SPECIALS.contains(c)) {
        out.push('"');
        for c in name.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(name);
    }
}

/// Ordered list of addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressList {
    addresses: Vec<Address>,
}

impl AddressList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            addresses: Vec::new(),
        }
    }

    /// Parses an address list. Entries that cannot be parsed are dropped
    /// with a warning.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self {
            addresses: parser::parse_list(text),
        }
    }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Appends an address, returning its index.
    pub fn add(&mut self, address: Address) -> usize {
        self.addresses.push(address);
        self.addresses.len() - 1
    }

    /// Inserts an address at `index` (clamped to the end).
    pub fn insert(&mut self, index: usize, address: Address) {
        let index = index.min(self.addresses.len());
        self.addresses.insert(index, address);
    }

    /// Removes `address` by identity. Returns true if it was present.
    pub fn remove(&mut self, address: &Address) -> bool {
        self.index_of(address)
            .map(|i| self.addresses.remove(i))
            .is_some()
    }

    /// Removes the address whose identity is `id`.
    pub fn remove_id(&mut self, id: u64) -> Option<Address> {
        let index = self.addresses.iter().position(|a| a.id == id)?;
        Some(self.addresses.remove(index))
    }

    /// Removes and returns the address at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<Address> {
        (index < self.addresses.len()).then(|| self.addresses.remove(index))
    }

    /// Returns true if this exact address (by identity) is in the list.
    #[must_use]
    pub fn contains(&self, address: &Address) -> bool {
        self.index_of(address).is_some()
    }

    /// Index of this exact address (by identity).
    #[must_use]
    pub fn index_of(&self, address: &Address) -> Option<usize> {
        self.addresses.iter().position(|a| a.same(address))
    }

    /// Address at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Address> {
        self.addresses.get(index)
    }

    /// Mutable address at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Address> {
        self.addresses.get_mut(index)
    }

    /// Replaces the address at `index`, returning the old one.
    pub fn set_address(&mut self, index: usize, address: Address) -> Option<Address> {
        self.addresses
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, address))
    }

    /// Removes every address.
    pub fn clear(&mut self) {
        self.addresses.clear();
    }

    /// Moves all of `other` in front of the current entries.
    pub fn prepend(&mut self, mut other: Self) {
        other.addresses.append(&mut self.addresses);
        self.addresses = other.addresses;
    }

    /// Moves all of `other` after the current entries.
    pub fn append(&mut self, mut other: Self) {
        self.addresses.append(&mut other.addresses);
    }

    /// Iterates over top-level entries.
    pub fn iter(&self) -> std::slice::Iter<'_, Address> {
        self.addresses.iter()
    }

    /// Iterates mutably over top-level entries.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Address> {
        self.addresses.iter_mut()
    }

    /// Every mailbox, descending into groups depth-first. Groups themselves
    /// are not included.
    #[must_use]
    pub fn flatten(&self) -> Vec<&Address> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into<'a>(&'a self, out: &mut Vec<&'a Address>) {
        for address in &self.addresses {
            match &address.kind {
                AddressKind::Mailbox(_) => out.push(address),
                AddressKind::Group(g) => g.members.flatten_into(out),
            }
        }
    }

    /// Renders the list joined by `", "`, optionally RFC 2047 encoding
    /// non-ASCII names.
    #[must_use]
    pub fn to_string_encoded(&self, encode_names: bool) -> String {
        let mut out = String::new();
        self.write_to(&mut out, encode_names);
        out
    }

    fn write_to(&self, out: &mut String, encode_names: bool) {
        for (i, address) in self.addresses.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            address.write_to(out, encode_names);
        }
    }
}

impl fmt::Display for AddressList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_encoded(false))
    }
}

impl FromIterator<Address> for AddressList {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self {
            addresses: iter.into_iter().collect(),
        }
    }
}

impl Extend<Address> for AddressList {
    fn extend<I: IntoIterator<Item = Address>>(&mut self, iter: I) {
        self.addresses.extend(iter);
    }
}

impl IntoIterator for AddressList {
    type Item = Address;
    type IntoIter = std::vec::IntoIter<Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.into_iter()
    }
}

impl<'a> IntoIterator for &'a AddressList {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.iter()
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
    fn test_mailbox_accessors() {
        let mut addr = Address::mailbox("John Doe", "john@example.com");
        assert_eq!(addr.name(), "John Doe");
        assert_eq!(addr.email(), Some("john@example.com"));
        assert!(addr.set_email("jd@example.com"));
        addr.set_name("");
        assert_eq!(addr.to_string(), "jd@example.com");
        assert!(addr.members().is_none());
    }

    #[test]
    fn test_group_accessors() {
        let mut group = Address::group("Team");
        assert!(group.is_group());
        assert_eq!(group.email(), None);
        assert!(!group.set_email("x@y"));
        group.add_member(Address::mailbox("", "a@x.com")).unwrap();
        group.add_member(Address::mailbox("B", "b@x.com")).unwrap();
        assert_eq!(group.to_string(), "Team: a@x.com, B <b@x.com>;");
        assert_eq!(Address::group("Empty").to_string(), "Empty:;");

        let mut mailbox = Address::mailbox("", "c@x.com");
        assert!(mailbox.add_member(Address::mailbox("", "d@x.com")).is_err());
    }

    #[test]
    fn test_identity_semantics() {
        let a = Address::mailbox("A", "a@x.com");
        let twin = a.clone();
        assert_eq!(a, twin);
        assert!(!a.same(&twin));

        let mut list = AddressList::new();
        list.add(a.clone());
        let stored = list.get(0).unwrap();
        assert!(!list.contains(&a));
        assert!(list.contains(stored));
        assert_eq!(list.index_of(stored), Some(0));
    }

    #[test]
    fn test_list_operations() {
        let mut list = AddressList::new();
        list.add(Address::mailbox("", "b@x.com"));
        list.insert(0, Address::mailbox("", "a@x.com"));
        list.insert(99, Address::mailbox("", "d@x.com"));
        list.set_address(2, Address::mailbox("", "c@x.com")).unwrap();
        assert_eq!(list.to_string(), "a@x.com, b@x.com, c@x.com");

        let second = list.get(1).unwrap().clone();
        assert!(!list.remove(&second));
        let removed = list.remove_at(1).unwrap();
        assert_eq!(removed.email(), Some("b@x.com"));
        assert!(list.remove_at(5).is_none());

        let mut front = AddressList::new();
        front.add(Address::mailbox("", "z@x.com"));
        list.prepend(front);
        let mut back = AddressList::new();
        back.add(Address::mailbox("", "y@x.com"));
        list.append(back);
        assert_eq!(list.to_string(), "z@x.com, a@x.com, c@x.com, y@x.com");

        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_by_identity() {
        let mut list = AddressList::new();
        let a = Address::mailbox("", "a@x.com");
        let twin = a.clone();
        list.add(a);
        list.add(twin);

        let copy = list.get(1).unwrap().clone();
        assert!(!list.remove(&copy));
        assert_eq!(list.len(), 2);

        let id = list.get(1).unwrap().id();
        let removed = list.remove_id(id).unwrap();
        assert_eq!(removed.id(), id);
        assert_eq!(list.len(), 1);
        assert!(list.remove_id(id).is_none());
    }

    #[test]
    fn test_flatten_recurses() {
        let mut inner = Address::group("Inner");
        inner.add_member(Address::mailbox("", "c@x.com")).unwrap();
        let mut outer = Address::group("Outer");
        outer.add_member(Address::mailbox("", "b@x.com")).unwrap();
        outer.add_member(inner).unwrap();

        let mut list = AddressList::new();
        list.add(Address::mailbox("", "a@x.com"));
        list.add(outer);
        list.add(Address::mailbox("", "d@x.com"));

        let emails: Vec<&str> = list.flatten().iter().filter_map(|a| a.email()).collect();
        assert_eq!(emails, vec!["a@x.com", "b@x.com", "c@x.com", "d@x.com"]);
    }

    #[test]
    fn test_name_quoting() {
        assert_eq!(Address::mailbox("[]", "g@b.com").to_string(), "\"[]\" <g@b.com>");
        assert_eq!(
            Address::mailbox("Doe, John", "j@x.com").to_string(),
            "\"Doe, John\" <j@x.com>"
        );
        assert_eq!(
            Address::mailbox("say \"hi\"", "h@x.com").to_string(),
            "\"say \\\"hi\\\"\" <h@x.com>"
        );
    }

    #[test]
    fn test_encoded_names() {
        let addr = Address::mailbox("Jörg", "j@x.com");
        assert_eq!(addr.to_string(), "Jörg <j@x.com>");
        assert_eq!(addr.to_string_encoded(true), "=?UTF-8?b?SsO2cmc=?= <j@x.com>");
    }
}
