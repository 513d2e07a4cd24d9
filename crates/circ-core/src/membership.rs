use std::collections::HashMap;

use crate::book::{Book, BookId, Member, MemberId};
use crate::error::{CirculationError, Result};

/// Mapping of member identity to the books that member currently holds.
#[derive(Debug, Clone, Default)]
pub struct Membership {
    members: HashMap<MemberId, Member>,
}

impl Membership {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member. Returns `false` if the ID was already known (the
    /// existing borrowed sequence is kept).
    pub fn register(&mut self, id: MemberId) -> bool {
        if self.members.contains_key(&id) {
            return false;
        }
        self.members.insert(id, Member::new(id));
        true
    }

    /// Look up a member.
    pub fn get(&self, id: MemberId) -> Result<&Member> {
        self.members
            .get(&id)
            .ok_or(CirculationError::MemberNotFound(id))
    }

    /// Append a book to the end of the member's borrowed sequence.
    pub fn append_borrowed(&mut self, id: MemberId, book: Book) -> Result<()> {
        let member = self
            .members
            .get_mut(&id)
            .ok_or(CirculationError::MemberNotFound(id))?;
        member.borrowed.push(book);
        Ok(())
    }

    /// Remove the first entry naming `book_id` from the member's borrowed sequence.
    pub fn remove_borrowed(&mut self, id: MemberId, book_id: BookId) -> Result<Book> {
        let member = self
            .members
            .get_mut(&id)
            .ok_or(CirculationError::MemberNotFound(id))?;
        let idx = member
            .borrowed
            .iter()
            .position(|b| b.id == book_id)
            .ok_or(CirculationError::NotBorrowed {
                book_id,
                member_id: id,
            })?;
        Ok(member.borrowed.remove(idx))
    }

    /// The member's borrowed sequence, in borrow order.
    pub fn list_borrowed(&self, id: MemberId) -> Result<Vec<Book>> {
        Ok(self.get(id)?.borrowed.clone())
    }

    /// Number of members whose borrowed sequence names `book_id`.
    pub fn holder_count(&self, book_id: BookId) -> usize {
        self.members.values().filter(|m| m.holds(book_id)).count()
    }

    /// All members. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Number of registered members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no member is registered.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
