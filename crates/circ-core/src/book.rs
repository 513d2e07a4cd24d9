use serde::{Deserialize, Serialize};

/// Caller-assigned book identifier.
pub type BookId = u64;

/// Member identifier.
pub type MemberId = u64;

/// Circulation status of a book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookStatus {
    /// On the shelf.
    #[default]
    Available,
    /// Held by exactly one member.
    Borrowed,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Identity, immutable once created.
    pub id: BookId,
    /// Title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Current circulation status.
    #[serde(default)]
    pub status: BookStatus,
}

impl Book {
    /// Build a new, available book.
    pub fn new(id: BookId, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            author: author.into(),
            status: BookStatus::Available,
        }
    }

    /// Whether the book can be borrowed right now.
    pub fn is_available(&self) -> bool {
        self.status == BookStatus::Available
    }
}

/// A library member and the books they currently hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Identity.
    pub id: MemberId,
    /// Borrowed books in borrow order (the state of each book at the moment it was borrowed).
    #[serde(default)]
    pub borrowed: Vec<Book>,
}

impl Member {
    /// A member with nothing borrowed.
    pub fn new(id: MemberId) -> Self {
        Self {
            id,
            borrowed: Vec::new(),
        }
    }

    /// Whether any entry in the borrowed sequence names `book_id`.
    pub fn holds(&self, book_id: BookId) -> bool {
        self.borrowed.iter().any(|b| b.id == book_id)
    }
}
