use crate::book::{BookId, MemberId};

/// Failure signals returned by circulation operations.
///
/// Every variant is an ordinary outcome of concurrent use. An operation that
/// returns one of these has not mutated any store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CirculationError {
    /// No book with this ID is in the catalog.
    #[error("book {0} not found")]
    BookNotFound(BookId),
    /// No member with this ID is registered.
    #[error("member {0} not found")]
    MemberNotFound(MemberId),
    /// The book is not available.
    #[error("book {0} is already borrowed")]
    AlreadyBorrowed(BookId),
    /// A live reservation already exists for the book.
    #[error("book {0} is already reserved")]
    AlreadyReserved(BookId),
    /// The member's borrowed sequence has no entry for the book.
    #[error("member {member_id} has not borrowed book {book_id}")]
    NotBorrowed {
        /// Book that was being returned.
        book_id: BookId,
        /// Member returning it.
        member_id: MemberId,
    },
}

/// Result alias for circulation operations.
pub type Result<T> = std::result::Result<T, CirculationError>;
