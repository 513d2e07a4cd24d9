//! Public API types for the in-process circulation engine.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use circ_core::{Book, BookId, BookStatus, Member, MemberId, Result};

/// How long a reservation is held before the expiry action fires.
pub const RESERVATION_TTL: Duration = Duration::from_secs(5);

/// Semantics for the interaction between reservations, borrowing and removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CirculationPolicy {
    /// Reservations are an overlay that never affects borrowing.
    ///
    /// Borrowing ignores (and keeps) any reservation, a borrowed book can be
    /// reserved, and a book can be removed while borrowed or reserved.
    #[default]
    Compatible,
    /// Reservations and removal respect the borrow state.
    ///
    /// Reserving a borrowed book fails with `AlreadyBorrowed`, a successful
    /// borrow clears any reservation on the book, removing a borrowed book fails
    /// with `AlreadyBorrowed`, and removing a book clears its reservation.
    Strict,
}

/// Configuration for the in-process engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Members registered before the first operation.
    pub members: Vec<MemberId>,

    /// Initial catalog. Every entry starts available regardless of its status field.
    pub books: Vec<Book>,

    /// Reservation/borrow interaction semantics.
    pub policy: CirculationPolicy,

    /// Capacity of the event broadcast channel (0 selects the default).
    pub event_capacity: usize,
}

impl EngineConfig {
    /// Default event channel capacity.
    pub const DEFAULT_EVENT_CAPACITY: usize = 1024;
}

/// An active hold on a book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    /// Reserved book.
    pub book_id: BookId,
    /// Member holding the reservation.
    pub holder: MemberId,
    /// When the reservation was taken.
    pub created_at: DateTime<Utc>,
    /// When the expiry action is due.
    pub expires_at: DateTime<Utc>,
}

/// Engine event stream payload. Events are published in lock order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum CirculationEvent {
    /// A member was registered.
    MemberRegistered {
        /// Member identifier.
        member_id: MemberId,
    },
    /// A book was added to (or overwritten in) the catalog.
    BookAdded {
        /// Book identifier.
        book_id: BookId,
        /// Whether an existing record was overwritten.
        replaced: bool,
    },
    /// A book was removed from the catalog.
    BookRemoved {
        /// Book identifier.
        book_id: BookId,
    },
    /// A book was borrowed.
    BookBorrowed {
        /// Book identifier.
        book_id: BookId,
        /// Borrowing member.
        member_id: MemberId,
    },
    /// A book was returned.
    BookReturned {
        /// Book identifier.
        book_id: BookId,
        /// Returning member.
        member_id: MemberId,
    },
    /// A reservation was taken.
    BookReserved {
        /// Book identifier.
        book_id: BookId,
        /// Reserving member.
        member_id: MemberId,
        /// When the expiry action is due.
        expires_at: DateTime<Utc>,
    },
    /// A reservation was dropped by a borrow or a removal (strict policy only).
    ReservationCleared {
        /// Book identifier.
        book_id: BookId,
        /// Former holder.
        member_id: MemberId,
    },
    /// An unclaimed reservation expired and was released.
    ReservationReleased {
        /// Book identifier.
        book_id: BookId,
        /// Former holder.
        member_id: MemberId,
    },
    /// A reservation reached its deadline but was kept because the book was
    /// not available at that moment.
    ReservationRetained {
        /// Book identifier.
        book_id: BookId,
        /// Holder.
        member_id: MemberId,
    },
}

/// Point-in-time copy of the engine state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibrarySnapshot {
    /// Active policy.
    pub policy: CirculationPolicy,
    /// Catalog, sorted by book ID.
    pub books: Vec<Book>,
    /// Members, sorted by member ID.
    pub members: Vec<Member>,
    /// Active reservations, sorted by book ID.
    pub reservations: Vec<Reservation>,
    /// Expiry actions that have not fired yet.
    pub pending_expiries: usize,
}

impl LibrarySnapshot {
    /// Books whose status disagrees with the members' borrowed sequences.
    ///
    /// A book is reported when it is `Borrowed` but not held by exactly one
    /// member, or when it is `Available` and some member still holds it.
    /// Books held by a member but missing from the catalog are reported too.
    pub fn borrow_invariant_violations(&self) -> Vec<BookId> {
        let mut violations = BTreeSet::new();
        for book in &self.books {
            let holders = self.members.iter().filter(|m| m.holds(book.id)).count();
            let ok = match book.status {
                BookStatus::Borrowed => holders == 1,
                BookStatus::Available => holders == 0,
            };
            if !ok {
                violations.insert(book.id);
            }
        }
        let cataloged: BTreeSet<BookId> = self.books.iter().map(|b| b.id).collect();
        for member in &self.members {
            for held in &member.borrowed {
                if !cataloged.contains(&held.id) {
                    violations.insert(held.id);
                }
            }
        }
        violations.into_iter().collect()
    }

    /// Reservation for `book_id`, if any.
    pub fn reservation(&self, book_id: BookId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.book_id == book_id)
    }
}

/// Handle to an in-process engine instance. Cheap to clone; all clones share
/// one engine.
#[derive(Clone)]
pub struct EngineHandle {
    pub(crate) inner: Arc<crate::engine::EngineInner>,
}

/// Start a new in-process engine instance.
///
/// Must be called from within a Tokio runtime: reservations spawn their expiry
/// actions onto it.
pub fn start_engine(config: EngineConfig) -> EngineHandle {
    crate::engine::start_engine(config)
}

impl EngineHandle {
    /// Subscribe to the engine event stream.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CirculationEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Active policy.
    pub fn policy(&self) -> CirculationPolicy {
        self.inner.policy()
    }

    /// Register a member. Returns `false` if the member already existed.
    pub async fn register_member(&self, member_id: MemberId) -> bool {
        self.inner.register_member(member_id).await
    }

    /// Insert or overwrite a book.
    pub async fn add_book(
        &self,
        book_id: BookId,
        title: impl Into<String>,
        author: impl Into<String>,
    ) {
        self.inner.add_book(Book::new(book_id, title, author)).await;
    }

    /// Remove a book from the catalog.
    pub async fn remove_book(&self, book_id: BookId) -> Result<()> {
        self.inner.remove_book(book_id).await
    }

    /// Borrow an available book.
    pub async fn borrow_book(&self, book_id: BookId, member_id: MemberId) -> Result<()> {
        self.inner.borrow_book(book_id, member_id).await
    }

    /// Return a borrowed book.
    pub async fn return_book(&self, book_id: BookId, member_id: MemberId) -> Result<()> {
        self.inner.return_book(book_id, member_id).await
    }

    /// Place a time-limited hold on a book. The hold is released after
    /// [`RESERVATION_TTL`] if the book is still available then.
    ///
    /// # Panics
    ///
    /// Panics if a reservation is accepted outside a Tokio runtime, since its
    /// expiry action is spawned onto the current runtime.
    pub async fn reserve_book(&self, book_id: BookId, member_id: MemberId) -> Result<()> {
        self.inner.reserve_book(book_id, member_id).await
    }

    /// All available books, in unspecified order.
    pub async fn list_available_books(&self) -> Vec<Book> {
        self.inner.list_available_books().await
    }

    /// The member's borrowed books, in borrow order.
    pub async fn list_borrowed_books(&self, member_id: MemberId) -> Result<Vec<Book>> {
        self.inner.list_borrowed_books(member_id).await
    }

    /// Look up a single book.
    pub async fn book(&self, book_id: BookId) -> Option<Book> {
        self.inner.book(book_id).await
    }

    /// Active reservation for a book, if any.
    pub async fn reservation(&self, book_id: BookId) -> Option<Reservation> {
        self.inner.reservation(book_id).await
    }

    /// Get a consistent copy of the whole engine state.
    pub async fn snapshot(&self) -> LibrarySnapshot {
        self.inner.snapshot().await
    }
}
