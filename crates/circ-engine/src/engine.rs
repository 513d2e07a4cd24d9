use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

use circ_core::{Book, BookId, BookStatus, Catalog, CirculationError, MemberId, Membership, Result};

use crate::api::{
    CirculationEvent, CirculationPolicy, EngineConfig, EngineHandle, LibrarySnapshot,
    RESERVATION_TTL, Reservation,
};
use crate::expiry::{ExpiryScheduler, Hold};
use crate::ledger::ReservationLedger;


/// What an expiry action did when it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpiryOutcome {
    /// The hold was still current and the book available; the hold is gone.
    Released,
    /// The hold was still current but the book was not available; the hold is kept.
    Retained,
    /// The hold had already been cleared or replaced.
    Superseded,
}

/// The three stores, guarded together by the engine lock.
///
/// Every mutating method validates all of its preconditions before its first
/// write, so an `Err` leaves the state untouched.
#[derive(Debug)]
struct LibraryState {
    catalog: Catalog,
    members: Membership,
    ledger: ReservationLedger,
}

impl LibraryState {
    fn seeded(cfg: &EngineConfig) -> Self {
        let mut catalog = Catalog::new();
        for book in &cfg.books {
            catalog.add(Book::new(book.id, book.title.clone(), book.author.clone()));
        }
        let mut members = Membership::new();
        for member_id in &cfg.members {
            members.register(*member_id);
        }
        Self {
            catalog,
            members,
            ledger: ReservationLedger::new(),
        }
    }

    fn register_member(&mut self, member_id: MemberId) -> Vec<CirculationEvent> {
        if self.members.register(member_id) {
            vec![CirculationEvent::MemberRegistered { member_id }]
        } else {
            Vec::new()
        }
    }

    fn add_book(&mut self, mut book: Book) -> Vec<CirculationEvent> {
        // A book some member still holds stays borrowed, whether it is being
        // overwritten or re-added after a removal.
        if self.members.holder_count(book.id) > 0 {
            book.status = BookStatus::Borrowed;
        }
        let book_id = book.id;
        let replaced = self.catalog.add(book).is_some();
        vec![CirculationEvent::BookAdded { book_id, replaced }]
    }

    fn remove_book(
        &mut self,
        book_id: BookId,
        policy: CirculationPolicy,
    ) -> Result<Vec<CirculationEvent>> {
        let book = self.catalog.get(book_id)?;
        if policy == CirculationPolicy::Strict && !book.is_available() {
            return Err(CirculationError::AlreadyBorrowed(book_id));
        }

        self.catalog.remove(book_id)?;
        let mut events = vec![CirculationEvent::BookRemoved { book_id }];
        if policy == CirculationPolicy::Strict {
            if let Some(entry) = self.ledger.clear(book_id) {
                events.push(CirculationEvent::ReservationCleared {
                    book_id,
                    member_id: entry.holder,
                });
            }
        }
        Ok(events)
    }

    fn borrow(
        &mut self,
        book_id: BookId,
        member_id: MemberId,
        policy: CirculationPolicy,
    ) -> Result<Vec<CirculationEvent>> {
        let mut book = self.catalog.get(book_id)?.clone();
        self.members.get(member_id)?;
        if !book.is_available() {
            return Err(CirculationError::AlreadyBorrowed(book_id));
        }

        book.status = BookStatus::Borrowed;
        self.catalog.set_status(book_id, BookStatus::Borrowed)?;
        self.members.append_borrowed(member_id, book)?;

        let mut events = vec![CirculationEvent::BookBorrowed { book_id, member_id }];
        if policy == CirculationPolicy::Strict {
            if let Some(entry) = self.ledger.clear(book_id) {
                events.push(CirculationEvent::ReservationCleared {
                    book_id,
                    member_id: entry.holder,
                });
            }
        }
        Ok(events)
    }

    fn return_book(
        &mut self,
        book_id: BookId,
        member_id: MemberId,
    ) -> Result<Vec<CirculationEvent>> {
        if !self.catalog.contains(book_id) {
            return Err(CirculationError::BookNotFound(book_id));
        }
        let member = self.members.get(member_id)?;
        if !member.holds(book_id) {
            return Err(CirculationError::NotBorrowed { book_id, member_id });
        }

        self.members.remove_borrowed(member_id, book_id)?;
        self.catalog.set_status(book_id, BookStatus::Available)?;
        Ok(vec![CirculationEvent::BookReturned { book_id, member_id }])
    }

    fn reserve(
        &mut self,
        book_id: BookId,
        member_id: MemberId,
        policy: CirculationPolicy,
    ) -> Result<(Hold, Vec<CirculationEvent>)> {
        let book = self.catalog.get(book_id)?;
        if policy == CirculationPolicy::Strict && !book.is_available() {
            return Err(CirculationError::AlreadyBorrowed(book_id));
        }

        let entry = self.ledger.reserve(book_id, member_id, RESERVATION_TTL)?;
        let hold = Hold {
            book_id,
            holder: member_id,
            ticket: entry.ticket,
        };
        let event = CirculationEvent::BookReserved {
            book_id,
            member_id,
            expires_at: entry.expires_at,
        };
        Ok((hold, vec![event]))
    }

    fn expire(&mut self, hold: Hold) -> (ExpiryOutcome, Vec<CirculationEvent>) {
        if !self.ledger.is_current(hold.book_id, hold.holder, hold.ticket) {
            return (ExpiryOutcome::Superseded, Vec::new());
        }

        // A book that is no longer in the catalog is not available either.
        let available = self
            .catalog
            .get(hold.book_id)
            .map(Book::is_available)
            .unwrap_or(false);
        if !available {
            let event = CirculationEvent::ReservationRetained {
                book_id: hold.book_id,
                member_id: hold.holder,
            };
            return (ExpiryOutcome::Retained, vec![event]);
        }

        self.ledger.clear(hold.book_id);
        let event = CirculationEvent::ReservationReleased {
            book_id: hold.book_id,
            member_id: hold.holder,
        };
        (ExpiryOutcome::Released, vec![event])
    }

    fn snapshot(&self, policy: CirculationPolicy, pending_expiries: usize) -> LibrarySnapshot {
        let mut books: Vec<Book> = self.catalog.iter().cloned().collect();
        books.sort_by_key(|b| b.id);
        let mut members: Vec<_> = self.members.iter().cloned().collect();
        members.sort_by_key(|m| m.id);
        LibrarySnapshot {
            policy,
            books,
            members,
            reservations: self.ledger.reservations(),
            pending_expiries,
        }
    }
}

pub(crate) struct EngineInner {
    pub(crate) event_tx: broadcast::Sender<CirculationEvent>,
    state: Mutex<LibraryState>,
    policy: CirculationPolicy,
    expiry: ExpiryScheduler,
}

impl EngineInner {
    pub(crate) fn policy(&self) -> CirculationPolicy {
        self.policy
    }

    // Called with the lock held so the event stream follows lock order.
    fn emit(&self, events: Vec<CirculationEvent>) {
        for event in events {
            tracing::debug!(event = ?event, "circulation event");
            let _ = self.event_tx.send(event);
        }
    }

    fn commit(&self, op: &'static str, res: Result<Vec<CirculationEvent>>) -> Result<()> {
        match res {
            Ok(events) => {
                self.emit(events);
                Ok(())
            }
            Err(err) => {
                tracing::debug!(op, error = %err, "operation rejected");
                Err(err)
            }
        }
    }

    pub(crate) async fn register_member(&self, member_id: MemberId) -> bool {
        let mut state = self.state.lock().await;
        let events = state.register_member(member_id);
        let created = !events.is_empty();
        self.emit(events);
        created
    }

    pub(crate) async fn add_book(&self, book: Book) {
        let mut state = self.state.lock().await;
        let events = state.add_book(book);
        self.emit(events);
    }

    pub(crate) async fn remove_book(&self, book_id: BookId) -> Result<()> {
        let mut state = self.state.lock().await;
        let res = state.remove_book(book_id, self.policy);
        self.commit("remove_book", res)
    }

    pub(crate) async fn borrow_book(&self, book_id: BookId, member_id: MemberId) -> Result<()> {
        let mut state = self.state.lock().await;
        let res = state.borrow(book_id, member_id, self.policy);
        self.commit("borrow_book", res)
    }

    pub(crate) async fn return_book(&self, book_id: BookId, member_id: MemberId) -> Result<()> {
        let mut state = self.state.lock().await;
        let res = state.return_book(book_id, member_id);
        self.commit("return_book", res)
    }

    pub(crate) async fn reserve_book(
        self: &Arc<Self>,
        book_id: BookId,
        member_id: MemberId,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let res = state.reserve(book_id, member_id, self.policy);
        let (hold, events) = match res {
            Ok(v) => v,
            Err(err) => return self.commit("reserve_book", Err(err)),
        };
        self.expiry.schedule(Arc::downgrade(self), hold, RESERVATION_TTL);
        self.commit("reserve_book", Ok(events))
    }

    pub(crate) async fn expire_reservation(&self, hold: Hold) -> ExpiryOutcome {
        let mut state = self.state.lock().await;
        let (outcome, events) = state.expire(hold);
        match outcome {
            ExpiryOutcome::Released => tracing::info!(
                book_id = hold.book_id,
                member_id = hold.holder,
                "reservation expired"
            ),
            ExpiryOutcome::Retained => tracing::info!(
                book_id = hold.book_id,
                member_id = hold.holder,
                "reservation deadline reached while book unavailable; keeping hold"
            ),
            ExpiryOutcome::Superseded => tracing::debug!(
                book_id = hold.book_id,
                member_id = hold.holder,
                ticket = hold.ticket,
                "stale expiry action"
            ),
        }
        self.emit(events);
        outcome
    }

    pub(crate) async fn list_available_books(&self) -> Vec<Book> {
        self.state.lock().await.catalog.list_available()
    }

    pub(crate) async fn list_borrowed_books(&self, member_id: MemberId) -> Result<Vec<Book>> {
        self.state.lock().await.members.list_borrowed(member_id)
    }

    pub(crate) async fn book(&self, book_id: BookId) -> Option<Book> {
        self.state.lock().await.catalog.get(book_id).ok().cloned()
    }

    pub(crate) async fn reservation(&self, book_id: BookId) -> Option<Reservation> {
        self.state.lock().await.ledger.reservation(book_id)
    }

    pub(crate) async fn snapshot(&self) -> LibrarySnapshot {
        let state = self.state.lock().await;
        state.snapshot(self.policy, self.expiry.pending())
    }
}

pub(crate) fn start_engine(cfg: EngineConfig) -> EngineHandle {
    let capacity = if cfg.event_capacity == 0 {
        EngineConfig::DEFAULT_EVENT_CAPACITY
    } else {
        cfg.event_capacity
    };
    let (event_tx, _) = broadcast::channel::<CirculationEvent>(capacity);

    let state = LibraryState::seeded(&cfg);
    tracing::info!(
        books = state.catalog.len(),
        members = state.members.len(),
        policy = ?cfg.policy,
        "circulation engine started"
    );

    let inner = Arc::new(EngineInner {
        event_tx,
        state: Mutex::new(state),
        policy: cfg.policy,
        expiry: ExpiryScheduler::new(),
    });
    EngineHandle { inner }
}
