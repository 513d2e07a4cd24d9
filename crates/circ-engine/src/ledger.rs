use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use circ_core::{BookId, CirculationError, MemberId, Result};

use crate::api::Reservation;

#[derive(Debug, Clone)]
pub(crate) struct ReservationEntry {
    pub(crate) holder: MemberId,
    pub(crate) ticket: u64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) expires_at: DateTime<Utc>,
}

impl ReservationEntry {
    fn to_reservation(&self, book_id: BookId) -> Reservation {
        Reservation {
            book_id,
            holder: self.holder,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// Book ID to the member holding a temporary hold on it. At most one entry per book.
#[derive(Debug, Default)]
pub(crate) struct ReservationLedger {
    entries: BTreeMap<BookId, ReservationEntry>,
    next_ticket: u64,
}

impl ReservationLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a hold. Every accepted hold gets a fresh ticket, so an expiry
    /// action can tell its own hold apart from a later one by the same member.
    pub(crate) fn reserve(
        &mut self,
        book_id: BookId,
        holder: MemberId,
        ttl: Duration,
    ) -> Result<&ReservationEntry> {
        if self.entries.contains_key(&book_id) {
            return Err(CirculationError::AlreadyReserved(book_id));
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let created_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        let entry = self.entries.entry(book_id).or_insert(ReservationEntry {
            holder,
            ticket,
            created_at,
            expires_at: created_at + ttl,
        });
        Ok(entry)
    }

    /// Whether the entry for `book_id` is still the hold identified by `holder` and `ticket`.
    pub(crate) fn is_current(&self, book_id: BookId, holder: MemberId, ticket: u64) -> bool {
        matches!(self.entries.get(&book_id), Some(e) if e.holder == holder && e.ticket == ticket)
    }

    pub(crate) fn clear(&mut self, book_id: BookId) -> Option<ReservationEntry> {
        self.entries.remove(&book_id)
    }

    pub(crate) fn reservation(&self, book_id: BookId) -> Option<Reservation> {
        self.entries
            .get(&book_id)
            .map(|e| e.to_reservation(book_id))
    }

    /// All holds, sorted by book ID.
    pub(crate) fn reservations(&self) -> Vec<Reservation> {
        self.entries
            .iter()
            .map(|(book_id, e)| e.to_reservation(*book_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hold_per_book() {
        let mut ledger = ReservationLedger::new();
        let ticket = ledger.reserve(1, 7, Duration::from_secs(5)).unwrap().ticket;
        assert_eq!(
            ledger.reserve(1, 8, Duration::from_secs(5)).map(|e| e.holder),
            Err(CirculationError::AlreadyReserved(1))
        );
        assert!(ledger.is_current(1, 7, ticket));
        assert!(!ledger.is_current(1, 8, ticket));
    }

    #[test]
    fn tickets_distinguish_repeat_holds() {
        let mut ledger = ReservationLedger::new();
        let first = ledger.reserve(1, 7, Duration::from_secs(5)).unwrap().ticket;
        assert_eq!(ledger.clear(1).map(|e| e.holder), Some(7));

        let second = ledger.reserve(1, 7, Duration::from_secs(5)).unwrap().ticket;
        assert_ne!(first, second);
        assert!(!ledger.is_current(1, 7, first));
        assert!(ledger.is_current(1, 7, second));
    }

    #[test]
    fn expiry_deadline_follows_ttl() {
        let mut ledger = ReservationLedger::new();
        ledger.reserve(4, 2, Duration::from_secs(5)).unwrap();
        ledger.reserve(3, 2, Duration::from_secs(5)).unwrap();

        let res = ledger.reservation(4).unwrap();
        assert_eq!(res.expires_at - res.created_at, chrono::Duration::seconds(5));

        let ids: Vec<BookId> = ledger.reservations().iter().map(|r| r.book_id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert!(ledger.reservation(5).is_none());
    }
}
