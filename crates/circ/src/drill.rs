use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::sync::Barrier;
use tokio::task::JoinSet;

use circ_core::seed::SeedBook;
use circ_core::{BookId, MemberId, SeedFile};
use circ_engine::{
    CirculationError, CirculationPolicy, EngineConfig, EngineHandle, RESERVATION_TTL, Result,
};

use crate::shutdown::StopSignal;

const EXPIRY_SLACK: Duration = Duration::from_millis(250);

pub fn generated_seed(books: u64, members: u64) -> SeedFile {
    SeedFile {
        members: (1..=members).collect(),
        books: (1..=books)
            .map(|id| SeedBook {
                id,
                title: format!("Book {id}"),
                author: format!("Author {}", id % 7),
            })
            .collect(),
    }
}

pub fn engine_config(seed: &SeedFile, policy: CirculationPolicy) -> EngineConfig {
    EngineConfig {
        members: seed.members.clone(),
        books: seed.catalog(),
        policy,
        event_capacity: 0,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Drill {
    pub callers: usize,
    pub rounds: u32,
    pub wait_expiry: bool,
}

/// Per-outcome counters for every call the drill made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub borrowed: u64,
    pub borrow_conflicts: u64,
    pub returned: u64,
    pub reserved: u64,
    pub reserve_conflicts: u64,
    pub unexpected: u64,
}

impl Tally {
    fn record_borrow(&mut self, res: &Result<()>) {
        match res {
            Ok(()) => self.borrowed += 1,
            Err(CirculationError::AlreadyBorrowed(_)) => self.borrow_conflicts += 1,
            Err(_) => self.unexpected += 1,
        }
    }

    fn record_return(&mut self, res: &Result<()>) {
        match res {
            Ok(()) => self.returned += 1,
            Err(_) => self.unexpected += 1,
        }
    }

    fn record_reserve(&mut self, res: &Result<()>) {
        match res {
            Ok(()) => self.reserved += 1,
            Err(CirculationError::AlreadyReserved(_) | CirculationError::AlreadyBorrowed(_)) => {
                self.reserve_conflicts += 1
            }
            Err(_) => self.unexpected += 1,
        }
    }

    fn merge(&mut self, other: &Tally) {
        self.borrowed += other.borrowed;
        self.borrow_conflicts += other.borrow_conflicts;
        self.returned += other.returned;
        self.reserved += other.reserved;
        self.reserve_conflicts += other.reserve_conflicts;
        self.unexpected += other.unexpected;
    }
}

#[derive(Debug, Clone, Default)]
pub struct DrillReport {
    pub rounds: u32,
    pub tally: Tally,
    /// Rounds in which more than one caller borrowed the contested book.
    pub double_borrows: Vec<u32>,
    /// Rounds after which the snapshot failed the borrow invariant, with the offending books.
    pub violations: Vec<(u32, Vec<BookId>)>,
    /// Reservations still held after waiting out the expiry deadline.
    pub reservations_after_expiry: Option<usize>,
    pub elapsed: Duration,
}

impl DrillReport {
    pub fn is_clean(&self) -> bool {
        self.double_borrows.is_empty() && self.violations.is_empty() && self.tally.unexpected == 0
    }
}

/// Run contention rounds: every caller borrows the same book at once, then
/// all of them try to reserve the next book, then the winner returns.
pub async fn run_drill(
    engine: &EngineHandle,
    drill: &Drill,
    stop: &StopSignal,
) -> anyhow::Result<DrillReport> {
    let snapshot = engine.snapshot().await;
    let book_ids: Vec<BookId> = snapshot.books.iter().map(|b| b.id).collect();
    let member_ids: Vec<MemberId> = snapshot.members.iter().map(|m| m.id).collect();
    if book_ids.is_empty() {
        anyhow::bail!("drill needs at least one book in the catalog");
    }
    if member_ids.is_empty() {
        anyhow::bail!("drill needs at least one registered member");
    }

    let callers = drill.callers.max(1);
    let started_at = Instant::now();
    let mut report = DrillReport::default();

    for round in 0..drill.rounds {
        if stop.is_set() {
            tracing::info!(round, "stop requested; skipping remaining rounds");
            break;
        }

        let idx = round as usize;
        let target = book_ids[idx % book_ids.len()];
        let hold_target = book_ids[(idx + 1) % book_ids.len()];
        let tally = run_round(engine, target, hold_target, &member_ids, callers, idx).await?;

        if tally.borrowed > 1 {
            tracing::warn!(round, book_id = target, winners = tally.borrowed, "double borrow");
            report.double_borrows.push(round);
        }
        report.tally.merge(&tally);

        let violations = engine.snapshot().await.borrow_invariant_violations();
        if !violations.is_empty() {
            tracing::warn!(round, ?violations, "borrow invariant violated");
            report.violations.push((round, violations));
        }
        report.rounds += 1;
    }

    if drill.wait_expiry && !stop.is_set() {
        tracing::info!(
            wait_ms = (RESERVATION_TTL + EXPIRY_SLACK).as_millis() as u64,
            "waiting for reservations to expire"
        );
        tokio::time::sleep(RESERVATION_TTL + EXPIRY_SLACK).await;
        report.reservations_after_expiry = Some(engine.snapshot().await.reservations.len());
    }

    report.elapsed = started_at.elapsed();
    Ok(report)
}

async fn run_round(
    engine: &EngineHandle,
    target: BookId,
    hold_target: BookId,
    members: &[MemberId],
    callers: usize,
    offset: usize,
) -> anyhow::Result<Tally> {
    let borrow_gate = Arc::new(Barrier::new(callers));
    let settle_gate = Arc::new(Barrier::new(callers));
    let mut tasks = JoinSet::new();

    for caller in 0..callers {
        let member_id = members[(caller + offset) % members.len()];
        let engine = engine.clone();
        let borrow_gate = borrow_gate.clone();
        let settle_gate = settle_gate.clone();

        tasks.spawn(async move {
            let mut tally = Tally::default();
            borrow_gate.wait().await;
            let borrowed = engine.borrow_book(target, member_id).await;
            tally.record_borrow(&borrowed);

            settle_gate.wait().await;
            tally.record_reserve(&engine.reserve_book(hold_target, member_id).await);
            if borrowed.is_ok() {
                tally.record_return(&engine.return_book(target, member_id).await);
            }
            tally
        });
    }

    let mut tally = Tally::default();
    while let Some(res) = tasks.join_next().await {
        tally.merge(&res.context("drill caller task")?);
    }
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use circ_engine::start_engine;

    #[test]
    fn tally_classifies_outcomes() {
        let mut tally = Tally::default();
        tally.record_borrow(&Ok(()));
        tally.record_borrow(&Err(CirculationError::AlreadyBorrowed(1)));
        tally.record_borrow(&Err(CirculationError::MemberNotFound(9)));
        tally.record_reserve(&Err(CirculationError::AlreadyReserved(2)));
        tally.record_return(&Err(CirculationError::NotBorrowed {
            book_id: 1,
            member_id: 9,
        }));

        assert_eq!(
            tally,
            Tally {
                borrowed: 1,
                borrow_conflicts: 1,
                returned: 0,
                reserved: 0,
                reserve_conflicts: 1,
                unexpected: 2,
            }
        );
    }

    #[tokio::test]
    async fn drill_rounds_have_one_winner_each() {
        let seed = generated_seed(3, 4);
        let engine = start_engine(engine_config(&seed, CirculationPolicy::Strict));
        let drill = Drill {
            callers: 8,
            rounds: 6,
            wait_expiry: false,
        };

        let report = run_drill(&engine, &drill, &StopSignal::new())
            .await
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.rounds, 6);
        assert_eq!(report.tally.borrowed, 6);
        assert_eq!(report.tally.returned, 6);
        assert_eq!(report.tally.borrow_conflicts, 6 * 7);
        assert_eq!(report.tally.reserved + report.tally.reserve_conflicts, 6 * 8);
        assert_eq!(engine.list_available_books().await.len(), 3);
    }
}
