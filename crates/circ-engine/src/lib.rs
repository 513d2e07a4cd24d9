#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! In-process circulation engine (borrow, return, reserve, reservation expiry).

/// Public API for the engine crate.
pub mod api;

mod engine;
mod expiry;
mod ledger;

pub use api::{
    CirculationEvent, CirculationPolicy, EngineConfig, EngineHandle, LibrarySnapshot,
    RESERVATION_TTL, Reservation, start_engine,
};
pub use circ_core::{Book, BookId, BookStatus, CirculationError, Member, MemberId, Result};
