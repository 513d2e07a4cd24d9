#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Data model and leaf stores for the circulation engine.

/// Books, members and their identifiers.
pub mod book;
/// Catalog store (book identity to circulation status).
pub mod catalog;
/// Error taxonomy shared by the stores and the engine.
pub mod error;
/// Membership store (member identity to borrowed books).
pub mod membership;
/// JSON seed file used to pre-populate an engine.
pub mod seed;

pub use book::{Book, BookId, BookStatus, Member, MemberId};
pub use catalog::Catalog;
pub use error::{CirculationError, Result};
pub use membership::Membership;
pub use seed::SeedFile;
