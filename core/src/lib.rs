//! # Kickwall Core
//!
//! Domain types, error taxonomy, and the persistence/environment seams for
//! the kicking-wall competition engine.
//!
//! The engine itself lives in `kickwall-engine`; this crate holds everything
//! it shares with storage backends and test infrastructure:
//!
//! - [`types`]: identifiers, status enums, and the persisted entities
//!   (tickets, participants, kick events, score caches, raffle records)
//! - [`error`]: the [`EngineError`] taxonomy and retryability rules
//! - [`store`]: the [`CompetitionStore`](store::CompetitionStore) /
//!   [`UnitOfWork`](store::UnitOfWork) transaction seam
//! - [`environment`]: clock and notification seams
//!
//! No I/O happens here.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod environment;
pub mod error;
pub mod store;
pub mod types;

pub use error::{EngineError, Result};
