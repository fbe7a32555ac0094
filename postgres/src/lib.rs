//! # Kickwall Postgres
//!
//! `PostgreSQL` persistence for the kicking-wall competition engine.
//!
//! [`PostgresStore`] implements the
//! [`CompetitionStore`](kickwall_core::store::CompetitionStore) seam on top
//! of `sqlx`: one unit of work per database transaction, conditional updates
//! expressed as guarded SQL statements, and row-lock contention surfaced as
//! retryable conflicts. Schema changes ship as sequential migrations under
//! `migrations/` and are applied with [`PostgresStore::migrate`].

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod config;
pub mod store;

pub use config::PostgresConfig;
pub use store::{PostgresStore, PostgresUow};
