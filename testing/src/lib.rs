//! # Kickwall Testing
//!
//! Test doubles for the kickwall engine:
//!
//! - [`InMemoryStore`]: a [`kickwall_core::store::CompetitionStore`] backed by
//!   a mutex-guarded map, with one-shot fault injection via [`FaultPoint`]
//! - [`FixedClock`]: a clock pinned to a known instant
//! - [`RecordingNotifier`] / [`FailingNotifier`]: notifier doubles

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod notifier;
pub mod store;

/// Deterministic clocks and tracing setup for tests.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use kickwall_core::environment::Clock;

    /// Clock that always returns the same instant.
    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock {
        now: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a clock pinned to `now`.
        #[must_use]
        pub const fn new(now: DateTime<Utc>) -> Self {
            Self { now }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.now
        }
    }

    /// Clock pinned to a mid-morning instant on 2024-07-01 UTC.
    #[must_use]
    #[allow(clippy::expect_used)] // Test helper with a literal timestamp
    pub fn test_clock() -> FixedClock {
        let now = DateTime::parse_from_rfc3339("2024-07-01T09:00:00Z")
            .expect("valid RFC 3339 literal")
            .with_timezone(&Utc);
        FixedClock::new(now)
    }

    /// Install a fmt subscriber honoring `RUST_LOG`. Safe to call repeatedly.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

pub use mocks::{FixedClock, init_tracing, test_clock};
pub use notifier::{FailingNotifier, RecordingNotifier};
pub use store::{FaultPoint, InMemoryStore};
