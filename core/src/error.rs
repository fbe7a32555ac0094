//! Error taxonomy for the competition engine.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// All the ways an engine operation can fail.
///
/// Caller mistakes come first, then domain guards, then coordination and
/// infrastructure failures. Only [`EngineError::ConcurrencyConflict`] is safe
/// to retry; everything else aborts and rolls back the unit of work.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    // ═══════════════════════════════════════════════════════════
    // Input & State
    // ═══════════════════════════════════════════════════════════
    /// Malformed or out-of-range input.
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// Operation attempted on a ticket, participant, or competition that is
    /// not in an operable state.
    #[error("invalid state: {message}")]
    State {
        /// Which state rule was broken.
        message: String,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"participant"`.
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Quota
    // ═══════════════════════════════════════════════════════════
    /// Recording or reserving would exceed the participant's remaining quota.
    #[error("kick quota exceeded: requested {requested}, remaining {remaining}")]
    QuotaExceeded {
        /// Kicks the caller asked for.
        requested: u32,
        /// Kicks actually available.
        remaining: u32,
    },

    // ═══════════════════════════════════════════════════════════
    // Raffle
    // ═══════════════════════════════════════════════════════════
    /// A winner has already been drawn for this date.
    #[error("raffle already drawn for {date}")]
    AlreadyDrawn {
        /// The date whose record already exists.
        date: NaiveDate,
    },

    /// No played official tickets fell inside the date's window.
    #[error("no eligible tickets for raffle on {date}")]
    NoEligibleTickets {
        /// The date with an empty eligible set.
        date: NaiveDate,
    },

    // ═══════════════════════════════════════════════════════════
    // Coordination & Infrastructure
    // ═══════════════════════════════════════════════════════════
    /// Transaction serialization failure, deadlock, or lock timeout.
    /// Retried automatically a bounded number of times.
    #[error("concurrency conflict: {message}")]
    ConcurrencyConflict {
        /// What the store reported.
        message: String,
    },

    /// Underlying storage failure.
    #[error("storage error: {message}")]
    Storage {
        /// What the store reported.
        message: String,
    },

    /// Best-effort notification delivery failed. Never rolls back the
    /// transaction it followed.
    #[error("notification delivery failed: {message}")]
    Notification {
        /// What the notifier reported.
        message: String,
    },
}

impl EngineError {
    /// Build a [`EngineError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build a [`EngineError::State`].
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Build a [`EngineError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Build a [`EngineError::ConcurrencyConflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::ConcurrencyConflict {
            message: message.into(),
        }
    }

    /// Build a [`EngineError::Storage`].
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the whole unit of work may succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kickwall_core::EngineError;
    /// assert!(EngineError::conflict("deadlock detected").is_retryable());
    /// assert!(!EngineError::validation("goals exceed kicks").is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Returns `true` if the failure is the caller's fault rather than the
    /// system's.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kickwall_core::EngineError;
    /// assert!(EngineError::validation("kicks_used must be at least 1").is_user_error());
    /// assert!(!EngineError::storage("connection reset").is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::State { .. }
                | Self::NotFound { .. }
                | Self::QuotaExceeded { .. }
                | Self::AlreadyDrawn { .. }
                | Self::NoEligibleTickets { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(EngineError::conflict("serialization failure").is_retryable());
        assert!(!EngineError::storage("disk full").is_retryable());
        assert!(
            !EngineError::QuotaExceeded {
                requested: 6,
                remaining: 5
            }
            .is_retryable()
        );
    }

    #[test]
    fn user_errors_exclude_infrastructure() {
        assert!(
            EngineError::AlreadyDrawn {
                date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
            }
            .is_user_error()
        );
        assert!(!EngineError::conflict("deadlock").is_user_error());
        assert!(!EngineError::storage("timeout").is_user_error());
    }

    #[test]
    fn display_includes_context() {
        let err = EngineError::not_found("participant", "3f0c");
        assert_eq!(err.to_string(), "participant not found: 3f0c");

        let err = EngineError::QuotaExceeded {
            requested: 6,
            remaining: 2,
        };
        assert_eq!(
            err.to_string(),
            "kick quota exceeded: requested 6, remaining 2"
        );
    }
}
