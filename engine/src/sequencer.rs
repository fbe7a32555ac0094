//! Monotonic ticket number allocation.

use crate::retry::{RetryPolicy, retry_transient};
use kickwall_core::error::{EngineError, Result};
use kickwall_core::store::{CompetitionStore, UnitOfWork};
use kickwall_core::types::TicketNumber;
use std::sync::Arc;

/// Hands out strictly increasing ticket numbers.
///
/// Numbers come from a single persistent counter incremented inside its own
/// unit of work, so two concurrent allocations can never observe the same
/// value. Gaps are possible when a later step of the caller's flow fails;
/// numbers are never reused.
pub struct TicketSequencer<S> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S: CompetitionStore> TicketSequencer<S> {
    /// Build a sequencer over `store`.
    pub const fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Allocate the next ticket number.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the counter cannot be read or
    /// written, or [`EngineError::ConcurrencyConflict`] once retries are
    /// exhausted.
    #[tracing::instrument(skip(self), name = "ticket_allocate")]
    pub async fn allocate(&self) -> Result<TicketNumber> {
        let number = retry_transient(&self.retry, || async move {
            let mut uow = self.store.begin().await?;
            let number = uow.allocate_ticket_number().await?;
            uow.commit().await?;
            Ok(number)
        })
        .await?;
        metrics::counter!("tickets.allocated").increment(1);
        tracing::debug!(ticket = number.value(), "Allocated ticket number");
        Ok(number)
    }

    /// The most recently issued number, without allocating.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the counter cannot be read.
    pub async fn peek(&self) -> Result<TicketNumber> {
        let mut uow = self.store.begin().await?;
        let last = uow.last_issued_ticket_number().await?;
        uow.rollback().await?;
        Ok(last)
    }

    /// Move the counter so the next allocated number is `next`.
    ///
    /// Refused when any existing ticket already carries a number at or above
    /// `next`, since re-issuing a live number would corrupt the queue.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when `next` is below 1 or collides
    /// with an issued ticket.
    pub async fn reset_to(&self, next: TicketNumber) -> Result<()> {
        if next.value() < 1 {
            return Err(EngineError::validation("ticket numbers start at 1"));
        }
        let mut uow = self.store.begin().await?;
        if let Some(max) = uow.max_ticket_number().await? {
            if max.value() >= next.value() {
                return Err(EngineError::validation(format!(
                    "cannot reset counter to {next}: ticket {max} already issued"
                )));
            }
        }
        uow.set_last_issued_ticket_number(TicketNumber(next.value() - 1))
            .await?;
        uow.commit().await?;
        tracing::info!(next = next.value(), "Ticket counter reset");
        Ok(())
    }

    /// [`Self::reset_to`] without the issued-ticket guard, for recovery after
    /// manual data surgery.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when `next` is below 1.
    pub async fn force_reset_to(&self, next: TicketNumber) -> Result<()> {
        if next.value() < 1 {
            return Err(EngineError::validation("ticket numbers start at 1"));
        }
        let mut uow = self.store.begin().await?;
        uow.set_last_issued_ticket_number(TicketNumber(next.value() - 1))
            .await?;
        uow.commit().await?;
        tracing::warn!(next = next.value(), "Ticket counter force-reset");
        Ok(())
    }
}
