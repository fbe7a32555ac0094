//! FIFO queue tracking: enqueue, now-serving position, transitions, and the
//! end-of-day sweep.
//!
//! Enqueueing reserves the participant's whole remaining quota on the ticket
//! and debits it from their ledger, so the quota can never be double-spent
//! between the queue and direct kick recording. The reservation comes back
//! when the ticket expires and is forfeited when it is skipped.

use crate::retry::{RetryPolicy, retry_transient};
use kickwall_core::environment::Clock;
use kickwall_core::error::{EngineError, Result};
use kickwall_core::store::{CompetitionStore, UnitOfWork};
use kickwall_core::types::{
    CompetitionStatus, ParticipantId, Ticket, TicketNumber, TicketStatus,
};
use std::sync::Arc;

/// What an end-of-day sweep did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Tickets moved from in-queue to expired.
    pub expired: usize,
    /// Reserved kicks credited back to their participants.
    pub kicks_refunded: u64,
}

/// Tracks the physical queue of turns at the wall.
pub struct QueueTracker<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl<S: CompetitionStore> QueueTracker<S> {
    /// Build a tracker over `store`, timestamping with `clock`.
    pub const fn new(store: Arc<S>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            retry,
        }
    }

    /// Issue a ticket for `participant_id` and reserve their remaining kicks
    /// on it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::QuotaExceeded`] when no kicks remain (which is
    /// also the case while an earlier ticket of theirs is still in the
    /// queue), [`EngineError::State`] when the participant is deactivated or
    /// the competition is not active, and [`EngineError::NotFound`] when the
    /// participant does not exist.
    #[tracing::instrument(
        skip(self, participant_id),
        name = "queue_enqueue",
        fields(participant = %participant_id)
    )]
    pub async fn enqueue(&self, participant_id: ParticipantId, official: bool) -> Result<Ticket> {
        let ticket =
            retry_transient(&self.retry, || self.try_enqueue(participant_id, official)).await?;
        metrics::counter!("queue.enqueued").increment(1);
        tracing::info!(
            ticket = ticket.number.value(),
            participant = %participant_id,
            reserved = ticket.reserved_kicks,
            "Ticket enqueued"
        );
        Ok(ticket)
    }

    async fn try_enqueue(&self, participant_id: ParticipantId, official: bool) -> Result<Ticket> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let participant = uow
            .participant_for_update(participant_id)
            .await?
            .ok_or_else(|| EngineError::not_found("participant", participant_id))?;
        if !participant.is_active {
            return Err(EngineError::state("participant is deactivated"));
        }

        let competition = uow
            .competition(participant.competition_id)
            .await?
            .ok_or_else(|| EngineError::not_found("competition", participant.competition_id))?;
        if competition.status != CompetitionStatus::Active {
            return Err(EngineError::state(format!(
                "competition is {}",
                competition.status
            )));
        }

        let reserved = participant.kicks_remaining;
        if reserved == 0 {
            return Err(EngineError::QuotaExceeded {
                requested: 1,
                remaining: 0,
            });
        }
        if !uow.debit_quota(participant_id, reserved).await? {
            return Err(EngineError::conflict("quota changed while enqueueing"));
        }

        let number = uow.allocate_ticket_number().await?;
        let ticket = Ticket {
            number,
            participant_id,
            competition_id: participant.competition_id,
            status: TicketStatus::InQueue,
            kind: competition.kind,
            official,
            reserved_kicks: reserved,
            created_at: now,
            played_at: None,
            expired_at: None,
        };
        uow.insert_ticket(&ticket).await?;
        uow.commit().await?;
        Ok(ticket)
    }

    /// The now-serving position: the lowest in-queue ticket number, or `None`
    /// when the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the queue cannot be read.
    pub async fn current_position(&self) -> Result<Option<TicketNumber>> {
        let mut uow = self.store.begin().await?;
        let position = uow.min_in_queue_ticket().await?;
        uow.rollback().await?;
        Ok(position)
    }

    /// Every waiting ticket, in play order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the queue cannot be read.
    pub async fn list_in_queue(&self) -> Result<Vec<Ticket>> {
        let mut uow = self.store.begin().await?;
        let tickets = uow.in_queue_tickets().await?;
        uow.rollback().await?;
        Ok(tickets)
    }

    /// Move a waiting ticket to `target` and settle its reservation: expiring
    /// refunds the reserved kicks, skipping forfeits them.
    ///
    /// `Played` is not accepted here; tickets become played only by recording
    /// kicks against them.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for a target outside
    /// expired/skipped, [`EngineError::State`] when the ticket already left
    /// the queue, and [`EngineError::NotFound`] for an unknown ticket.
    #[tracing::instrument(
        skip(self, number, target),
        name = "ticket_transition",
        fields(ticket = number.value(), target = %target)
    )]
    pub async fn transition(&self, number: TicketNumber, target: TicketStatus) -> Result<Ticket> {
        let ticket = retry_transient(&self.retry, || self.try_transition(number, target)).await?;
        metrics::counter!("queue.transitions", "target" => target.as_str()).increment(1);
        tracing::info!(ticket = number.value(), target = %target, "Ticket transitioned");
        Ok(ticket)
    }

    async fn try_transition(&self, number: TicketNumber, target: TicketStatus) -> Result<Ticket> {
        match target {
            TicketStatus::InQueue => {
                return Err(EngineError::validation("tickets cannot return to the queue"));
            }
            TicketStatus::Played => {
                return Err(EngineError::validation(
                    "tickets become played by recording kicks",
                ));
            }
            TicketStatus::Expired | TicketStatus::Skipped => {}
        }

        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let ticket = uow
            .ticket(number)
            .await?
            .ok_or_else(|| EngineError::not_found("ticket", number))?;
        uow.participant_for_update(ticket.participant_id)
            .await?
            .ok_or_else(|| EngineError::not_found("participant", ticket.participant_id))?;
        if ticket.status != TicketStatus::InQueue {
            return Err(EngineError::state(format!(
                "ticket {number} is {}, not in-queue",
                ticket.status
            )));
        }

        if !uow.transition_ticket(number, target, now).await? {
            return Err(EngineError::conflict(format!(
                "ticket {number} changed state concurrently"
            )));
        }
        if target == TicketStatus::Expired
            && ticket.reserved_kicks > 0
            && !uow.credit_quota(ticket.participant_id, ticket.reserved_kicks).await?
        {
            return Err(EngineError::storage("refund exceeds recorded kick usage"));
        }

        let settled = uow
            .ticket(number)
            .await?
            .ok_or_else(|| EngineError::not_found("ticket", number))?;
        uow.commit().await?;
        Ok(settled)
    }

    /// Expire every waiting ticket and refund its reserved kicks, in one unit
    /// of work.
    ///
    /// Tickets that already left the queue are skipped, so running the sweep
    /// again refunds nothing the second time.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the sweep cannot be persisted.
    #[tracing::instrument(skip(self), name = "queue_sweep")]
    pub async fn expire_all_in_queue(&self) -> Result<SweepReport> {
        let report = retry_transient(&self.retry, || self.try_expire_all()).await?;
        metrics::counter!("queue.swept").increment(report.expired as u64);
        tracing::info!(
            expired = report.expired,
            kicks_refunded = report.kicks_refunded,
            "End-of-day sweep finished"
        );
        Ok(report)
    }

    async fn try_expire_all(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let waiting = uow.in_queue_tickets().await?;
        let mut report = SweepReport {
            expired: 0,
            kicks_refunded: 0,
        };
        for ticket in waiting {
            uow.participant_for_update(ticket.participant_id)
                .await?
                .ok_or_else(|| EngineError::not_found("participant", ticket.participant_id))?;
            if !uow
                .transition_ticket(ticket.number, TicketStatus::Expired, now)
                .await?
            {
                continue;
            }
            report.expired += 1;
            if ticket.reserved_kicks > 0 {
                if !uow
                    .credit_quota(ticket.participant_id, ticket.reserved_kicks)
                    .await?
                {
                    return Err(EngineError::storage("refund exceeds recorded kick usage"));
                }
                report.kicks_refunded += u64::from(ticket.reserved_kicks);
            }
        }

        uow.commit().await?;
        Ok(report)
    }
}
