//! Competition lifecycle, membership, and the kick-quota ledger.
//!
//! Recording kicks is the one place where ledger, event log, score cache, and
//! ticket state all move together: a single unit of work appends the kick
//! event, settles the quota, bumps the cached totals, and (for queued turns)
//! marks the ticket played. Either all of it commits or none of it does.

use crate::retry::{RetryPolicy, retry_transient};
use kickwall_core::environment::{Clock, Notification, Notifier};
use kickwall_core::error::{EngineError, Result};
use kickwall_core::store::{CompetitionStore, UnitOfWork};
use kickwall_core::types::{
    Competition, CompetitionId, CompetitionKind, CompetitionStatus, KickEvent, KickEventId,
    Participant, ParticipantId, PlayerId, StaffId, TeamId, TicketNumber, TicketStatus,
};
use std::sync::Arc;

/// One staff-entered kick result.
#[derive(Debug, Clone)]
pub struct KickSubmission {
    /// Participant whose quota the kicks draw on.
    pub participant_id: ParticipantId,
    /// Kicks actually taken, at least 1.
    pub kicks_used: u32,
    /// Goals scored, at most `kicks_used`.
    pub goals: u32,
    /// Staff member entering the result.
    pub staff_id: StaffId,
    /// Queue ticket being played, when the turn came through the queue.
    pub ticket: Option<TicketNumber>,
    /// Free-form station or pitch label.
    pub location: Option<String>,
}

/// What a successful submission produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KickOutcome {
    /// Identifier of the appended kick event.
    pub event_id: KickEventId,
    /// Competition the kicks were recorded under.
    pub competition_id: CompetitionId,
    /// Ticket consumed by the submission, if any.
    pub ticket: Option<TicketNumber>,
    /// Quota left after settling the submission.
    pub kicks_remaining: u32,
    /// True when the submission used up the participant's last kick.
    pub finished: bool,
}

/// Owns competitions, participants, and their kick quotas.
pub struct KickQuotaLedger<S, N> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    notifier: Arc<N>,
    retry: RetryPolicy,
}

impl<S, N> KickQuotaLedger<S, N>
where
    S: CompetitionStore,
    N: Notifier,
{
    /// Build a ledger over `store`.
    pub const fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        notifier: Arc<N>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            retry,
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Competition lifecycle
    // ═══════════════════════════════════════════════════════════

    /// Create a competition in `Pending` state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when `kicks_per_participant` is 0.
    pub async fn create_competition(
        &self,
        kind: CompetitionKind,
        kicks_per_participant: u32,
    ) -> Result<Competition> {
        if kicks_per_participant == 0 {
            return Err(EngineError::validation(
                "competitions need at least one kick per participant",
            ));
        }
        let competition = Competition {
            id: CompetitionId::new(),
            kind,
            kicks_per_participant,
            status: CompetitionStatus::Pending,
            created_at: self.clock.now(),
        };
        let mut uow = self.store.begin().await?;
        uow.insert_competition(&competition).await?;
        uow.commit().await?;
        tracing::info!(competition = %competition.id, kind = %kind, "Competition created");
        Ok(competition)
    }

    /// Open a pending competition for play.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::State`] when the competition is not pending.
    pub async fn activate_competition(&self, id: CompetitionId) -> Result<()> {
        self.shift_status(id, CompetitionStatus::Pending, CompetitionStatus::Active)
            .await
    }

    /// Close an active competition. No further joins, tickets, or recordings.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::State`] when the competition is not active.
    pub async fn complete_competition(&self, id: CompetitionId) -> Result<()> {
        self.shift_status(id, CompetitionStatus::Active, CompetitionStatus::Completed)
            .await
    }

    async fn shift_status(
        &self,
        id: CompetitionId,
        from: CompetitionStatus,
        to: CompetitionStatus,
    ) -> Result<()> {
        let mut uow = self.store.begin().await?;
        uow.competition(id)
            .await?
            .ok_or_else(|| EngineError::not_found("competition", id))?;
        if !uow.set_competition_status(id, from, to).await? {
            return Err(EngineError::state(format!("competition is not {from}")));
        }
        uow.commit().await?;
        tracing::info!(competition = %id, status = %to, "Competition status changed");
        Ok(())
    }

    /// Fetch a competition.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown id.
    pub async fn competition(&self, id: CompetitionId) -> Result<Competition> {
        let mut uow = self.store.begin().await?;
        let competition = uow
            .competition(id)
            .await?
            .ok_or_else(|| EngineError::not_found("competition", id))?;
        uow.rollback().await?;
        Ok(competition)
    }

    // ═══════════════════════════════════════════════════════════
    // Membership
    // ═══════════════════════════════════════════════════════════

    /// Join `player_id` into a competition, granting the full kick allotment.
    ///
    /// Team competitions require `team_id`; solo competitions refuse one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when the team argument does not
    /// match the competition kind or the player already joined, and
    /// [`EngineError::State`] when the competition is completed.
    #[tracing::instrument(
        skip(self, competition_id, player_id, team_id),
        name = "competition_join",
        fields(competition = %competition_id, player = %player_id)
    )]
    pub async fn join(
        &self,
        competition_id: CompetitionId,
        player_id: PlayerId,
        team_id: Option<TeamId>,
    ) -> Result<Participant> {
        let participant =
            retry_transient(&self.retry, || self.try_join(competition_id, player_id, team_id))
                .await?;
        metrics::counter!("participants.joined").increment(1);
        tracing::info!(
            participant = %participant.id,
            competition = %competition_id,
            quota = participant.kicks_remaining,
            "Participant joined"
        );
        Ok(participant)
    }

    async fn try_join(
        &self,
        competition_id: CompetitionId,
        player_id: PlayerId,
        team_id: Option<TeamId>,
    ) -> Result<Participant> {
        let mut uow = self.store.begin().await?;
        let competition = uow
            .competition(competition_id)
            .await?
            .ok_or_else(|| EngineError::not_found("competition", competition_id))?;
        if competition.status == CompetitionStatus::Completed {
            return Err(EngineError::state("competition is completed"));
        }
        match (competition.kind, team_id) {
            (CompetitionKind::Team, None) => {
                return Err(EngineError::validation("team competitions require a team"));
            }
            (CompetitionKind::Solo, Some(_)) => {
                return Err(EngineError::validation("solo competitions do not take a team"));
            }
            _ => {}
        }
        if uow
            .participant_by_player(competition_id, player_id)
            .await?
            .is_some()
        {
            return Err(EngineError::validation("player already joined this competition"));
        }

        let participant = Participant {
            id: ParticipantId::new(),
            competition_id,
            player_id,
            team_id,
            kicks_remaining: competition.kicks_per_participant,
            total_kicks_used: 0,
            is_active: true,
            joined_at: self.clock.now(),
        };
        uow.insert_participant(&participant).await?;
        uow.commit().await?;
        Ok(participant)
    }

    // ═══════════════════════════════════════════════════════════
    // Kick recording
    // ═══════════════════════════════════════════════════════════

    /// Record a kick result, settling quota, event log, score cache, and
    /// ticket state together.
    ///
    /// With a ticket, the kicks are drawn from the ticket's reservation and
    /// any unused remainder returns to the participant. Without one, the
    /// kicks are debited from the participant's live quota.
    ///
    /// When the submission exhausts the quota, a
    /// [`Notification::ParticipantFinished`] is sent after commit; delivery
    /// failure does not fail the recording.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for malformed submissions,
    /// [`EngineError::QuotaExceeded`] when the kicks outrun the quota or the
    /// ticket's reservation, and [`EngineError::State`] when the ticket left
    /// the queue or the competition is not active.
    #[tracing::instrument(
        skip(self, submission),
        name = "record_kicks",
        fields(participant = %submission.participant_id)
    )]
    pub async fn record_kicks(&self, submission: KickSubmission) -> Result<KickOutcome> {
        if submission.kicks_used == 0 {
            return Err(EngineError::validation("kicks_used must be at least 1"));
        }
        if submission.goals > submission.kicks_used {
            return Err(EngineError::validation("goals cannot exceed kicks used"));
        }

        let submission = &submission;
        let outcome = retry_transient(&self.retry, || self.try_record(submission)).await?;
        metrics::counter!("kicks.recorded").increment(u64::from(submission.kicks_used));
        tracing::info!(
            participant = %submission.participant_id,
            kicks = submission.kicks_used,
            goals = submission.goals,
            ticket = submission.ticket.map(TicketNumber::value),
            "Kicks recorded"
        );

        if outcome.finished {
            let notification = Notification::ParticipantFinished {
                competition: outcome.competition_id,
                participant: submission.participant_id,
            };
            if let Err(error) = self.notifier.notify(notification).await {
                tracing::warn!(error = %error, "Finished notification failed");
            }
        }
        Ok(outcome)
    }

    async fn try_record(&self, submission: &KickSubmission) -> Result<KickOutcome> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let participant = uow
            .participant_for_update(submission.participant_id)
            .await?
            .ok_or_else(|| EngineError::not_found("participant", submission.participant_id))?;
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

        match submission.ticket {
            Some(number) => {
                let ticket = uow
                    .ticket(number)
                    .await?
                    .ok_or_else(|| EngineError::not_found("ticket", number))?;
                if ticket.participant_id != participant.id {
                    return Err(EngineError::validation(format!(
                        "ticket {number} belongs to another participant"
                    )));
                }
                if ticket.status != TicketStatus::InQueue {
                    return Err(EngineError::state(format!(
                        "ticket {number} is {}, not in-queue",
                        ticket.status
                    )));
                }
                if submission.kicks_used > ticket.reserved_kicks {
                    return Err(EngineError::QuotaExceeded {
                        requested: submission.kicks_used,
                        remaining: ticket.reserved_kicks,
                    });
                }
                if !uow
                    .transition_ticket(number, TicketStatus::Played, now)
                    .await?
                {
                    return Err(EngineError::conflict(format!(
                        "ticket {number} changed state concurrently"
                    )));
                }
                let unused = ticket.reserved_kicks - submission.kicks_used;
                if unused > 0 && !uow.credit_quota(participant.id, unused).await? {
                    return Err(EngineError::storage("refund exceeds recorded kick usage"));
                }
            }
            None => {
                if submission.kicks_used > participant.kicks_remaining {
                    return Err(EngineError::QuotaExceeded {
                        requested: submission.kicks_used,
                        remaining: participant.kicks_remaining,
                    });
                }
                if !uow.debit_quota(participant.id, submission.kicks_used).await? {
                    return Err(EngineError::conflict("quota changed while recording kicks"));
                }
            }
        }

        let event = KickEvent {
            id: KickEventId::new(),
            participant_id: participant.id,
            competition_id: participant.competition_id,
            ticket_number: submission.ticket,
            goals: submission.goals,
            kicks_used: submission.kicks_used,
            staff_id: submission.staff_id,
            location: submission.location.clone(),
            recorded_at: now,
        };
        uow.append_kick_event(&event).await?;

        match competition.kind {
            CompetitionKind::Team => {
                let team = participant.team_id.ok_or_else(|| {
                    EngineError::state("participant has no team in a team competition")
                })?;
                uow.bump_team_score(competition.id, team, submission.goals, submission.kicks_used)
                    .await?;
            }
            CompetitionKind::Solo => {
                uow.bump_participant_score(
                    competition.id,
                    participant.id,
                    submission.goals,
                    submission.kicks_used,
                )
                .await?;
            }
        }

        let settled = uow
            .participant(participant.id)
            .await?
            .ok_or_else(|| EngineError::not_found("participant", participant.id))?;
        uow.commit().await?;

        Ok(KickOutcome {
            event_id: event.id,
            competition_id: competition.id,
            ticket: submission.ticket,
            kicks_remaining: settled.kicks_remaining,
            finished: settled.kicks_remaining == 0,
        })
    }

    // ═══════════════════════════════════════════════════════════
    // Quota queries
    // ═══════════════════════════════════════════════════════════

    /// Kicks the participant can still spend or reserve.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown participant.
    pub async fn remaining_kicks(&self, participant_id: ParticipantId) -> Result<u32> {
        let mut uow = self.store.begin().await?;
        let participant = uow
            .participant(participant_id)
            .await?
            .ok_or_else(|| EngineError::not_found("participant", participant_id))?;
        uow.rollback().await?;
        Ok(participant.kicks_remaining)
    }

    /// Whether the participant's quota is spent for good.
    ///
    /// A participant waiting in the queue has zero `kicks_remaining` too
    /// (their kicks are reserved on the ticket), so this also checks that no
    /// ticket of theirs is still waiting.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown participant.
    pub async fn is_finished(&self, participant_id: ParticipantId) -> Result<bool> {
        let mut uow = self.store.begin().await?;
        let participant = uow
            .participant(participant_id)
            .await?
            .ok_or_else(|| EngineError::not_found("participant", participant_id))?;
        let mut finished = participant.kicks_remaining == 0;
        if finished {
            let waiting = uow.in_queue_tickets().await?;
            finished = !waiting.iter().any(|t| t.participant_id == participant_id);
        }
        uow.rollback().await?;
        Ok(finished)
    }
}
