//! Persistence seam for the competition engine.
//!
//! Every engine mutation flows through a [`UnitOfWork`] opened from a
//! [`CompetitionStore`], so multi-entity updates (ticket + ledger + score)
//! commit or roll back together. The trait exposes the *atomic primitives*
//! the engine's correctness rests on (fetch-and-increment for the ticket
//! counter and conditional updates gated on current state) rather than
//! generic row access, so a backend cannot accidentally implement them as
//! read-then-write.
//!
//! Dropping a unit of work without committing rolls it back.

use crate::error::Result;
use crate::types::{
    Competition, CompetitionId, CompetitionStatus, KickEvent, Participant, ParticipantId,
    ParticipantScore, PlayerId, RaffleRecord, TeamId, TeamScore, Ticket, TicketNumber,
    TicketStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::future::Future;

/// Transactional store handing out units of work.
pub trait CompetitionStore: Send + Sync {
    /// The unit-of-work type this store produces.
    type Uow: UnitOfWork;

    /// Open a new unit of work.
    fn begin(&self) -> impl Future<Output = Result<Self::Uow>> + Send;
}

/// One transaction's worth of store operations.
///
/// Mutating operations that return `bool` are **conditional**: they apply
/// only when the row is still in the expected state, and report whether they
/// did. The engine turns an unexpected `false` into a retry or an error; the
/// store never silently upgrades it to success.
pub trait UnitOfWork: Send + Sized {
    /// Commit everything done in this unit of work.
    fn commit(self) -> impl Future<Output = Result<()>> + Send;

    /// Discard everything done in this unit of work.
    fn rollback(self) -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Ticket counter
    // ═══════════════════════════════════════════════════════════

    /// Atomically increment the ticket counter and return the new value.
    ///
    /// This is a single fetch-and-increment against the counter row; two
    /// concurrent units of work never observe the same number.
    fn allocate_ticket_number(&mut self) -> impl Future<Output = Result<TicketNumber>> + Send;

    /// The most recently issued ticket number (the seed value if none has
    /// been issued yet).
    fn last_issued_ticket_number(&mut self) -> impl Future<Output = Result<TicketNumber>> + Send;

    /// Overwrite the counter so that `last_issued` is the most recently
    /// issued number. Guarding against outstanding tickets is the caller's
    /// job.
    fn set_last_issued_ticket_number(
        &mut self,
        last_issued: TicketNumber,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Highest ticket number ever inserted, if any ticket exists.
    fn max_ticket_number(&mut self) -> impl Future<Output = Result<Option<TicketNumber>>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Competitions & participants
    // ═══════════════════════════════════════════════════════════

    /// Insert a new competition instance.
    fn insert_competition(
        &mut self,
        competition: &Competition,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch a competition by id.
    fn competition(
        &mut self,
        id: CompetitionId,
    ) -> impl Future<Output = Result<Option<Competition>>> + Send;

    /// Move a competition from `from` to `to`. Conditional on the row still
    /// being in `from`.
    fn set_competition_status(
        &mut self,
        id: CompetitionId,
        from: CompetitionStatus,
        to: CompetitionStatus,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Insert a new participant membership.
    ///
    /// Backends enforce one membership per `(competition, player)` pair and
    /// surface a duplicate as a validation error.
    fn insert_participant(
        &mut self,
        participant: &Participant,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch a participant by id.
    fn participant(
        &mut self,
        id: ParticipantId,
    ) -> impl Future<Output = Result<Option<Participant>>> + Send;

    /// Fetch a participant by id, locking the row for the remainder of this
    /// unit of work.
    ///
    /// Engine convention: the participant lock is always taken before any
    /// ticket or quota mutation touching that participant, which keeps lock
    /// acquisition ordered across concurrent terminals.
    fn participant_for_update(
        &mut self,
        id: ParticipantId,
    ) -> impl Future<Output = Result<Option<Participant>>> + Send;

    /// Fetch a player's membership in a competition, if joined.
    fn participant_by_player(
        &mut self,
        competition: CompetitionId,
        player: PlayerId,
    ) -> impl Future<Output = Result<Option<Participant>>> + Send;

    /// All memberships in a competition.
    fn participants_in_competition(
        &mut self,
        competition: CompetitionId,
    ) -> impl Future<Output = Result<Vec<Participant>>> + Send;

    /// Move `kicks` from `kicks_remaining` to `total_kicks_used`.
    /// Conditional on `kicks_remaining >= kicks`.
    fn debit_quota(
        &mut self,
        id: ParticipantId,
        kicks: u32,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Move `kicks` from `total_kicks_used` back to `kicks_remaining`.
    /// Conditional on `total_kicks_used >= kicks`.
    fn credit_quota(
        &mut self,
        id: ParticipantId,
        kicks: u32,
    ) -> impl Future<Output = Result<bool>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Tickets
    // ═══════════════════════════════════════════════════════════

    /// Insert a freshly issued ticket.
    fn insert_ticket(&mut self, ticket: &Ticket) -> impl Future<Output = Result<()>> + Send;

    /// Fetch a ticket by number.
    fn ticket(
        &mut self,
        number: TicketNumber,
    ) -> impl Future<Output = Result<Option<Ticket>>> + Send;

    /// The minimum in-queue ticket number, the "now serving" position.
    fn min_in_queue_ticket(&mut self)
    -> impl Future<Output = Result<Option<TicketNumber>>> + Send;

    /// All in-queue tickets, ordered by ticket number ascending.
    fn in_queue_tickets(&mut self) -> impl Future<Output = Result<Vec<Ticket>>> + Send;

    /// Move a ticket out of the queue into `to`, stamping `played_at` or
    /// `expired_at` as appropriate. Conditional on the ticket still being
    /// in-queue; `to` must be a terminal status.
    fn transition_ticket(
        &mut self,
        number: TicketNumber,
        to: TicketStatus,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Kick events
    // ═══════════════════════════════════════════════════════════

    /// Append an immutable kick event.
    fn append_kick_event(&mut self, event: &KickEvent)
    -> impl Future<Output = Result<()>> + Send;

    /// Every kick event recorded under a competition, in recording order.
    fn kick_events_for_competition(
        &mut self,
        competition: CompetitionId,
    ) -> impl Future<Output = Result<Vec<KickEvent>>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Score caches
    // ═══════════════════════════════════════════════════════════

    /// Fold `goals`/`kicks` into the team's cached totals, creating the row
    /// if absent and recomputing accuracy.
    fn bump_team_score(
        &mut self,
        competition: CompetitionId,
        team: TeamId,
        goals: u32,
        kicks: u32,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fold `goals`/`kicks` into the participant's cached totals, creating
    /// the row if absent and recomputing accuracy.
    fn bump_participant_score(
        &mut self,
        competition: CompetitionId,
        participant: ParticipantId,
        goals: u32,
        kicks: u32,
    ) -> impl Future<Output = Result<()>> + Send;

    /// All cached team totals for a competition, unordered.
    fn team_scores(
        &mut self,
        competition: CompetitionId,
    ) -> impl Future<Output = Result<Vec<TeamScore>>> + Send;

    /// All cached participant totals for a competition, unordered.
    fn participant_scores(
        &mut self,
        competition: CompetitionId,
    ) -> impl Future<Output = Result<Vec<ParticipantScore>>> + Send;

    /// Replace a competition's cached team totals wholesale (rebuild path).
    fn replace_team_scores(
        &mut self,
        competition: CompetitionId,
        scores: &[TeamScore],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Replace a competition's cached participant totals wholesale
    /// (rebuild path).
    fn replace_participant_scores(
        &mut self,
        competition: CompetitionId,
        scores: &[ParticipantScore],
    ) -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Raffle
    // ═══════════════════════════════════════════════════════════

    /// The raffle record for a date, if one has been drawn.
    fn raffle_record(
        &mut self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<RaffleRecord>>> + Send;

    /// Insert a raffle record if none exists for its date yet. Returns
    /// whether the insert happened; `false` means the date was already
    /// drawn, including by a concurrent unit of work.
    fn insert_raffle_record(
        &mut self,
        record: &RaffleRecord,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Played official tickets created in `[from, until)`, ordered by
    /// ticket number ascending. This is the raffle's eligible set.
    fn played_official_tickets_in(
        &mut self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Ticket>>> + Send;
}
