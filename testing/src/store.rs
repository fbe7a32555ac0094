//! In-memory [`CompetitionStore`] with one-shot fault injection.
//!
//! Units of work clone the shared state on begin and write it back on
//! commit, so rollback semantics match a real transaction: nothing leaks
//! until `commit` succeeds. A tokio mutex serializes units of work, which
//! gives tests strict ordering without a database.

use chrono::{DateTime, NaiveDate, Utc};
use kickwall_core::error::{EngineError, Result};
use kickwall_core::store::{CompetitionStore, UnitOfWork};
use kickwall_core::types::{
    Competition, CompetitionId, CompetitionStatus, KickEvent, Participant, ParticipantId,
    ParticipantScore, PlayerId, RaffleRecord, ScoreTotals, TeamId, TeamScore, Ticket,
    TicketNumber, TicketStatus,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// Store operations where a one-shot failure can be injected.
///
/// Arm a point with [`InMemoryStore::inject_failure`]; the next call hitting
/// it returns the injected error and disarms the point. Used to prove that
/// a failure mid-unit-of-work rolls everything back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// Fail the next `begin`.
    Begin,
    /// Fail the next `commit`.
    Commit,
    /// Fail the next counter increment.
    AllocateTicketNumber,
    /// Fail the next quota debit.
    DebitQuota,
    /// Fail the next quota credit.
    CreditQuota,
    /// Fail the next ticket insert.
    InsertTicket,
    /// Fail the next ticket transition.
    TransitionTicket,
    /// Fail the next kick-event append.
    AppendKickEvent,
    /// Fail the next team-score upsert.
    BumpTeamScore,
    /// Fail the next participant-score upsert.
    BumpParticipantScore,
    /// Fail the next raffle-record insert.
    InsertRaffleRecord,
}

#[derive(Debug, Clone, Default)]
struct MemState {
    last_issued: i64,
    competitions: HashMap<CompetitionId, Competition>,
    participants: HashMap<ParticipantId, Participant>,
    tickets: BTreeMap<TicketNumber, Ticket>,
    kick_events: Vec<KickEvent>,
    team_scores: BTreeMap<(CompetitionId, TeamId), ScoreTotals>,
    participant_scores: BTreeMap<(CompetitionId, ParticipantId), ScoreTotals>,
    raffles: BTreeMap<NaiveDate, RaffleRecord>,
}

type FaultMap = Arc<Mutex<HashMap<FaultPoint, EngineError>>>;

/// In-memory competition store for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<tokio::sync::Mutex<MemState>>,
    faults: FaultMap,
}

impl InMemoryStore {
    /// Create an empty store with the ticket counter at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose next allocated ticket number is `last_issued + 1`.
    #[must_use]
    pub fn with_last_issued(last_issued: i64) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.try_lock() {
            state.last_issued = last_issued;
        }
        store
    }

    /// Arm a one-shot failure at `point`. The next operation hitting the
    /// point returns `error` and disarms it.
    pub fn inject_failure(&self, point: FaultPoint, error: EngineError) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point, error);
    }

    fn trip(faults: &FaultMap, point: FaultPoint) -> Result<()> {
        let armed = faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&point);
        match armed {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    // ── committed-state inspection ──

    /// Committed participant row, if present.
    pub async fn participant_snapshot(&self, id: ParticipantId) -> Option<Participant> {
        self.state.lock().await.participants.get(&id).cloned()
    }

    /// Committed ticket row, if present.
    pub async fn ticket_snapshot(&self, number: TicketNumber) -> Option<Ticket> {
        self.state.lock().await.tickets.get(&number).cloned()
    }

    /// Number of committed kick events.
    pub async fn kick_event_count(&self) -> usize {
        self.state.lock().await.kick_events.len()
    }

    /// Committed team totals, if present.
    pub async fn team_score_snapshot(
        &self,
        competition: CompetitionId,
        team: TeamId,
    ) -> Option<ScoreTotals> {
        self.state
            .lock()
            .await
            .team_scores
            .get(&(competition, team))
            .copied()
    }

    /// Committed participant totals, if present.
    pub async fn participant_score_snapshot(
        &self,
        competition: CompetitionId,
        participant: ParticipantId,
    ) -> Option<ScoreTotals> {
        self.state
            .lock()
            .await
            .participant_scores
            .get(&(competition, participant))
            .copied()
    }

    /// Committed raffle record for a date, if present.
    pub async fn raffle_snapshot(&self, date: NaiveDate) -> Option<RaffleRecord> {
        self.state.lock().await.raffles.get(&date).cloned()
    }
}

impl CompetitionStore for InMemoryStore {
    type Uow = InMemoryUow;

    async fn begin(&self) -> Result<InMemoryUow> {
        Self::trip(&self.faults, FaultPoint::Begin)?;
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryUow {
            guard,
            working,
            faults: Arc::clone(&self.faults),
        })
    }
}

/// Unit of work over a cloned copy of the store state.
#[derive(Debug)]
pub struct InMemoryUow {
    guard: tokio::sync::OwnedMutexGuard<MemState>,
    working: MemState,
    faults: FaultMap,
}

impl InMemoryUow {
    fn trip(&self, point: FaultPoint) -> Result<()> {
        InMemoryStore::trip(&self.faults, point)
    }

    fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.working.participants.get_mut(&id)
    }
}

impl UnitOfWork for InMemoryUow {
    async fn commit(self) -> Result<()> {
        self.trip(FaultPoint::Commit)?;
        let Self {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        drop(self);
        Ok(())
    }

    async fn allocate_ticket_number(&mut self) -> Result<TicketNumber> {
        self.trip(FaultPoint::AllocateTicketNumber)?;
        self.working.last_issued += 1;
        Ok(TicketNumber(self.working.last_issued))
    }

    async fn last_issued_ticket_number(&mut self) -> Result<TicketNumber> {
        Ok(TicketNumber(self.working.last_issued))
    }

    async fn set_last_issued_ticket_number(&mut self, last_issued: TicketNumber) -> Result<()> {
        self.working.last_issued = last_issued.value();
        Ok(())
    }

    async fn max_ticket_number(&mut self) -> Result<Option<TicketNumber>> {
        Ok(self.working.tickets.keys().max().copied())
    }

    async fn insert_competition(&mut self, competition: &Competition) -> Result<()> {
        if self
            .working
            .competitions
            .insert(competition.id, competition.clone())
            .is_some()
        {
            return Err(EngineError::storage(format!(
                "duplicate competition {}",
                competition.id
            )));
        }
        Ok(())
    }

    async fn competition(&mut self, id: CompetitionId) -> Result<Option<Competition>> {
        Ok(self.working.competitions.get(&id).cloned())
    }

    async fn set_competition_status(
        &mut self,
        id: CompetitionId,
        from: CompetitionStatus,
        to: CompetitionStatus,
    ) -> Result<bool> {
        match self.working.competitions.get_mut(&id) {
            Some(competition) if competition.status == from => {
                competition.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_participant(&mut self, participant: &Participant) -> Result<()> {
        let duplicate = self.working.participants.values().any(|p| {
            p.competition_id == participant.competition_id && p.player_id == participant.player_id
        });
        if duplicate {
            return Err(EngineError::validation(
                "player already joined this competition",
            ));
        }
        self.working
            .participants
            .insert(participant.id, participant.clone());
        Ok(())
    }

    async fn participant(&mut self, id: ParticipantId) -> Result<Option<Participant>> {
        Ok(self.working.participants.get(&id).cloned())
    }

    async fn participant_for_update(&mut self, id: ParticipantId) -> Result<Option<Participant>> {
        // The big mutex already serializes units of work; locking is a no-op.
        Ok(self.working.participants.get(&id).cloned())
    }

    async fn participant_by_player(
        &mut self,
        competition: CompetitionId,
        player: PlayerId,
    ) -> Result<Option<Participant>> {
        Ok(self
            .working
            .participants
            .values()
            .find(|p| p.competition_id == competition && p.player_id == player)
            .cloned())
    }

    async fn participants_in_competition(
        &mut self,
        competition: CompetitionId,
    ) -> Result<Vec<Participant>> {
        let mut participants: Vec<Participant> = self
            .working
            .participants
            .values()
            .filter(|p| p.competition_id == competition)
            .cloned()
            .collect();
        participants.sort_by_key(|p| p.id);
        Ok(participants)
    }

    async fn debit_quota(&mut self, id: ParticipantId, kicks: u32) -> Result<bool> {
        self.trip(FaultPoint::DebitQuota)?;
        match self.participant_mut(id) {
            Some(p) if p.kicks_remaining >= kicks => {
                p.kicks_remaining -= kicks;
                p.total_kicks_used += kicks;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn credit_quota(&mut self, id: ParticipantId, kicks: u32) -> Result<bool> {
        self.trip(FaultPoint::CreditQuota)?;
        match self.participant_mut(id) {
            Some(p) if p.total_kicks_used >= kicks => {
                p.total_kicks_used -= kicks;
                p.kicks_remaining += kicks;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        self.trip(FaultPoint::InsertTicket)?;
        if self
            .working
            .tickets
            .insert(ticket.number, ticket.clone())
            .is_some()
        {
            return Err(EngineError::storage(format!(
                "duplicate ticket {}",
                ticket.number
            )));
        }
        Ok(())
    }

    async fn ticket(&mut self, number: TicketNumber) -> Result<Option<Ticket>> {
        Ok(self.working.tickets.get(&number).cloned())
    }

    async fn min_in_queue_ticket(&mut self) -> Result<Option<TicketNumber>> {
        Ok(self
            .working
            .tickets
            .values()
            .find(|t| t.status == TicketStatus::InQueue)
            .map(|t| t.number))
    }

    async fn in_queue_tickets(&mut self) -> Result<Vec<Ticket>> {
        Ok(self
            .working
            .tickets
            .values()
            .filter(|t| t.status == TicketStatus::InQueue)
            .cloned()
            .collect())
    }

    async fn transition_ticket(
        &mut self,
        number: TicketNumber,
        to: TicketStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.trip(FaultPoint::TransitionTicket)?;
        if to == TicketStatus::InQueue {
            return Ok(false);
        }
        match self.working.tickets.get_mut(&number) {
            Some(ticket) if ticket.status == TicketStatus::InQueue => {
                ticket.status = to;
                match to {
                    TicketStatus::Played => ticket.played_at = Some(at),
                    TicketStatus::Expired => ticket.expired_at = Some(at),
                    TicketStatus::InQueue | TicketStatus::Skipped => {}
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_kick_event(&mut self, event: &KickEvent) -> Result<()> {
        self.trip(FaultPoint::AppendKickEvent)?;
        self.working.kick_events.push(event.clone());
        Ok(())
    }

    async fn kick_events_for_competition(
        &mut self,
        competition: CompetitionId,
    ) -> Result<Vec<KickEvent>> {
        Ok(self
            .working
            .kick_events
            .iter()
            .filter(|e| e.competition_id == competition)
            .cloned()
            .collect())
    }

    async fn bump_team_score(
        &mut self,
        competition: CompetitionId,
        team: TeamId,
        goals: u32,
        kicks: u32,
    ) -> Result<()> {
        self.trip(FaultPoint::BumpTeamScore)?;
        self.working
            .team_scores
            .entry((competition, team))
            .or_insert(ScoreTotals::ZERO)
            .add(goals, kicks);
        Ok(())
    }

    async fn bump_participant_score(
        &mut self,
        competition: CompetitionId,
        participant: ParticipantId,
        goals: u32,
        kicks: u32,
    ) -> Result<()> {
        self.trip(FaultPoint::BumpParticipantScore)?;
        self.working
            .participant_scores
            .entry((competition, participant))
            .or_insert(ScoreTotals::ZERO)
            .add(goals, kicks);
        Ok(())
    }

    async fn team_scores(&mut self, competition: CompetitionId) -> Result<Vec<TeamScore>> {
        Ok(self
            .working
            .team_scores
            .iter()
            .filter(|((c, _), _)| *c == competition)
            .map(|((c, team), totals)| TeamScore {
                competition_id: *c,
                team_id: *team,
                totals: *totals,
            })
            .collect())
    }

    async fn participant_scores(
        &mut self,
        competition: CompetitionId,
    ) -> Result<Vec<ParticipantScore>> {
        Ok(self
            .working
            .participant_scores
            .iter()
            .filter(|((c, _), _)| *c == competition)
            .map(|((c, participant), totals)| ParticipantScore {
                competition_id: *c,
                participant_id: *participant,
                totals: *totals,
            })
            .collect())
    }

    async fn replace_team_scores(
        &mut self,
        competition: CompetitionId,
        scores: &[TeamScore],
    ) -> Result<()> {
        self.working
            .team_scores
            .retain(|(c, _), _| *c != competition);
        for score in scores {
            self.working
                .team_scores
                .insert((score.competition_id, score.team_id), score.totals);
        }
        Ok(())
    }

    async fn replace_participant_scores(
        &mut self,
        competition: CompetitionId,
        scores: &[ParticipantScore],
    ) -> Result<()> {
        self.working
            .participant_scores
            .retain(|(c, _), _| *c != competition);
        for score in scores {
            self.working
                .participant_scores
                .insert((score.competition_id, score.participant_id), score.totals);
        }
        Ok(())
    }

    async fn raffle_record(&mut self, date: NaiveDate) -> Result<Option<RaffleRecord>> {
        Ok(self.working.raffles.get(&date).cloned())
    }

    async fn insert_raffle_record(&mut self, record: &RaffleRecord) -> Result<bool> {
        self.trip(FaultPoint::InsertRaffleRecord)?;
        if self.working.raffles.contains_key(&record.date) {
            return Ok(false);
        }
        self.working.raffles.insert(record.date, record.clone());
        Ok(true)
    }

    async fn played_official_tickets_in(
        &mut self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Ticket>> {
        Ok(self
            .working
            .tickets
            .values()
            .filter(|t| {
                t.status == TicketStatus::Played
                    && t.official
                    && t.created_at >= from
                    && t.created_at < until
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    fn sample_participant() -> Participant {
        Participant {
            id: ParticipantId::new(),
            competition_id: CompetitionId::new(),
            player_id: PlayerId::new(),
            team_id: None,
            kicks_remaining: 5,
            total_kicks_used: 0,
            is_active: true,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn uncommitted_work_is_invisible() {
        block_on(async {
            let store = InMemoryStore::new();
            let participant = sample_participant();

            let mut uow = store.begin().await.unwrap();
            uow.insert_participant(&participant).await.unwrap();
            uow.rollback().await.unwrap();

            assert_eq!(store.participant_snapshot(participant.id).await, None);
        });
    }

    #[test]
    fn commit_publishes_the_working_state() {
        block_on(async {
            let store = InMemoryStore::new();
            let participant = sample_participant();

            let mut uow = store.begin().await.unwrap();
            uow.insert_participant(&participant).await.unwrap();
            uow.commit().await.unwrap();

            assert_eq!(
                store.participant_snapshot(participant.id).await,
                Some(participant)
            );
        });
    }

    #[test]
    fn allocation_is_sequential_from_seed() {
        block_on(async {
            let store = InMemoryStore::with_last_issued(1000);
            let mut uow = store.begin().await.unwrap();
            assert_eq!(
                uow.allocate_ticket_number().await.unwrap(),
                TicketNumber(1001)
            );
            assert_eq!(
                uow.allocate_ticket_number().await.unwrap(),
                TicketNumber(1002)
            );
        });
    }

    #[test]
    fn debit_refuses_overdraw() {
        block_on(async {
            let store = InMemoryStore::new();
            let participant = sample_participant();

            let mut uow = store.begin().await.unwrap();
            uow.insert_participant(&participant).await.unwrap();
            assert!(uow.debit_quota(participant.id, 5).await.unwrap());
            assert!(!uow.debit_quota(participant.id, 1).await.unwrap());
            let after = uow.participant(participant.id).await.unwrap().unwrap();
            assert_eq!(after.kicks_remaining, 0);
            assert_eq!(after.total_kicks_used, 5);
        });
    }

    #[test]
    fn injected_fault_fires_exactly_once() {
        block_on(async {
            let store = InMemoryStore::new();
            store.inject_failure(
                FaultPoint::AllocateTicketNumber,
                EngineError::conflict("injected"),
            );

            let mut uow = store.begin().await.unwrap();
            assert_eq!(
                uow.allocate_ticket_number().await,
                Err(EngineError::conflict("injected"))
            );
            assert!(uow.allocate_ticket_number().await.is_ok());
        });
    }

    #[test]
    fn duplicate_membership_is_rejected() {
        block_on(async {
            let store = InMemoryStore::new();
            let first = sample_participant();
            let mut second = sample_participant();
            second.competition_id = first.competition_id;
            second.player_id = first.player_id;

            let mut uow = store.begin().await.unwrap();
            uow.insert_participant(&first).await.unwrap();
            let err = uow.insert_participant(&second).await.unwrap_err();
            assert!(matches!(err, EngineError::Validation { .. }));
        });
    }
}
