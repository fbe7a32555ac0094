//! Behavioral tests for the engine over the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code fails loudly

use chrono::{DateTime, NaiveDate, Utc};
use kickwall_core::EngineError;
use kickwall_core::environment::{Clock, Notification, Notifier};
use kickwall_core::store::{CompetitionStore, UnitOfWork};
use kickwall_core::types::{
    Competition, CompetitionKind, ParticipantId, PlayerId, StaffId, TeamId, TicketNumber,
    TicketStatus,
};
use kickwall_engine::{Engine, EngineConfig, KickSubmission, RetryPolicy, TicketSequencer};
use kickwall_testing::{
    FailingNotifier, FaultPoint, FixedClock, InMemoryStore, RecordingNotifier, test_clock,
};
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> EngineConfig {
    EngineConfig::new().with_retry(
        RetryPolicy::builder()
            .max_retries(3)
            .initial_delay(Duration::from_millis(1))
            .build(),
    )
}

fn recording_engine(
    store: &Arc<InMemoryStore>,
) -> (Engine<InMemoryStore, RecordingNotifier>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Engine::new(
        Arc::clone(store),
        Arc::new(test_clock()),
        Arc::clone(&notifier),
        fast_config(),
    );
    (engine, notifier)
}

async fn active_competition<N: Notifier>(
    engine: &Engine<InMemoryStore, N>,
    kind: CompetitionKind,
    kicks: u32,
) -> Competition {
    let competition = engine
        .ledger()
        .create_competition(kind, kicks)
        .await
        .unwrap();
    engine
        .ledger()
        .activate_competition(competition.id)
        .await
        .unwrap();
    competition
}

fn submission(
    participant: ParticipantId,
    kicks: u32,
    goals: u32,
    ticket: Option<TicketNumber>,
) -> KickSubmission {
    KickSubmission {
        participant_id: participant,
        kicks_used: kicks,
        goals,
        staff_id: StaffId::new(),
        ticket,
        location: None,
    }
}

fn raffle_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
}

// ═══════════════════════════════════════════════════════════
// The whole flow
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn three_participants_walk_the_queue() {
    let store = Arc::new(InMemoryStore::with_last_issued(1000));
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;

    let p1 = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let p2 = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let p3 = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();

    let t1 = engine.queue().enqueue(p1.id, true).await.unwrap();
    let t2 = engine.queue().enqueue(p2.id, true).await.unwrap();
    let t3 = engine.queue().enqueue(p3.id, true).await.unwrap();
    assert_eq!(t1.number, TicketNumber(1001));
    assert_eq!(t2.number, TicketNumber(1002));
    assert_eq!(t3.number, TicketNumber(1003));
    assert_eq!(
        engine.queue().current_position().await.unwrap(),
        Some(TicketNumber(1001))
    );
    assert_eq!(engine.queue().list_in_queue().await.unwrap().len(), 3);

    let outcome = engine
        .ledger()
        .record_kicks(submission(p1.id, 5, 3, Some(t1.number)))
        .await
        .unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.kicks_remaining, 0);

    assert_eq!(
        engine.queue().current_position().await.unwrap(),
        Some(TicketNumber(1002))
    );
    assert!(engine.ledger().is_finished(p1.id).await.unwrap());
    assert_eq!(engine.ledger().remaining_kicks(p1.id).await.unwrap(), 0);

    // Only 1001 has been played, so the day's draw can pick nothing else.
    let record = engine
        .raffle()
        .draw_seeded(raffle_date(), StaffId::new(), 42)
        .await
        .unwrap();
    assert_eq!(record.winning_ticket, TicketNumber(1001));
    assert_eq!(record.winning_participant, p1.id);
    assert_eq!(record.first_ticket, TicketNumber(1001));
    assert_eq!(record.last_ticket, TicketNumber(1001));
}

// ═══════════════════════════════════════════════════════════
// Sequencer
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn concurrent_allocations_stay_unique_and_gapless() {
    let store = Arc::new(InMemoryStore::new());
    let sequencer = Arc::new(TicketSequencer::new(
        Arc::clone(&store),
        RetryPolicy::default(),
    ));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let sequencer = Arc::clone(&sequencer);
        handles.push(tokio::spawn(async move {
            sequencer.allocate().await.unwrap()
        }));
    }
    let mut numbers: Vec<i64> = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap().value());
    }
    numbers.sort_unstable();
    let expected: Vec<i64> = (1..=16).collect();
    assert_eq!(numbers, expected);
}

#[tokio::test]
async fn counter_reset_refuses_to_shadow_issued_tickets() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;

    engine
        .sequencer()
        .reset_to(TicketNumber(1001))
        .await
        .unwrap();
    assert_eq!(engine.sequencer().peek().await.unwrap(), TicketNumber(1000));

    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let ticket = engine.queue().enqueue(p.id, true).await.unwrap();
    assert_eq!(ticket.number, TicketNumber(1001));

    let err = engine
        .sequencer()
        .reset_to(TicketNumber(500))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    let err = engine
        .sequencer()
        .reset_to(TicketNumber(1001))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    assert!(matches!(
        engine.sequencer().reset_to(TicketNumber(0)).await,
        Err(EngineError::Validation { .. })
    ));

    // Resetting above every issued number is fine, and force skips the guard.
    engine
        .sequencer()
        .reset_to(TicketNumber(1002))
        .await
        .unwrap();
    engine
        .sequencer()
        .force_reset_to(TicketNumber(500))
        .await
        .unwrap();
    assert_eq!(engine.sequencer().peek().await.unwrap(), TicketNumber(499));
}

// ═══════════════════════════════════════════════════════════
// Queue and reservations
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn enqueue_reserves_the_full_remaining_quota() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();

    let ticket = engine.queue().enqueue(p.id, true).await.unwrap();
    assert_eq!(ticket.reserved_kicks, 5);

    let snapshot = store.participant_snapshot(p.id).await.unwrap();
    assert_eq!(snapshot.kicks_remaining, 0);
    assert_eq!(snapshot.total_kicks_used, 5);

    // The reservation blocks a second ticket until the first is settled.
    let err = engine.queue().enqueue(p.id, true).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::QuotaExceeded {
            requested: 1,
            remaining: 0
        }
    );
}

#[tokio::test]
async fn playing_a_ticket_credits_back_unused_kicks() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let ticket = engine.queue().enqueue(p.id, true).await.unwrap();

    let outcome = engine
        .ledger()
        .record_kicks(submission(p.id, 3, 2, Some(ticket.number)))
        .await
        .unwrap();
    assert_eq!(outcome.kicks_remaining, 2);
    assert!(!outcome.finished);

    let snapshot = store.participant_snapshot(p.id).await.unwrap();
    assert_eq!(snapshot.kicks_remaining, 2);
    assert_eq!(snapshot.total_kicks_used, 3);

    let played = store.ticket_snapshot(ticket.number).await.unwrap();
    assert_eq!(played.status, TicketStatus::Played);
    assert!(played.played_at.is_some());
}

#[tokio::test]
async fn expiring_refunds_and_skipping_forfeits() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;

    let refunded = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let expired = engine.queue().enqueue(refunded.id, true).await.unwrap();
    engine
        .queue()
        .transition(expired.number, TicketStatus::Expired)
        .await
        .unwrap();
    let snapshot = store.participant_snapshot(refunded.id).await.unwrap();
    assert_eq!(snapshot.kicks_remaining, 5);
    assert_eq!(snapshot.total_kicks_used, 0);
    let settled = store.ticket_snapshot(expired.number).await.unwrap();
    assert_eq!(settled.status, TicketStatus::Expired);
    assert!(settled.expired_at.is_some());

    let forfeited = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let skipped = engine.queue().enqueue(forfeited.id, true).await.unwrap();
    engine
        .queue()
        .transition(skipped.number, TicketStatus::Skipped)
        .await
        .unwrap();
    let snapshot = store.participant_snapshot(forfeited.id).await.unwrap();
    assert_eq!(snapshot.kicks_remaining, 0);
    assert_eq!(snapshot.total_kicks_used, 5);
    assert!(engine.ledger().is_finished(forfeited.id).await.unwrap());

    // An expired ticket cannot be played or transitioned again.
    let err = engine
        .ledger()
        .record_kicks(submission(refunded.id, 2, 1, Some(expired.number)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::State { .. }));
    let err = engine
        .queue()
        .transition(expired.number, TicketStatus::Skipped)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::State { .. }));
}

#[tokio::test]
async fn transition_targets_are_restricted() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let ticket = engine.queue().enqueue(p.id, true).await.unwrap();

    let err = engine
        .queue()
        .transition(ticket.number, TicketStatus::Played)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    let err = engine
        .queue()
        .transition(ticket.number, TicketStatus::InQueue)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    let err = engine
        .queue()
        .transition(TicketNumber(9999), TicketStatus::Expired)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn sweep_expires_everything_and_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p1 = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let p2 = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    engine.queue().enqueue(p1.id, true).await.unwrap();
    engine.queue().enqueue(p2.id, false).await.unwrap();

    let report = engine.queue().expire_all_in_queue().await.unwrap();
    assert_eq!(report.expired, 2);
    assert_eq!(report.kicks_refunded, 10);
    assert_eq!(engine.queue().current_position().await.unwrap(), None);
    for participant in [p1.id, p2.id] {
        let snapshot = store.participant_snapshot(participant).await.unwrap();
        assert_eq!(snapshot.kicks_remaining, 5);
        assert_eq!(snapshot.total_kicks_used, 0);
    }

    // Second sweep finds nothing to expire and refunds nothing.
    let report = engine.queue().expire_all_in_queue().await.unwrap();
    assert_eq!(report.expired, 0);
    assert_eq!(report.kicks_refunded, 0);
}

// ═══════════════════════════════════════════════════════════
// Quota accounting
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn direct_submission_debits_at_record_time() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();

    let outcome = engine
        .ledger()
        .record_kicks(submission(p.id, 2, 2, None))
        .await
        .unwrap();
    assert_eq!(outcome.kicks_remaining, 3);
    assert_eq!(outcome.ticket, None);

    let err = engine
        .ledger()
        .record_kicks(submission(p.id, 4, 0, None))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::QuotaExceeded {
            requested: 4,
            remaining: 3
        }
    );
}

#[tokio::test]
async fn ticket_submission_cannot_outrun_the_reservation() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let ticket = engine.queue().enqueue(p.id, true).await.unwrap();

    let err = engine
        .ledger()
        .record_kicks(submission(p.id, 6, 6, Some(ticket.number)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::QuotaExceeded {
            requested: 6,
            remaining: 5
        }
    );

    // Nothing moved: the ticket still waits with its reservation intact.
    let snapshot = store.ticket_snapshot(ticket.number).await.unwrap();
    assert_eq!(snapshot.status, TicketStatus::InQueue);
    assert_eq!(store.kick_event_count().await, 0);
}

#[tokio::test]
async fn malformed_submissions_are_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();

    let err = engine
        .ledger()
        .record_kicks(submission(p.id, 0, 0, None))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));

    let err = engine
        .ledger()
        .record_kicks(submission(p.id, 3, 4, None))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));

    let err = engine
        .ledger()
        .record_kicks(submission(ParticipantId::new(), 1, 0, None))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn a_ticket_only_pays_for_its_own_participant() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let owner = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let intruder = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let ticket = engine.queue().enqueue(owner.id, true).await.unwrap();

    let err = engine
        .ledger()
        .record_kicks(submission(intruder.id, 2, 1, Some(ticket.number)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    assert_eq!(
        store
            .ticket_snapshot(ticket.number)
            .await
            .unwrap()
            .status,
        TicketStatus::InQueue
    );
}

#[tokio::test]
async fn failed_submission_leaves_no_partial_state() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let ticket = engine.queue().enqueue(p.id, true).await.unwrap();

    store.inject_failure(
        FaultPoint::BumpParticipantScore,
        EngineError::storage("disk full"),
    );
    let err = engine
        .ledger()
        .record_kicks(submission(p.id, 3, 2, Some(ticket.number)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::storage("disk full"));

    // Ledger, event log, ticket: all exactly as before the attempt.
    assert_eq!(store.kick_event_count().await, 0);
    let snapshot = store.ticket_snapshot(ticket.number).await.unwrap();
    assert_eq!(snapshot.status, TicketStatus::InQueue);
    let participant = store.participant_snapshot(p.id).await.unwrap();
    assert_eq!(participant.kicks_remaining, 0);
    assert_eq!(participant.total_kicks_used, 5);
    assert_eq!(
        store
            .participant_score_snapshot(competition.id, p.id)
            .await,
        None
    );
}

#[tokio::test]
async fn transient_conflict_is_retried_to_success() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();

    store.inject_failure(
        FaultPoint::AllocateTicketNumber,
        EngineError::conflict("serialization failure"),
    );
    let ticket = engine.queue().enqueue(p.id, true).await.unwrap();
    assert_eq!(ticket.number, TicketNumber(1));

    let snapshot = store.participant_snapshot(p.id).await.unwrap();
    assert_eq!(snapshot.kicks_remaining, 0);
    assert_eq!(snapshot.total_kicks_used, 5);
}

#[tokio::test]
async fn deactivated_participants_are_shut_out() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;

    let participant = kickwall_core::types::Participant {
        id: ParticipantId::new(),
        competition_id: competition.id,
        player_id: PlayerId::new(),
        team_id: None,
        kicks_remaining: 5,
        total_kicks_used: 0,
        is_active: false,
        joined_at: test_clock().now(),
    };
    let mut uow = store.begin().await.unwrap();
    uow.insert_participant(&participant).await.unwrap();
    uow.commit().await.unwrap();

    let err = engine.queue().enqueue(participant.id, true).await.unwrap_err();
    assert!(matches!(err, EngineError::State { .. }));
    let err = engine
        .ledger()
        .record_kicks(submission(participant.id, 1, 0, None))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::State { .. }));
}

// ═══════════════════════════════════════════════════════════
// Competition lifecycle and membership
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn lifecycle_moves_one_way() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);

    let err = engine
        .ledger()
        .create_competition(CompetitionKind::Solo, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));

    let competition = engine
        .ledger()
        .create_competition(CompetitionKind::Solo, 5)
        .await
        .unwrap();
    let err = engine
        .ledger()
        .complete_competition(competition.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::State { .. }));

    engine
        .ledger()
        .activate_competition(competition.id)
        .await
        .unwrap();
    let err = engine
        .ledger()
        .activate_competition(competition.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::State { .. }));

    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    engine
        .ledger()
        .complete_competition(competition.id)
        .await
        .unwrap();

    // Completed: no joins, no tickets, no recordings.
    let err = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::State { .. }));
    let err = engine.queue().enqueue(p.id, true).await.unwrap_err();
    assert!(matches!(err, EngineError::State { .. }));
    let err = engine
        .ledger()
        .record_kicks(submission(p.id, 1, 0, None))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::State { .. }));
}

#[tokio::test]
async fn membership_rules_hold() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let solo = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let team = active_competition(&engine, CompetitionKind::Team, 5).await;

    let player = PlayerId::new();
    engine.ledger().join(solo.id, player, None).await.unwrap();
    let err = engine.ledger().join(solo.id, player, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));

    // The same player can still join a different competition.
    engine
        .ledger()
        .join(team.id, player, Some(TeamId::new()))
        .await
        .unwrap();

    let err = engine
        .ledger()
        .join(team.id, PlayerId::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    let err = engine
        .ledger()
        .join(solo.id, PlayerId::new(), Some(TeamId::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));

    let err = engine
        .ledger()
        .competition(kickwall_core::types::CompetitionId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

// ═══════════════════════════════════════════════════════════
// Scores
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn participant_leaderboard_orders_goals_desc_then_kicks_asc() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 10).await;

    let a = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let b = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let c = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();

    engine
        .ledger()
        .record_kicks(submission(a.id, 5, 4, None))
        .await
        .unwrap();
    engine
        .ledger()
        .record_kicks(submission(b.id, 4, 4, None))
        .await
        .unwrap();
    engine
        .ledger()
        .record_kicks(submission(c.id, 3, 2, None))
        .await
        .unwrap();

    let board = engine
        .scores()
        .participant_leaderboard(competition.id)
        .await
        .unwrap();
    let order: Vec<ParticipantId> = board.iter().map(|s| s.participant_id).collect();
    assert_eq!(order, vec![b.id, a.id, c.id]);
    assert_eq!(board[0].totals.accuracy, 100.0);
    assert_eq!(board[1].totals.accuracy, 80.0);
    assert_eq!(board[2].totals.accuracy, 66.67);
}

#[tokio::test]
async fn team_totals_accumulate_across_members() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Team, 5).await;

    let reds = TeamId::new();
    let blues = TeamId::new();
    let r1 = engine
        .ledger()
        .join(competition.id, PlayerId::new(), Some(reds))
        .await
        .unwrap();
    let r2 = engine
        .ledger()
        .join(competition.id, PlayerId::new(), Some(reds))
        .await
        .unwrap();
    let b1 = engine
        .ledger()
        .join(competition.id, PlayerId::new(), Some(blues))
        .await
        .unwrap();

    engine
        .ledger()
        .record_kicks(submission(r1.id, 3, 2, None))
        .await
        .unwrap();
    engine
        .ledger()
        .record_kicks(submission(r2.id, 2, 1, None))
        .await
        .unwrap();
    engine
        .ledger()
        .record_kicks(submission(b1.id, 4, 3, None))
        .await
        .unwrap();

    let board = engine.scores().team_leaderboard(competition.id).await.unwrap();
    assert_eq!(board.len(), 2);
    // Reds and blues both have 3 goals; blues needed fewer kicks.
    assert_eq!(board[0].team_id, blues);
    assert_eq!(board[0].totals.total_goals, 3);
    assert_eq!(board[0].totals.total_kicks, 4);
    assert_eq!(board[1].team_id, reds);
    assert_eq!(board[1].totals.total_goals, 3);
    assert_eq!(board[1].totals.total_kicks, 5);
}

#[tokio::test]
async fn rebuild_repairs_a_drifted_cache() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 10).await;
    let a = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let b = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();

    engine
        .ledger()
        .record_kicks(submission(a.id, 5, 3, None))
        .await
        .unwrap();
    engine
        .ledger()
        .record_kicks(submission(b.id, 4, 2, None))
        .await
        .unwrap();
    let truthful = engine
        .scores()
        .participant_leaderboard(competition.id)
        .await
        .unwrap();

    // Drift the cache behind the log's back.
    let mut uow = store.begin().await.unwrap();
    uow.bump_participant_score(competition.id, b.id, 10, 10)
        .await
        .unwrap();
    uow.commit().await.unwrap();
    let drifted = engine
        .scores()
        .participant_leaderboard(competition.id)
        .await
        .unwrap();
    assert_ne!(drifted, truthful);

    let report = engine.scores().rebuild(competition.id).await.unwrap();
    assert_eq!(report.events_folded, 2);
    assert_eq!(report.rows_written, 2);
    let rebuilt = engine
        .scores()
        .participant_leaderboard(competition.id)
        .await
        .unwrap();
    assert_eq!(rebuilt, truthful);
}

// ═══════════════════════════════════════════════════════════
// Raffle
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn each_date_is_drawn_at_most_once() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    for _ in 0..2 {
        let p = engine
            .ledger()
            .join(competition.id, PlayerId::new(), None)
            .await
            .unwrap();
        let t = engine.queue().enqueue(p.id, true).await.unwrap();
        engine
            .ledger()
            .record_kicks(submission(p.id, 5, 3, Some(t.number)))
            .await
            .unwrap();
    }

    let first = engine
        .raffle()
        .draw_seeded(raffle_date(), StaffId::new(), 7)
        .await
        .unwrap();
    let err = engine
        .raffle()
        .draw_seeded(raffle_date(), StaffId::new(), 8)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::AlreadyDrawn { date: raffle_date() });
    assert_eq!(
        engine.raffle().status(raffle_date()).await.unwrap(),
        Some(first)
    );
}

#[tokio::test]
async fn only_played_official_tickets_enter_the_draw() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;

    let official = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let casual = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let waiting = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();

    let t1 = engine.queue().enqueue(official.id, true).await.unwrap();
    let t2 = engine.queue().enqueue(casual.id, false).await.unwrap();
    engine.queue().enqueue(waiting.id, true).await.unwrap();
    engine
        .ledger()
        .record_kicks(submission(official.id, 5, 3, Some(t1.number)))
        .await
        .unwrap();
    engine
        .ledger()
        .record_kicks(submission(casual.id, 5, 3, Some(t2.number)))
        .await
        .unwrap();

    let record = engine
        .raffle()
        .draw_seeded(raffle_date(), StaffId::new(), 3)
        .await
        .unwrap();
    assert_eq!(record.winning_ticket, t1.number);
    assert_eq!(record.first_ticket, t1.number);
    assert_eq!(record.last_ticket, t1.number);
}

#[tokio::test]
async fn empty_days_have_no_winner() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, _) = recording_engine(&store);

    let err = engine
        .raffle()
        .draw_seeded(raffle_date(), StaffId::new(), 5)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NoEligibleTickets { date: raffle_date() });
    assert_eq!(engine.raffle().status(raffle_date()).await.unwrap(), None);
}

#[tokio::test]
async fn seeded_draws_reproduce_across_runs() {
    async fn play_three(store: &Arc<InMemoryStore>) -> Engine<InMemoryStore, RecordingNotifier> {
        let (engine, _) = recording_engine(store);
        let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
        for _ in 0..3 {
            let p = engine
                .ledger()
                .join(competition.id, PlayerId::new(), None)
                .await
                .unwrap();
            let t = engine.queue().enqueue(p.id, true).await.unwrap();
            engine
                .ledger()
                .record_kicks(submission(p.id, 5, 2, Some(t.number)))
                .await
                .unwrap();
        }
        engine
    }

    let first_store = Arc::new(InMemoryStore::new());
    let second_store = Arc::new(InMemoryStore::new());
    let first = play_three(&first_store).await;
    let second = play_three(&second_store).await;

    let a = first
        .raffle()
        .draw_seeded(raffle_date(), StaffId::new(), 1234)
        .await
        .unwrap();
    let b = second
        .raffle()
        .draw_seeded(raffle_date(), StaffId::new(), 1234)
        .await
        .unwrap();
    assert_eq!(a.winning_ticket, b.winning_ticket);
}

#[tokio::test]
async fn raffle_days_follow_the_venue_clock() {
    // Venue at UTC+2. 22:30 UTC on June 30th is already July 1st locally.
    let store = Arc::new(InMemoryStore::new());
    let clock = FixedClock::new(
        DateTime::parse_from_rfc3339("2024-06-30T22:30:00Z")
            .unwrap()
            .with_timezone(&Utc),
    );
    let engine: Engine<InMemoryStore, RecordingNotifier> = Engine::new(
        Arc::clone(&store),
        Arc::new(clock),
        Arc::new(RecordingNotifier::new()),
        fast_config().with_raffle_utc_offset_minutes(120),
    );

    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let t = engine.queue().enqueue(p.id, true).await.unwrap();
    engine
        .ledger()
        .record_kicks(submission(p.id, 5, 4, Some(t.number)))
        .await
        .unwrap();

    let june_30 = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let err = engine
        .raffle()
        .draw_seeded(june_30, StaffId::new(), 1)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NoEligibleTickets { date: june_30 });

    let record = engine
        .raffle()
        .draw_seeded(raffle_date(), StaffId::new(), 1)
        .await
        .unwrap();
    assert_eq!(record.winning_ticket, t.number);
}

// ═══════════════════════════════════════════════════════════
// Notifications
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn finishing_and_winning_notify_in_order() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, notifier) = recording_engine(&store);
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let t = engine.queue().enqueue(p.id, true).await.unwrap();
    engine
        .ledger()
        .record_kicks(submission(p.id, 5, 3, Some(t.number)))
        .await
        .unwrap();
    engine
        .raffle()
        .draw_seeded(raffle_date(), StaffId::new(), 11)
        .await
        .unwrap();

    assert_eq!(
        notifier.sent(),
        vec![
            Notification::ParticipantFinished {
                competition: competition.id,
                participant: p.id,
            },
            Notification::RaffleWinner {
                date: raffle_date(),
                ticket: t.number,
                participant: p.id,
            },
        ]
    );
}

#[tokio::test]
async fn notification_failures_do_not_fail_the_operation() {
    let store = Arc::new(InMemoryStore::new());
    let engine: Engine<InMemoryStore, FailingNotifier> = Engine::new(
        Arc::clone(&store),
        Arc::new(test_clock()),
        Arc::new(FailingNotifier),
        fast_config(),
    );
    let competition = active_competition(&engine, CompetitionKind::Solo, 5).await;
    let p = engine
        .ledger()
        .join(competition.id, PlayerId::new(), None)
        .await
        .unwrap();
    let t = engine.queue().enqueue(p.id, true).await.unwrap();

    let outcome = engine
        .ledger()
        .record_kicks(submission(p.id, 5, 5, Some(t.number)))
        .await
        .unwrap();
    assert!(outcome.finished);

    let record = engine
        .raffle()
        .draw_seeded(raffle_date(), StaffId::new(), 2)
        .await
        .unwrap();
    assert_eq!(record.winning_ticket, t.number);
}
