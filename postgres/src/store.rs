//! `PostgreSQL` implementation of the competition store.
//!
//! Every unit of work maps to one database transaction. The conditional
//! operations (`debit_quota`, `transition_ticket`, `set_competition_status`,
//! `insert_raffle_record`) are single guarded statements, so their
//! check-then-act step happens inside the database rather than in Rust.
//! Serialization failures, deadlocks, and lock timeouts come back as
//! [`EngineError::ConcurrencyConflict`], which the engine retries.

use chrono::{DateTime, NaiveDate, Utc};
use kickwall_core::store::{CompetitionStore, UnitOfWork};
use kickwall_core::types::{
    Competition, CompetitionId, CompetitionKind, CompetitionStatus, KickEvent, KickEventId,
    Participant, ParticipantId, ParticipantScore, PlayerId, RaffleRecord, ScoreTotals, StaffId,
    TeamId, TeamScore, Ticket, TicketNumber, TicketStatus,
};
use kickwall_core::{EngineError, Result};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;

use crate::config::PostgresConfig;

/// `PostgreSQL`-backed competition store.
///
/// # Example
///
/// ```ignore
/// use kickwall_postgres::{PostgresConfig, PostgresStore};
///
/// let store = PostgresStore::connect(&PostgresConfig::from_env()?).await?;
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Connect to the database described by `config`.
    ///
    /// # Errors
    /// Returns [`EngineError::Storage`] if the pool cannot be established.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| EngineError::storage(format!("Failed to connect: {e}")))?;
        tracing::debug!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self {
            pool,
            lock_timeout: config.lock_timeout,
        })
    }

    /// Wrap an existing connection pool, using the default lock timeout.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: Duration::from_secs(2),
        }
    }

    /// Run database migrations.
    ///
    /// # Errors
    /// Returns [`EngineError::Storage`] if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EngineError::storage(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The underlying connection pool, for custom queries.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl CompetitionStore for PostgresStore {
    type Uow = PostgresUow;

    async fn begin(&self) -> Result<PostgresUow> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EngineError::storage(format!("Failed to start transaction: {e}")))?;
        // Bound how long this transaction waits on a contended row. Hitting
        // the limit surfaces as a retryable conflict.
        let lock_timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        sqlx::query(&lock_timeout)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        Ok(PostgresUow { tx })
    }
}

/// One open database transaction. Dropping it without committing rolls the
/// transaction back.
pub struct PostgresUow {
    tx: sqlx::Transaction<'static, sqlx::Postgres>,
}

impl UnitOfWork for PostgresUow {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(classify)
    }

    async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| EngineError::storage(format!("Failed to roll back: {e}")))
    }

    // ═══════════════════════════════════════════════════════════
    // Ticket counter
    // ═══════════════════════════════════════════════════════════

    async fn allocate_ticket_number(&mut self) -> Result<TicketNumber> {
        let row = sqlx::query(
            "UPDATE ticket_counter SET last_issued = last_issued + 1 WHERE id
             RETURNING last_issued",
        )
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(TicketNumber(get(&row, "last_issued")?))
    }

    async fn last_issued_ticket_number(&mut self) -> Result<TicketNumber> {
        let row = sqlx::query("SELECT last_issued FROM ticket_counter")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(TicketNumber(get(&row, "last_issued")?))
    }

    async fn set_last_issued_ticket_number(&mut self, last_issued: TicketNumber) -> Result<()> {
        sqlx::query("UPDATE ticket_counter SET last_issued = $1 WHERE id")
            .bind(last_issued.value())
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn max_ticket_number(&mut self) -> Result<Option<TicketNumber>> {
        let row = sqlx::query("SELECT MAX(number) AS max_number FROM tickets")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(classify)?;
        let max: Option<i64> = get(&row, "max_number")?;
        Ok(max.map(TicketNumber))
    }

    // ═══════════════════════════════════════════════════════════
    // Competitions & participants
    // ═══════════════════════════════════════════════════════════

    async fn insert_competition(&mut self, competition: &Competition) -> Result<()> {
        sqlx::query(
            "INSERT INTO competitions (id, kind, kicks_per_participant, status, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(competition.id.0)
        .bind(competition.kind.as_str())
        .bind(to_i32("kicks_per_participant", competition.kicks_per_participant)?)
        .bind(competition.status.as_str())
        .bind(competition.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn competition(&mut self, id: CompetitionId) -> Result<Option<Competition>> {
        let row = sqlx::query(
            "SELECT id, kind, kicks_per_participant, status, created_at
             FROM competitions WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;
        row.as_ref().map(map_competition).transpose()
    }

    async fn set_competition_status(
        &mut self,
        id: CompetitionId,
        from: CompetitionStatus,
        to: CompetitionStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE competitions SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id.0)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_participant(&mut self, participant: &Participant) -> Result<()> {
        sqlx::query(
            "INSERT INTO participants
                 (id, competition_id, player_id, team_id, kicks_remaining,
                  total_kicks_used, is_active, joined_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(participant.id.0)
        .bind(participant.competition_id.0)
        .bind(participant.player_id.0)
        .bind(participant.team_id.map(|team| team.0))
        .bind(to_i32("kicks_remaining", participant.kicks_remaining)?)
        .bind(to_i32("total_kicks_used", participant.total_kicks_used)?)
        .bind(participant.is_active)
        .bind(participant.joined_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn participant(&mut self, id: ParticipantId) -> Result<Option<Participant>> {
        let row = sqlx::query(
            "SELECT id, competition_id, player_id, team_id, kicks_remaining,
                    total_kicks_used, is_active, joined_at
             FROM participants WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;
        row.as_ref().map(map_participant).transpose()
    }

    async fn participant_for_update(&mut self, id: ParticipantId) -> Result<Option<Participant>> {
        let row = sqlx::query(
            "SELECT id, competition_id, player_id, team_id, kicks_remaining,
                    total_kicks_used, is_active, joined_at
             FROM participants WHERE id = $1
             FOR UPDATE",
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;
        row.as_ref().map(map_participant).transpose()
    }

    async fn participant_by_player(
        &mut self,
        competition: CompetitionId,
        player: PlayerId,
    ) -> Result<Option<Participant>> {
        let row = sqlx::query(
            "SELECT id, competition_id, player_id, team_id, kicks_remaining,
                    total_kicks_used, is_active, joined_at
             FROM participants WHERE competition_id = $1 AND player_id = $2",
        )
        .bind(competition.0)
        .bind(player.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;
        row.as_ref().map(map_participant).transpose()
    }

    async fn participants_in_competition(
        &mut self,
        competition: CompetitionId,
    ) -> Result<Vec<Participant>> {
        let rows = sqlx::query(
            "SELECT id, competition_id, player_id, team_id, kicks_remaining,
                    total_kicks_used, is_active, joined_at
             FROM participants WHERE competition_id = $1
             ORDER BY id",
        )
        .bind(competition.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(classify)?;
        rows.iter().map(map_participant).collect()
    }

    async fn debit_quota(&mut self, id: ParticipantId, kicks: u32) -> Result<bool> {
        let kicks = to_i32("kicks", kicks)?;
        let result = sqlx::query(
            "UPDATE participants
             SET kicks_remaining = kicks_remaining - $2,
                 total_kicks_used = total_kicks_used + $2
             WHERE id = $1 AND kicks_remaining >= $2",
        )
        .bind(id.0)
        .bind(kicks)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected() == 1)
    }

    async fn credit_quota(&mut self, id: ParticipantId, kicks: u32) -> Result<bool> {
        let kicks = to_i32("kicks", kicks)?;
        let result = sqlx::query(
            "UPDATE participants
             SET kicks_remaining = kicks_remaining + $2,
                 total_kicks_used = total_kicks_used - $2
             WHERE id = $1 AND total_kicks_used >= $2",
        )
        .bind(id.0)
        .bind(kicks)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected() == 1)
    }

    // ═══════════════════════════════════════════════════════════
    // Tickets
    // ═══════════════════════════════════════════════════════════

    async fn insert_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        sqlx::query(
            "INSERT INTO tickets
                 (number, participant_id, competition_id, status, kind, official,
                  reserved_kicks, created_at, played_at, expired_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(ticket.number.value())
        .bind(ticket.participant_id.0)
        .bind(ticket.competition_id.0)
        .bind(ticket.status.as_str())
        .bind(ticket.kind.as_str())
        .bind(ticket.official)
        .bind(to_i32("reserved_kicks", ticket.reserved_kicks)?)
        .bind(ticket.created_at)
        .bind(ticket.played_at)
        .bind(ticket.expired_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn ticket(&mut self, number: TicketNumber) -> Result<Option<Ticket>> {
        let row = sqlx::query(
            "SELECT number, participant_id, competition_id, status, kind, official,
                    reserved_kicks, created_at, played_at, expired_at
             FROM tickets WHERE number = $1",
        )
        .bind(number.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;
        row.as_ref().map(map_ticket).transpose()
    }

    async fn min_in_queue_ticket(&mut self) -> Result<Option<TicketNumber>> {
        let row = sqlx::query(
            "SELECT MIN(number) AS min_number FROM tickets WHERE status = 'in-queue'",
        )
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;
        let min: Option<i64> = get(&row, "min_number")?;
        Ok(min.map(TicketNumber))
    }

    async fn in_queue_tickets(&mut self) -> Result<Vec<Ticket>> {
        let rows = sqlx::query(
            "SELECT number, participant_id, competition_id, status, kind, official,
                    reserved_kicks, created_at, played_at, expired_at
             FROM tickets WHERE status = 'in-queue'
             ORDER BY number",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(classify)?;
        rows.iter().map(map_ticket).collect()
    }

    async fn transition_ticket(
        &mut self,
        number: TicketNumber,
        to: TicketStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        if to == TicketStatus::InQueue {
            return Ok(false);
        }
        let result = sqlx::query(
            "UPDATE tickets
             SET status = $2,
                 played_at = CASE WHEN $2 = 'played' THEN $3 ELSE played_at END,
                 expired_at = CASE WHEN $2 = 'expired' THEN $3 ELSE expired_at END
             WHERE number = $1 AND status = 'in-queue'",
        )
        .bind(number.value())
        .bind(to.as_str())
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected() == 1)
    }

    // ═══════════════════════════════════════════════════════════
    // Kick events
    // ═══════════════════════════════════════════════════════════

    async fn append_kick_event(&mut self, event: &KickEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO kick_events
                 (id, participant_id, competition_id, ticket_number, goals,
                  kicks_used, staff_id, location, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.id.0)
        .bind(event.participant_id.0)
        .bind(event.competition_id.0)
        .bind(event.ticket_number.map(TicketNumber::value))
        .bind(to_i32("goals", event.goals)?)
        .bind(to_i32("kicks_used", event.kicks_used)?)
        .bind(event.staff_id.0)
        .bind(event.location.as_deref())
        .bind(event.recorded_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn kick_events_for_competition(
        &mut self,
        competition: CompetitionId,
    ) -> Result<Vec<KickEvent>> {
        let rows = sqlx::query(
            "SELECT id, participant_id, competition_id, ticket_number, goals,
                    kicks_used, staff_id, location, recorded_at
             FROM kick_events WHERE competition_id = $1
             ORDER BY seq",
        )
        .bind(competition.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(classify)?;
        rows.iter().map(map_kick_event).collect()
    }

    // ═══════════════════════════════════════════════════════════
    // Score caches
    // ═══════════════════════════════════════════════════════════

    async fn bump_team_score(
        &mut self,
        competition: CompetitionId,
        team: TeamId,
        goals: u32,
        kicks: u32,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO team_scores (competition_id, team_id, total_goals, total_kicks, accuracy)
             VALUES ($1, $2, $3, $4,
                     COALESCE(ROUND($3::numeric * 100 / NULLIF($4, 0), 2)::float8, 0::float8))
             ON CONFLICT (competition_id, team_id) DO UPDATE
             SET total_goals = team_scores.total_goals + EXCLUDED.total_goals,
                 total_kicks = team_scores.total_kicks + EXCLUDED.total_kicks,
                 accuracy = COALESCE(
                     ROUND((team_scores.total_goals + EXCLUDED.total_goals)::numeric * 100
                           / NULLIF(team_scores.total_kicks + EXCLUDED.total_kicks, 0),
                           2)::float8,
                     0::float8),
                 updated_at = now()",
        )
        .bind(competition.0)
        .bind(team.0)
        .bind(to_i32("goals", goals)?)
        .bind(to_i32("kicks", kicks)?)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn bump_participant_score(
        &mut self,
        competition: CompetitionId,
        participant: ParticipantId,
        goals: u32,
        kicks: u32,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO participant_scores
                 (competition_id, participant_id, total_goals, total_kicks, accuracy)
             VALUES ($1, $2, $3, $4,
                     COALESCE(ROUND($3::numeric * 100 / NULLIF($4, 0), 2)::float8, 0::float8))
             ON CONFLICT (competition_id, participant_id) DO UPDATE
             SET total_goals = participant_scores.total_goals + EXCLUDED.total_goals,
                 total_kicks = participant_scores.total_kicks + EXCLUDED.total_kicks,
                 accuracy = COALESCE(
                     ROUND((participant_scores.total_goals + EXCLUDED.total_goals)::numeric * 100
                           / NULLIF(participant_scores.total_kicks + EXCLUDED.total_kicks, 0),
                           2)::float8,
                     0::float8),
                 updated_at = now()",
        )
        .bind(competition.0)
        .bind(participant.0)
        .bind(to_i32("goals", goals)?)
        .bind(to_i32("kicks", kicks)?)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn team_scores(&mut self, competition: CompetitionId) -> Result<Vec<TeamScore>> {
        let rows = sqlx::query(
            "SELECT competition_id, team_id, total_goals, total_kicks, accuracy
             FROM team_scores WHERE competition_id = $1
             ORDER BY team_id",
        )
        .bind(competition.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(classify)?;
        rows.iter().map(map_team_score).collect()
    }

    async fn participant_scores(
        &mut self,
        competition: CompetitionId,
    ) -> Result<Vec<ParticipantScore>> {
        let rows = sqlx::query(
            "SELECT competition_id, participant_id, total_goals, total_kicks, accuracy
             FROM participant_scores WHERE competition_id = $1
             ORDER BY participant_id",
        )
        .bind(competition.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(classify)?;
        rows.iter().map(map_participant_score).collect()
    }

    async fn replace_team_scores(
        &mut self,
        competition: CompetitionId,
        scores: &[TeamScore],
    ) -> Result<()> {
        sqlx::query("DELETE FROM team_scores WHERE competition_id = $1")
            .bind(competition.0)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        for score in scores {
            sqlx::query(
                "INSERT INTO team_scores
                     (competition_id, team_id, total_goals, total_kicks, accuracy)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(score.competition_id.0)
            .bind(score.team_id.0)
            .bind(to_i32("total_goals", score.totals.total_goals)?)
            .bind(to_i32("total_kicks", score.totals.total_kicks)?)
            .bind(score.totals.accuracy)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        }
        Ok(())
    }

    async fn replace_participant_scores(
        &mut self,
        competition: CompetitionId,
        scores: &[ParticipantScore],
    ) -> Result<()> {
        sqlx::query("DELETE FROM participant_scores WHERE competition_id = $1")
            .bind(competition.0)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        for score in scores {
            sqlx::query(
                "INSERT INTO participant_scores
                     (competition_id, participant_id, total_goals, total_kicks, accuracy)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(score.competition_id.0)
            .bind(score.participant_id.0)
            .bind(to_i32("total_goals", score.totals.total_goals)?)
            .bind(to_i32("total_kicks", score.totals.total_kicks)?)
            .bind(score.totals.accuracy)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Raffle
    // ═══════════════════════════════════════════════════════════

    async fn raffle_record(&mut self, date: NaiveDate) -> Result<Option<RaffleRecord>> {
        let row = sqlx::query(
            "SELECT draw_date, first_ticket, last_ticket, winning_ticket,
                    winning_participant, drawn_by, drawn_at
             FROM raffle_records WHERE draw_date = $1",
        )
        .bind(date)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;
        row.as_ref().map(map_raffle_record).transpose()
    }

    async fn insert_raffle_record(&mut self, record: &RaffleRecord) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO raffle_records
                 (draw_date, first_ticket, last_ticket, winning_ticket,
                  winning_participant, drawn_by, drawn_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (draw_date) DO NOTHING",
        )
        .bind(record.date)
        .bind(record.first_ticket.value())
        .bind(record.last_ticket.value())
        .bind(record.winning_ticket.value())
        .bind(record.winning_participant.0)
        .bind(record.drawn_by.0)
        .bind(record.drawn_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected() == 1)
    }

    async fn played_official_tickets_in(
        &mut self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Ticket>> {
        let rows = sqlx::query(
            "SELECT number, participant_id, competition_id, status, kind, official,
                    reserved_kicks, created_at, played_at, expired_at
             FROM tickets
             WHERE status = 'played' AND official
               AND created_at >= $1 AND created_at < $2
             ORDER BY number",
        )
        .bind(from)
        .bind(until)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(classify)?;
        rows.iter().map(map_ticket).collect()
    }
}

/// Sort a database error into the engine's taxonomy. Serialization failures,
/// deadlocks, and lock timeouts are retryable conflicts; unique violations
/// are validation failures; everything else is a storage error.
fn classify(error: sqlx::Error) -> EngineError {
    if let sqlx::Error::Database(db) = &error {
        if matches!(db.code().as_deref(), Some("40001" | "40P01" | "55P03")) {
            metrics::counter!("store.conflicts").increment(1);
            return EngineError::conflict(db.message());
        }
        if db.is_unique_violation() {
            return EngineError::validation(db.message());
        }
    }
    EngineError::storage(error.to_string())
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(classify)
}

fn bad_column(column: &str, value: &str) -> EngineError {
    EngineError::storage(format!("unexpected value in {column}: {value}"))
}

fn to_u32(column: &str, value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| EngineError::storage(format!("negative value in {column}: {value}")))
}

fn to_i32(column: &str, value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        EngineError::validation(format!("{column} value {value} exceeds the supported range"))
    })
}

fn map_competition(row: &PgRow) -> Result<Competition> {
    let kind: String = get(row, "kind")?;
    let status: String = get(row, "status")?;
    Ok(Competition {
        id: CompetitionId(get(row, "id")?),
        kind: CompetitionKind::parse(&kind).ok_or_else(|| bad_column("kind", &kind))?,
        kicks_per_participant: to_u32("kicks_per_participant", get(row, "kicks_per_participant")?)?,
        status: CompetitionStatus::parse(&status).ok_or_else(|| bad_column("status", &status))?,
        created_at: get(row, "created_at")?,
    })
}

fn map_participant(row: &PgRow) -> Result<Participant> {
    let team_id: Option<uuid::Uuid> = get(row, "team_id")?;
    Ok(Participant {
        id: ParticipantId(get(row, "id")?),
        competition_id: CompetitionId(get(row, "competition_id")?),
        player_id: PlayerId(get(row, "player_id")?),
        team_id: team_id.map(TeamId),
        kicks_remaining: to_u32("kicks_remaining", get(row, "kicks_remaining")?)?,
        total_kicks_used: to_u32("total_kicks_used", get(row, "total_kicks_used")?)?,
        is_active: get(row, "is_active")?,
        joined_at: get(row, "joined_at")?,
    })
}

fn map_ticket(row: &PgRow) -> Result<Ticket> {
    let status: String = get(row, "status")?;
    let kind: String = get(row, "kind")?;
    Ok(Ticket {
        number: TicketNumber(get(row, "number")?),
        participant_id: ParticipantId(get(row, "participant_id")?),
        competition_id: CompetitionId(get(row, "competition_id")?),
        status: TicketStatus::parse(&status).ok_or_else(|| bad_column("status", &status))?,
        kind: CompetitionKind::parse(&kind).ok_or_else(|| bad_column("kind", &kind))?,
        official: get(row, "official")?,
        reserved_kicks: to_u32("reserved_kicks", get(row, "reserved_kicks")?)?,
        created_at: get(row, "created_at")?,
        played_at: get(row, "played_at")?,
        expired_at: get(row, "expired_at")?,
    })
}

fn map_kick_event(row: &PgRow) -> Result<KickEvent> {
    let ticket_number: Option<i64> = get(row, "ticket_number")?;
    Ok(KickEvent {
        id: KickEventId(get(row, "id")?),
        participant_id: ParticipantId(get(row, "participant_id")?),
        competition_id: CompetitionId(get(row, "competition_id")?),
        ticket_number: ticket_number.map(TicketNumber),
        goals: to_u32("goals", get(row, "goals")?)?,
        kicks_used: to_u32("kicks_used", get(row, "kicks_used")?)?,
        staff_id: StaffId(get(row, "staff_id")?),
        location: get(row, "location")?,
        recorded_at: get(row, "recorded_at")?,
    })
}

fn map_team_score(row: &PgRow) -> Result<TeamScore> {
    Ok(TeamScore {
        competition_id: CompetitionId(get(row, "competition_id")?),
        team_id: TeamId(get(row, "team_id")?),
        totals: ScoreTotals {
            total_goals: to_u32("total_goals", get(row, "total_goals")?)?,
            total_kicks: to_u32("total_kicks", get(row, "total_kicks")?)?,
            accuracy: get(row, "accuracy")?,
        },
    })
}

fn map_participant_score(row: &PgRow) -> Result<ParticipantScore> {
    Ok(ParticipantScore {
        competition_id: CompetitionId(get(row, "competition_id")?),
        participant_id: ParticipantId(get(row, "participant_id")?),
        totals: ScoreTotals {
            total_goals: to_u32("total_goals", get(row, "total_goals")?)?,
            total_kicks: to_u32("total_kicks", get(row, "total_kicks")?)?,
            accuracy: get(row, "accuracy")?,
        },
    })
}

fn map_raffle_record(row: &PgRow) -> Result<RaffleRecord> {
    Ok(RaffleRecord {
        date: get(row, "draw_date")?,
        first_ticket: TicketNumber(get(row, "first_ticket")?),
        last_ticket: TicketNumber(get(row, "last_ticket")?),
        winning_ticket: TicketNumber(get(row, "winning_ticket")?),
        winning_participant: ParticipantId(get(row, "winning_participant")?),
        drawn_by: StaffId(get(row, "drawn_by")?),
        drawn_at: get(row, "drawn_at")?,
    })
}
