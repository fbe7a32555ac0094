//! Domain types for the kicking-wall competition engine.
//!
//! Everything here is plain data: identifiers, closed status enums, and the
//! entities the engine persists. Statuses carry a stable string form
//! (`as_str`/`parse`) that storage backends share, so the set of legal values
//! lives in exactly one place.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;

// ═══════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════

/// Unique identifier for a competition instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompetitionId(pub uuid::Uuid);

impl CompetitionId {
    /// Generate a new random `CompetitionId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for CompetitionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CompetitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a participant (one player's membership in one
/// competition instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub uuid::Uuid);

impl ParticipantId {
    /// Generate a new random `ParticipantId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a player, managed by the surrounding system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub uuid::Uuid);

impl PlayerId {
    /// Generate a new random `PlayerId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a team in a team competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub uuid::Uuid);

impl TeamId {
    /// Generate a new random `TeamId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for TeamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an authenticated staff member, supplied by the caller for
/// audit fields. The engine never authenticates staff itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StaffId(pub uuid::Uuid);

impl StaffId {
    /// Generate a new random `StaffId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for StaffId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a kick event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KickEventId(pub uuid::Uuid);

impl KickEventId {
    /// Generate a new random `KickEventId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for KickEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KickEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ticket's queue number: unique and monotonically increasing, issued by
/// the sequencer's fetch-and-increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketNumber(pub i64);

impl TicketNumber {
    /// The raw numeric value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════
// Status enums
// ═══════════════════════════════════════════════════════════

/// Lifecycle status of a ticket.
///
/// A ticket is created `InQueue` and moves exactly once to one of the
/// terminal states. There are no transitions out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    /// Waiting for a turn; counted by the now-serving position.
    InQueue,
    /// The turn happened and kicks were recorded.
    Played,
    /// The turn never happened; reserved kicks were refunded.
    Expired,
    /// Manually removed from the queue; reserved kicks are forfeited.
    Skipped,
}

impl TicketStatus {
    /// Stable string form shared by storage backends.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InQueue => "in-queue",
            Self::Played => "played",
            Self::Expired => "expired",
            Self::Skipped => "skipped",
        }
    }

    /// Parse the stable string form back into a status.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in-queue" => Some(Self::InQueue),
            "played" => Some(Self::Played),
            "expired" => Some(Self::Expired),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Whether the ticket can no longer transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InQueue)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a competition instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompetitionStatus {
    /// Created but not yet open for play.
    Pending,
    /// Open: participants may enqueue and record kicks.
    Active,
    /// Closed: no further joins or recordings.
    Completed,
}

impl CompetitionStatus {
    /// Stable string form shared by storage backends.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Parse the stable string form back into a status.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a competition is scored per participant or per team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompetitionKind {
    /// Individual play; aggregates go to [`ParticipantScore`].
    Solo,
    /// Team play; aggregates go to [`TeamScore`].
    Team,
}

impl CompetitionKind {
    /// Stable string form shared by storage backends.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Team => "team",
        }
    }

    /// Parse the stable string form back into a kind.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "solo" => Some(Self::Solo),
            "team" => Some(Self::Team),
            _ => None,
        }
    }
}

impl fmt::Display for CompetitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════
// Entities
// ═══════════════════════════════════════════════════════════

/// A queue entry granting a participant one turn at the wall.
///
/// Created at enqueue with the participant's remaining kicks reserved on it;
/// mutated only through the queue tracker's transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Queue number issued by the sequencer.
    pub number: TicketNumber,
    /// The participant this turn belongs to.
    pub participant_id: ParticipantId,
    /// The competition the turn is played under.
    pub competition_id: CompetitionId,
    /// Current lifecycle status.
    pub status: TicketStatus,
    /// Competition kind copied from the instance at enqueue time.
    pub kind: CompetitionKind,
    /// Whether the turn counts for official play (raffle eligibility).
    pub official: bool,
    /// Kicks reserved from the participant's quota when the ticket was issued.
    pub reserved_kicks: u32,
    /// When the ticket was issued.
    pub created_at: DateTime<Utc>,
    /// When the turn was played, if it was.
    pub played_at: Option<DateTime<Utc>>,
    /// When the ticket expired, if it did.
    pub expired_at: Option<DateTime<Utc>>,
}

/// A solo or team match context owning a roster of participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    /// Identifier.
    pub id: CompetitionId,
    /// Scoring mode.
    pub kind: CompetitionKind,
    /// Fixed kick allotment each participant receives on joining.
    pub kicks_per_participant: u32,
    /// Lifecycle status.
    pub status: CompetitionStatus,
    /// When the instance was created.
    pub created_at: DateTime<Utc>,
}

/// One player's membership in one competition instance, carrying their
/// kick-quota ledger.
///
/// Invariant: `kicks_remaining + total_kicks_used` equals the competition's
/// per-participant allotment at every instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Identifier of this membership.
    pub id: ParticipantId,
    /// The competition joined.
    pub competition_id: CompetitionId,
    /// The player behind this membership.
    pub player_id: PlayerId,
    /// Team assignment; required for team competitions, absent for solo.
    pub team_id: Option<TeamId>,
    /// Kicks still available (including none while a ticket holds them).
    pub kicks_remaining: u32,
    /// Kicks consumed or currently reserved.
    pub total_kicks_used: u32,
    /// Whether the participant may still enqueue and record.
    pub is_active: bool,
    /// When the player joined.
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// The allotment this participant started with.
    #[must_use]
    pub const fn initial_quota(&self) -> u32 {
        self.kicks_remaining + self.total_kicks_used
    }

    /// Whether the whole quota has been used.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.kicks_remaining == 0
    }
}

/// Immutable record of goals scored out of kicks attempted.
///
/// Kick events are append-only and are the source of truth for every score
/// aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickEvent {
    /// Identifier.
    pub id: KickEventId,
    /// Who kicked.
    pub participant_id: ParticipantId,
    /// Under which competition.
    pub competition_id: CompetitionId,
    /// The ticket that granted the turn, when recorded through the queue.
    pub ticket_number: Option<TicketNumber>,
    /// Goals scored. Never exceeds `kicks_used`.
    pub goals: u32,
    /// Kicks attempted.
    pub kicks_used: u32,
    /// Staff member who logged the event.
    pub staff_id: StaffId,
    /// Free-form station or pitch location.
    pub location: Option<String>,
    /// When the event was logged.
    pub recorded_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════
// Score aggregates
// ═══════════════════════════════════════════════════════════

/// Running totals for one scoring entity.
///
/// `accuracy` is `total_goals / total_kicks * 100`, rounded to two decimals,
/// and 0 when no kicks have been taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreTotals {
    /// Goals scored so far.
    pub total_goals: u32,
    /// Kicks attempted so far.
    pub total_kicks: u32,
    /// Goal percentage, rounded to two decimals.
    pub accuracy: f64,
}

impl ScoreTotals {
    /// Empty totals.
    pub const ZERO: Self = Self {
        total_goals: 0,
        total_kicks: 0,
        accuracy: 0.0,
    };

    /// Build totals from raw counts, computing accuracy.
    #[must_use]
    pub fn from_counts(goals: u32, kicks: u32) -> Self {
        Self {
            total_goals: goals,
            total_kicks: kicks,
            accuracy: Self::accuracy_of(goals, kicks),
        }
    }

    /// Fold one more event into the totals, recomputing accuracy.
    pub fn add(&mut self, goals: u32, kicks: u32) {
        self.total_goals += goals;
        self.total_kicks += kicks;
        self.accuracy = Self::accuracy_of(self.total_goals, self.total_kicks);
    }

    /// Goal percentage rounded to two decimals, 0 when `kicks` is 0.
    #[must_use]
    pub fn accuracy_of(goals: u32, kicks: u32) -> f64 {
        if kicks == 0 {
            return 0.0;
        }
        (f64::from(goals) / f64::from(kicks) * 100.0 * 100.0).round() / 100.0
    }

    /// Leaderboard ordering key: goals descending, then kicks ascending
    /// (fewer attempts for the same goal count ranks higher).
    #[must_use]
    pub const fn ranking_key(&self) -> (Reverse<u32>, u32) {
        (Reverse(self.total_goals), self.total_kicks)
    }
}

impl Default for ScoreTotals {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Cached score aggregate for a team within one competition.
///
/// A cache over [`KickEvent`]s, not ground truth: rebuilding from the event
/// log must reproduce it exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamScore {
    /// The competition the totals belong to.
    pub competition_id: CompetitionId,
    /// The team scored.
    pub team_id: TeamId,
    /// Running totals.
    pub totals: ScoreTotals,
}

/// Cached score aggregate for a participant within one solo competition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticipantScore {
    /// The competition the totals belong to.
    pub competition_id: CompetitionId,
    /// The participant scored.
    pub participant_id: ParticipantId,
    /// Running totals.
    pub totals: ScoreTotals,
}

// ═══════════════════════════════════════════════════════════
// Raffle
// ═══════════════════════════════════════════════════════════

/// The outcome of one day's raffle draw. Immutable once written; at most one
/// exists per date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleRecord {
    /// The local calendar date the draw covers.
    pub date: NaiveDate,
    /// Lowest eligible ticket number in the drawn set.
    pub first_ticket: TicketNumber,
    /// Highest eligible ticket number in the drawn set.
    pub last_ticket: TicketNumber,
    /// The winning ticket.
    pub winning_ticket: TicketNumber,
    /// The participant holding the winning ticket.
    pub winning_participant: ParticipantId,
    /// Staff member who performed the draw.
    pub drawn_by: StaffId,
    /// When the draw happened.
    pub drawn_at: DateTime<Utc>,
}
