//! Cached score totals and leaderboards.
//!
//! Totals are bumped in the same unit of work as the kick event that moves
//! them, so the cache is consistent with the log at every commit point. The
//! [`ScoreAggregator::rebuild`] pass refolds the whole event log and replaces
//! the cache, for recovery after manual data surgery.

use crate::retry::{RetryPolicy, retry_transient};
use kickwall_core::error::{EngineError, Result};
use kickwall_core::store::{CompetitionStore, UnitOfWork};
use kickwall_core::types::{
    CompetitionId, CompetitionKind, ParticipantId, ParticipantScore, ScoreTotals, TeamId,
    TeamScore,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a rebuild pass folded and wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    /// Kick events folded into fresh totals.
    pub events_folded: usize,
    /// Score rows the cache now holds for the competition.
    pub rows_written: usize,
}

/// Serves leaderboards and rebuilds the score cache from the event log.
pub struct ScoreAggregator<S> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S: CompetitionStore> ScoreAggregator<S> {
    /// Build an aggregator over `store`.
    pub const fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Team standings: goals descending, then kicks ascending, then team id
    /// for a stable order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the cache cannot be read.
    pub async fn team_leaderboard(&self, competition: CompetitionId) -> Result<Vec<TeamScore>> {
        let mut uow = self.store.begin().await?;
        let mut scores = uow.team_scores(competition).await?;
        uow.rollback().await?;
        scores.sort_by_key(|score| (score.totals.ranking_key(), score.team_id));
        Ok(scores)
    }

    /// Participant standings, ordered like [`Self::team_leaderboard`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the cache cannot be read.
    pub async fn participant_leaderboard(
        &self,
        competition: CompetitionId,
    ) -> Result<Vec<ParticipantScore>> {
        let mut uow = self.store.begin().await?;
        let mut scores = uow.participant_scores(competition).await?;
        uow.rollback().await?;
        scores.sort_by_key(|score| (score.totals.ranking_key(), score.participant_id));
        Ok(scores)
    }

    /// Refold the competition's kick events and replace its cached totals.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown competition and
    /// [`EngineError::Storage`] when an event references a participant the
    /// roster does not know.
    #[tracing::instrument(
        skip(self, competition_id),
        name = "score_rebuild",
        fields(competition = %competition_id)
    )]
    pub async fn rebuild(&self, competition_id: CompetitionId) -> Result<RebuildReport> {
        let report = retry_transient(&self.retry, || self.try_rebuild(competition_id)).await?;
        tracing::info!(
            competition = %competition_id,
            events = report.events_folded,
            rows = report.rows_written,
            "Score cache rebuilt"
        );
        Ok(report)
    }

    async fn try_rebuild(&self, competition_id: CompetitionId) -> Result<RebuildReport> {
        let mut uow = self.store.begin().await?;
        let competition = uow
            .competition(competition_id)
            .await?
            .ok_or_else(|| EngineError::not_found("competition", competition_id))?;
        let events = uow.kick_events_for_competition(competition_id).await?;
        let events_folded = events.len();

        let rows_written = match competition.kind {
            CompetitionKind::Team => {
                let roster = uow.participants_in_competition(competition_id).await?;
                let teams: BTreeMap<ParticipantId, Option<TeamId>> =
                    roster.into_iter().map(|p| (p.id, p.team_id)).collect();

                let mut folded: BTreeMap<TeamId, (u32, u32)> = BTreeMap::new();
                for event in &events {
                    let team = match teams.get(&event.participant_id) {
                        Some(Some(team)) => *team,
                        Some(None) => {
                            return Err(EngineError::storage(
                                "kick event participant has no team",
                            ));
                        }
                        None => {
                            return Err(EngineError::storage(
                                "kick event references unknown participant",
                            ));
                        }
                    };
                    let entry = folded.entry(team).or_default();
                    entry.0 += event.goals;
                    entry.1 += event.kicks_used;
                }

                let scores: Vec<TeamScore> = folded
                    .into_iter()
                    .map(|(team_id, (goals, kicks))| TeamScore {
                        competition_id,
                        team_id,
                        totals: ScoreTotals::from_counts(goals, kicks),
                    })
                    .collect();
                uow.replace_team_scores(competition_id, &scores).await?;
                scores.len()
            }
            CompetitionKind::Solo => {
                let mut folded: BTreeMap<ParticipantId, (u32, u32)> = BTreeMap::new();
                for event in &events {
                    let entry = folded.entry(event.participant_id).or_default();
                    entry.0 += event.goals;
                    entry.1 += event.kicks_used;
                }

                let scores: Vec<ParticipantScore> = folded
                    .into_iter()
                    .map(|(participant_id, (goals, kicks))| ParticipantScore {
                        competition_id,
                        participant_id,
                        totals: ScoreTotals::from_counts(goals, kicks),
                    })
                    .collect();
                uow.replace_participant_scores(competition_id, &scores)
                    .await?;
                scores.len()
            }
        };

        uow.commit().await?;
        Ok(RebuildReport {
            events_folded,
            rows_written,
        })
    }
}
