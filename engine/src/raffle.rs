//! Daily raffle draws over played official tickets.
//!
//! Eligibility for a date covers tickets created within that calendar day at
//! the venue's UTC offset, played, and marked official. At most one draw per
//! date ever commits; the raffle record's insert is the arbiter when two
//! draws race.

use crate::retry::{RetryPolicy, retry_transient};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use kickwall_core::environment::{Clock, Notification, Notifier};
use kickwall_core::error::{EngineError, Result};
use kickwall_core::store::{CompetitionStore, UnitOfWork};
use kickwall_core::types::{RaffleRecord, StaffId, Ticket};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Draws one winning ticket per local day.
pub struct RaffleDrawer<S, N> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    notifier: Arc<N>,
    retry: RetryPolicy,
    utc_offset_minutes: i32,
}

impl<S, N> RaffleDrawer<S, N>
where
    S: CompetitionStore,
    N: Notifier,
{
    /// Build a drawer over `store`. `utc_offset_minutes` positions the
    /// venue's midnight relative to UTC.
    pub const fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        notifier: Arc<N>,
        retry: RetryPolicy,
        utc_offset_minutes: i32,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            retry,
            utc_offset_minutes,
        }
    }

    /// Draw the winner for `date` using system entropy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyDrawn`] when the date already has a
    /// winner and [`EngineError::NoEligibleTickets`] when nothing qualifies.
    #[tracing::instrument(
        skip(self, date, drawn_by),
        name = "raffle_draw",
        fields(date = %date)
    )]
    pub async fn draw(&self, date: NaiveDate, drawn_by: StaffId) -> Result<RaffleRecord> {
        self.draw_with(date, drawn_by, StdRng::from_entropy()).await
    }

    /// Draw with a seeded generator. The same seed over the same eligible
    /// set picks the same winner, which makes audits reproducible.
    ///
    /// # Errors
    ///
    /// Same as [`Self::draw`].
    #[tracing::instrument(
        skip(self, date, drawn_by),
        name = "raffle_draw_seeded",
        fields(date = %date)
    )]
    pub async fn draw_seeded(
        &self,
        date: NaiveDate,
        drawn_by: StaffId,
        seed: u64,
    ) -> Result<RaffleRecord> {
        self.draw_with(date, drawn_by, ChaCha8Rng::seed_from_u64(seed))
            .await
    }

    async fn draw_with<R>(&self, date: NaiveDate, drawn_by: StaffId, rng: R) -> Result<RaffleRecord>
    where
        R: Rng + Clone + Send,
    {
        let record =
            retry_transient(&self.retry, || self.try_draw(date, drawn_by, rng.clone())).await?;
        metrics::counter!("raffle.draws").increment(1);
        tracing::info!(
            date = %date,
            ticket = record.winning_ticket.value(),
            participant = %record.winning_participant,
            "Raffle winner drawn"
        );

        let notification = Notification::RaffleWinner {
            date,
            ticket: record.winning_ticket,
            participant: record.winning_participant,
        };
        if let Err(error) = self.notifier.notify(notification).await {
            tracing::warn!(error = %error, "Winner notification failed");
        }
        Ok(record)
    }

    async fn try_draw<R: Rng>(
        &self,
        date: NaiveDate,
        drawn_by: StaffId,
        mut rng: R,
    ) -> Result<RaffleRecord> {
        let (from, until) = local_day_window(self.utc_offset_minutes, date)?;
        let mut uow = self.store.begin().await?;

        if uow.raffle_record(date).await?.is_some() {
            return Err(EngineError::AlreadyDrawn { date });
        }
        let eligible = uow.played_official_tickets_in(from, until).await?;
        let Some(winner) = select_winner(&eligible, &mut rng) else {
            return Err(EngineError::NoEligibleTickets { date });
        };
        let (Some(first), Some(last)) = (eligible.first(), eligible.last()) else {
            return Err(EngineError::NoEligibleTickets { date });
        };

        let record = RaffleRecord {
            date,
            first_ticket: first.number,
            last_ticket: last.number,
            winning_ticket: winner.number,
            winning_participant: winner.participant_id,
            drawn_by,
            drawn_at: self.clock.now(),
        };
        if !uow.insert_raffle_record(&record).await? {
            return Err(EngineError::AlreadyDrawn { date });
        }
        uow.commit().await?;
        Ok(record)
    }

    /// The winner already drawn for `date`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the record cannot be read.
    pub async fn status(&self, date: NaiveDate) -> Result<Option<RaffleRecord>> {
        let mut uow = self.store.begin().await?;
        let record = uow.raffle_record(date).await?;
        uow.rollback().await?;
        Ok(record)
    }
}

/// Pick uniformly from `eligible`, or `None` when the pool is empty.
pub fn select_winner<'a, R: Rng>(eligible: &'a [Ticket], rng: &mut R) -> Option<&'a Ticket> {
    if eligible.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..eligible.len());
    eligible.get(index)
}

/// UTC bounds of `date` at the venue's offset: midnight to the next
/// midnight, half-open.
fn local_day_window(
    utc_offset_minutes: i32,
    date: NaiveDate,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
        .ok_or_else(|| EngineError::validation("raffle UTC offset is out of range"))?;
    let start_local = date.and_time(NaiveTime::MIN);
    let end_local = date
        .succ_opt()
        .ok_or_else(|| EngineError::validation("raffle date is out of range"))?
        .and_time(NaiveTime::MIN);
    let start = offset
        .from_local_datetime(&start_local)
        .single()
        .ok_or_else(|| EngineError::validation("raffle day start is ambiguous"))?;
    let end = offset
        .from_local_datetime(&end_local)
        .single()
        .ok_or_else(|| EngineError::validation("raffle day end is ambiguous"))?;
    Ok((start.with_timezone(&Utc), end.with_timezone(&Utc)))
}
