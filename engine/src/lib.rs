//! # Kickwall Engine
//!
//! Services for running a kicking-wall venue:
//!
//! - [`TicketSequencer`]: strictly increasing ticket numbers
//! - [`QueueTracker`]: FIFO queue, now-serving position, end-of-day sweep
//! - [`KickQuotaLedger`]: competitions, membership, and kick recording
//! - [`ScoreAggregator`]: leaderboards and cache rebuilds
//! - [`RaffleDrawer`]: one winning ticket per local day
//!
//! All five run over one [`CompetitionStore`] and are bundled by [`Engine`].
//! Transient storage conflicts are retried per [`retry::RetryPolicy`];
//! everything else surfaces as [`kickwall_core::EngineError`].

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod config;
pub mod ledger;
pub mod queue;
pub mod raffle;
pub mod retry;
pub mod scores;
pub mod sequencer;

pub use config::EngineConfig;
pub use ledger::{KickOutcome, KickQuotaLedger, KickSubmission};
pub use queue::{QueueTracker, SweepReport};
pub use raffle::RaffleDrawer;
pub use retry::{RetryPolicy, retry_transient};
pub use scores::{RebuildReport, ScoreAggregator};
pub use sequencer::TicketSequencer;

use kickwall_core::environment::{Clock, NoopNotifier, Notifier, SystemClock};
use kickwall_core::store::CompetitionStore;
use std::sync::Arc;

/// Every engine component wired over one shared store.
pub struct Engine<S, N = NoopNotifier> {
    sequencer: TicketSequencer<S>,
    queue: QueueTracker<S>,
    ledger: KickQuotaLedger<S, N>,
    scores: ScoreAggregator<S>,
    raffle: RaffleDrawer<S, N>,
}

impl<S, N> Engine<S, N>
where
    S: CompetitionStore,
    N: Notifier,
{
    /// Wire the components over shared store, clock, and notifier.
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        notifier: Arc<N>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sequencer: TicketSequencer::new(Arc::clone(&store), config.retry.clone()),
            queue: QueueTracker::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                config.retry.clone(),
            ),
            ledger: KickQuotaLedger::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                Arc::clone(&notifier),
                config.retry.clone(),
            ),
            scores: ScoreAggregator::new(Arc::clone(&store), config.retry.clone()),
            raffle: RaffleDrawer::new(
                store,
                clock,
                notifier,
                config.retry,
                config.raffle_utc_offset_minutes,
            ),
        }
    }

    /// The ticket number sequencer.
    pub const fn sequencer(&self) -> &TicketSequencer<S> {
        &self.sequencer
    }

    /// The queue tracker.
    pub const fn queue(&self) -> &QueueTracker<S> {
        &self.queue
    }

    /// The kick-quota ledger.
    pub const fn ledger(&self) -> &KickQuotaLedger<S, N> {
        &self.ledger
    }

    /// The score aggregator.
    pub const fn scores(&self) -> &ScoreAggregator<S> {
        &self.scores
    }

    /// The raffle drawer.
    pub const fn raffle(&self) -> &RaffleDrawer<S, N> {
        &self.raffle
    }
}

impl<S: CompetitionStore> Engine<S, NoopNotifier> {
    /// An engine on the system clock that drops notifications.
    pub fn with_defaults(store: Arc<S>, config: EngineConfig) -> Self {
        Self::new(store, Arc::new(SystemClock), Arc::new(NoopNotifier), config)
    }
}
