//! Environment seams: time and outbound notifications.
//!
//! Both are injected so the engine stays deterministic under test. The
//! production wiring is [`SystemClock`] plus whatever notifier the request
//! layer provides ([`NoopNotifier`] when there is none).

use crate::error::Result;
use crate::types::{CompetitionId, ParticipantId, TicketNumber};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Time source for created/played/drawn timestamps.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Events the engine announces after a unit of work commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A raffle winner was drawn.
    RaffleWinner {
        /// The date the draw covers.
        date: NaiveDate,
        /// The winning ticket.
        ticket: TicketNumber,
        /// The participant holding it.
        participant: ParticipantId,
    },
    /// A participant used up their whole kick quota.
    ParticipantFinished {
        /// The competition the quota belonged to.
        competition: CompetitionId,
        /// The finished participant.
        participant: ParticipantId,
    },
}

/// Best-effort notification sink.
///
/// Delivery happens *after* the triggering unit of work commits, and a
/// failure here is logged and swallowed; it never rolls the commit back.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    fn notify(&self, notification: Notification) -> impl Future<Output = Result<()>> + Send;
}

/// Notifier that discards everything. Default wiring when the surrounding
/// system has no notification channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notification: Notification) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}
