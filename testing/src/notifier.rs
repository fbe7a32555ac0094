//! Notifier doubles for asserting on outbound notifications.

use kickwall_core::environment::{Notification, Notifier};
use kickwall_core::error::{EngineError, Result};
use std::sync::{Arc, Mutex, PoisonError};

/// Notifier that records every notification it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything notified so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}

/// Notifier that fails every delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: Notification) -> Result<()> {
        Err(EngineError::Notification {
            message: "delivery refused".to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kickwall_core::types::{ParticipantId, TicketNumber};
    use tokio_test::block_on;

    #[test]
    fn recorder_keeps_order() {
        block_on(async {
            let notifier = RecordingNotifier::new();
            let winner = Notification::RaffleWinner {
                date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
                ticket: TicketNumber(1001),
                participant: ParticipantId::new(),
            };
            notifier.notify(winner.clone()).await.unwrap();
            assert_eq!(notifier.sent(), vec![winner]);
        });
    }

    #[test]
    fn failing_notifier_always_errors() {
        block_on(async {
            let notifier = FailingNotifier;
            let result = notifier
                .notify(Notification::ParticipantFinished {
                    competition: kickwall_core::types::CompetitionId::new(),
                    participant: ParticipantId::new(),
                })
                .await;
            assert!(matches!(result, Err(EngineError::Notification { .. })));
        });
    }
}
