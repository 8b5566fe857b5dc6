use std::sync::Arc;

use tokio::time::sleep;

use super::{BackoffPolicy, CallbackSender, Outcome};
use crate::{Error, Event, Result, Stats};

/// Result of a delivery that did not exhaust its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The event has no callback target; nothing was sent.
    Skipped,
    /// The target answered with a 2xx status on attempt `attempts`.
    Delivered { attempts: u32 },
}

/// Delivers the outcome of one event, retrying with linear backoff.
///
/// Cheap to clone; clones share the sender and the stats.
#[derive(Clone)]
pub struct CallbackDispatcher {
    sender: Arc<dyn CallbackSender>,
    policy: BackoffPolicy,
    stats: Arc<Stats>,
}

impl CallbackDispatcher {
    pub fn new(sender: Arc<dyn CallbackSender>, policy: BackoffPolicy, stats: Arc<Stats>) -> Self {
        Self {
            sender,
            policy,
            stats,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Report a terminal event to its callback target.
    ///
    /// Makes no call at all when the event has no (or a blank) target.
    /// Otherwise tries up to [`BackoffPolicy::max_attempts`] times; any non-2xx
    /// status or transport error counts as a failed attempt. When every
    /// attempt fails the outcome is logged as undelivered and
    /// [`Error::DeliveryExhausted`] is returned; it is never retried later.
    pub async fn deliver(&self, event: &Event) -> Result<DeliveryOutcome> {
        let event_id = event.id();
        let Some(target) = event.callback_target() else {
            tracing::warn!(%event_id, "no callback target, skipping callback");
            self.stats.record_skipped();
            return Ok(DeliveryOutcome::Skipped);
        };
        let Some(outcome) = Outcome::from_event(event) else {
            tracing::warn!(
                %event_id,
                state = %event.state(),
                "event not terminal, skipping callback"
            );
            self.stats.record_skipped();
            return Ok(DeliveryOutcome::Skipped);
        };

        tracing::info!(%event_id, %target, status = %outcome.status, "sending callback");

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(target, &outcome).await {
                Ok(()) => {
                    tracing::info!(%event_id, attempt, "callback delivered");
                    self.stats.record_delivered();
                    return Ok(DeliveryOutcome::Delivered { attempts: attempt });
                }
                Err(e) => {
                    tracing::warn!(%event_id, attempt, error = %e, "callback attempt failed");
                }
            }

            if !self.policy.should_retry(attempt) {
                break;
            }
            sleep(self.policy.delay_for(attempt)).await;
        }

        tracing::error!(%event_id, %target, attempts = attempt, "callback permanently undelivered");
        self.stats.record_undelivered();
        Err(Error::DeliveryExhausted { attempts: attempt })
    }

    async fn attempt(&self, target: &str, outcome: &Outcome) -> Result<()> {
        let status = self.sender.send(target, outcome).await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(Error::delivery(format!("callback returned status {status}")))
        }
    }
}
