use std::{sync::Arc, time::Duration};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{
    Category, CategoryQueue, Event, EventState, PROCESSING_INTERRUPTED, SIMULATED_FAILURE, Stats,
    callback::DeliveryPool,
};

/// Decides whether processing an event fails.
#[derive(Debug, Clone)]
pub struct FailureInjector {
    probability: f64,
    rng: StdRng,
}

impl FailureInjector {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic injector, for reproducible runs.
    pub fn seeded(probability: f64, seed: u64) -> Self {
        Self {
            probability,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Draw from `[0, 1)` and compare against the failure probability.
    pub fn should_fail(&mut self) -> bool {
        self.rng.random::<f64>() < self.probability
    }
}

/// Sequential consumer of one category queue.
///
/// Every dequeued event goes `PROCESSING`, is held for the category delay and
/// then ends `COMPLETED` or `FAILED` before being handed to the delivery pool.
/// The worker returns once its queue is closed and empty, or right away when
/// the abort token fires (forced shutdown); an event caught mid-hold by the
/// abort fails with [`PROCESSING_INTERRUPTED`] and is still reported.
pub struct Worker {
    queue: CategoryQueue,
    delay: Duration,
    injector: FailureInjector,
    pool: Arc<DeliveryPool>,
    stats: Arc<Stats>,
    abort: CancellationToken,
}

impl Worker {
    pub fn new(
        queue: CategoryQueue,
        delay: Duration,
        injector: FailureInjector,
        pool: Arc<DeliveryPool>,
        stats: Arc<Stats>,
        abort: CancellationToken,
    ) -> Self {
        Self {
            queue,
            delay,
            injector,
            pool,
            stats,
            abort,
        }
    }

    pub fn category(&self) -> Category {
        self.queue.category()
    }

    pub async fn run(mut self) {
        let category = self.category();
        tracing::info!(
            %category,
            delay_ms = self.delay.as_millis() as u64,
            failure_probability = self.injector.probability(),
            "event worker started"
        );

        loop {
            let next = select! {
                biased;
                _ = self.abort.cancelled() => break,
                event = self.queue.dequeue() => event,
            };
            let Some(event) = next else { break };

            let event = self.process(event).await;
            self.pool.dispatch(event);
        }

        if self.abort.is_cancelled() {
            tracing::warn!(%category, abandoned = self.queue.len(), "event worker aborted");
        } else {
            tracing::info!(%category, "event worker drained and stopped");
        }
    }

    /// Run one event through the state machine and return it in a terminal state.
    pub async fn process(&mut self, mut event: Event) -> Event {
        let event_id = event.id();
        let category = event.category();
        tracing::info!(%event_id, %category, "processing event");
        event.begin_processing();

        let interrupted = select! {
            biased;
            _ = self.abort.cancelled() => true,
            _ = sleep(self.delay) => false,
        };

        if interrupted {
            event.fail(PROCESSING_INTERRUPTED);
        } else if self.injector.should_fail() {
            event.fail(SIMULATED_FAILURE);
        } else {
            event.complete();
        }

        match event.state() {
            EventState::Completed => {
                self.stats.record_completed();
                tracing::info!(
                    %event_id,
                    %category,
                    delay_ms = self.delay.as_millis() as u64,
                    "event processed"
                );
            }
            _ => {
                self.stats.record_failed();
                tracing::warn!(
                    %event_id,
                    %category,
                    reason = event.failure_reason().unwrap_or_default(),
                    "event failed"
                );
            }
        }
        event
    }
}
