use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{
    select,
    sync::{Mutex, OnceCell},
    task::JoinSet,
    time::{Instant, interval_at, sleep_until, timeout},
};
use tokio_util::sync::CancellationToken;

use crate::{QueueRouter, callback::DeliveryPool};

/// How long aborted workers and the delivery pool get after the shutdown
/// timeout has already elapsed.
const FORCED_GRACE: Duration = Duration::from_secs(5);

/// What a shutdown achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// The workers did not drain within the timeout and were aborted.
    pub forced: bool,
    /// Events still queued when the workers were aborted.
    pub abandoned_events: usize,
    /// Callback deliveries cut short when the delivery pool was aborted.
    pub abandoned_callbacks: usize,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Every accepted event was processed and had its callback attempted.
    pub fn is_clean(&self) -> bool {
        !self.forced && self.abandoned_events == 0 && self.abandoned_callbacks == 0
    }
}

/// Orchestrates graceful termination of the pipeline.
///
/// # Shutdown Process
///
/// 1. Closes the router; from now on every submission is rejected
/// 2. Waits for every worker to drain its queue, logging the backlog
///    every `progress_interval`, bounded by `timeout`
/// 3. If the bound elapses: fires the abort token, aborts workers that do not
///    stop in time, then counts the events left in the queues as abandoned
/// 4. Shuts the callback delivery pool down so pending callbacks get sent
pub struct ShutdownCoordinator {
    router: Arc<QueueRouter>,
    workers: Mutex<JoinSet<()>>,
    pool: Arc<DeliveryPool>,
    abort: CancellationToken,
    timeout: Duration,
    progress_interval: Duration,
    report: OnceCell<ShutdownReport>,
}

impl ShutdownCoordinator {
    pub fn new(
        router: Arc<QueueRouter>,
        workers: JoinSet<()>,
        pool: Arc<DeliveryPool>,
        abort: CancellationToken,
        timeout: Duration,
        progress_interval: Duration,
    ) -> Self {
        Self {
            router,
            workers: Mutex::new(workers),
            pool,
            abort,
            timeout,
            progress_interval,
            report: OnceCell::new(),
        }
    }

    /// Run the shutdown. Idempotent: concurrent and later calls wait for and
    /// return the result of the first one.
    pub async fn initiate(&self) -> ShutdownReport {
        *self.report.get_or_init(|| self.run()).await
    }

    pub fn is_initiated(&self) -> bool {
        self.router.is_closed()
    }

    async fn run(&self) -> ShutdownReport {
        let start = Instant::now();
        let deadline = start + self.timeout;
        tracing::info!(
            backlog = self.router.total_size(),
            timeout_ms = self.timeout.as_millis() as u64,
            "shutdown initiated, no longer accepting events"
        );
        self.router.close();

        let mut workers = self.workers.lock().await;
        let drained = self.await_workers(&mut workers, start, deadline).await;

        let mut abandoned_events = 0;
        if !drained {
            tracing::warn!(
                backlog = self.router.total_size(),
                timeout_ms = self.timeout.as_millis() as u64,
                "workers did not drain in time, forcing shutdown"
            );
            self.abort.cancel();
            let stopped = timeout(FORCED_GRACE, async {
                while workers.join_next().await.is_some() {}
            })
            .await;
            if stopped.is_err() {
                tracing::error!("workers ignored abort, cancelling tasks");
                workers.shutdown().await;
            }
            // No consumer is left, so whatever is still queued was never dequeued.
            abandoned_events = self.router.total_size();
        } else {
            tracing::info!("all queued events processed");
        }

        let budget = deadline
            .saturating_duration_since(Instant::now())
            .max(FORCED_GRACE);
        let abandoned_callbacks = self.pool.shutdown(budget).await;

        let report = ShutdownReport {
            forced: !drained,
            abandoned_events,
            abandoned_callbacks,
            elapsed: start.elapsed(),
        };
        if report.is_clean() {
            tracing::info!(elapsed_ms = report.elapsed.as_millis() as u64, "shutdown complete");
        } else {
            tracing::warn!(?report, "shutdown completed with losses");
        }
        report
    }

    /// `true` if every worker finished before `deadline`.
    async fn await_workers(
        &self,
        workers: &mut JoinSet<()>,
        start: Instant,
        deadline: Instant,
    ) -> bool {
        let mut progress = interval_at(start + self.progress_interval, self.progress_interval);
        loop {
            select! {
                res = workers.join_next() => match res {
                    None => return true,
                    Some(Err(e)) => tracing::error!(error = %e, "event worker failed"),
                    Some(Ok(())) => {}
                },
                _ = progress.tick() => {
                    tracing::info!(
                        backlog = self.router.total_size(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "waiting for queued events to complete processing"
                    );
                }
                _ = sleep_until(deadline) => return false,
            }
        }
    }
}
