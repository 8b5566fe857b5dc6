use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::RwLock;
use tokio::{
    sync::{
        Mutex,
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    },
    task::JoinSet,
    time::timeout,
};

use super::CallbackDispatcher;
use crate::Event;

/// Bounded set of tasks delivering callbacks in the background.
///
/// Workers hand terminal events over with [`dispatch`](DeliveryPool::dispatch),
/// which never waits. `size` tasks pull from one shared intake and run
/// [`CallbackDispatcher::deliver`], so at most `size` targets are contacted
/// at once and completions may come back in any order.
pub struct DeliveryPool {
    intake: RwLock<Option<UnboundedSender<Event>>>,
    pending: Arc<AtomicUsize>,
    tasks: Mutex<JoinSet<()>>,
}

impl DeliveryPool {
    /// Spawn `size` delivery tasks on the current runtime.
    pub fn start(dispatcher: CallbackDispatcher, size: usize) -> Self {
        let (tx, rx) = unbounded_channel::<Event>();
        let rx = Arc::new(Mutex::new(rx));
        let pending = Arc::new(AtomicUsize::new(0));

        let mut tasks = JoinSet::new();
        for id in 0..size.max(1) {
            let rx = rx.clone();
            let dispatcher = dispatcher.clone();
            let pending = pending.clone();
            tasks.spawn(async move { run_delivery_task(id, rx, dispatcher, pending).await });
        }
        tracing::info!(size, "callback delivery pool started");

        Self {
            intake: RwLock::new(Some(tx)),
            pending,
            tasks: Mutex::new(tasks),
        }
    }

    /// Queue an event for delivery and return immediately.
    ///
    /// Returns `false` if the pool has already been shut down.
    pub fn dispatch(&self, event: Event) -> bool {
        let intake = self.intake.read();
        let Some(tx) = intake.as_ref() else {
            tracing::warn!(event_id = %event.id(), "delivery pool closed, dropping callback");
            return false;
        };
        self.pending.fetch_add(1, Ordering::AcqRel);
        if tx.send(event).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Deliveries queued or in progress.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Stop accepting events, let queued deliveries finish and wait for the
    /// tasks to exit. Tasks still busy after `limit` are aborted.
    ///
    /// Returns the number of deliveries abandoned. Idempotent.
    pub async fn shutdown(&self, limit: Duration) -> usize {
        self.intake.write().take();

        let mut tasks = self.tasks.lock().await;
        let drained = timeout(limit, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    tracing::error!(error = %e, "delivery task failed");
                }
            }
        })
        .await;

        if drained.is_ok() {
            tracing::info!("callback delivery pool drained");
            return 0;
        }

        let abandoned = self.pending();
        tracing::warn!(abandoned, "callback delivery pool did not drain in time, aborting");
        tasks.shutdown().await;
        abandoned
    }
}

async fn run_delivery_task(
    id: usize,
    rx: Arc<Mutex<UnboundedReceiver<Event>>>,
    dispatcher: CallbackDispatcher,
    pending: Arc<AtomicUsize>,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(event) = next else { break };
        // Exhausted deliveries are logged and counted by the dispatcher.
        let _ = dispatcher.deliver(&event).await;
        pending.fetch_sub(1, Ordering::AcqRel);
    }
    tracing::debug!(task = id, "delivery task stopped");
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        Category, Result, Stats,
        callback::{BackoffPolicy, CallbackSender, Outcome},
    };

    struct Slow {
        delay: Duration,
        status: u16,
    }

    #[async_trait]
    impl CallbackSender for Slow {
        async fn send(&self, _target: &str, _outcome: &Outcome) -> Result<u16> {
            tokio::time::sleep(self.delay).await;
            Ok(self.status)
        }
    }

    fn pool(delay: Duration, status: u16, size: usize) -> (DeliveryPool, Arc<Stats>) {
        let stats = Arc::new(Stats::default());
        let dispatcher = CallbackDispatcher::new(
            Arc::new(Slow { delay, status }),
            BackoffPolicy::new(3, Duration::from_millis(100)),
            stats.clone(),
        );
        (DeliveryPool::start(dispatcher, size), stats)
    }

    fn done() -> Event {
        let mut event = Event::new(Category::Sms, json!({}), Some("http://cb".into()));
        event.begin_processing();
        event.complete();
        event
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_does_not_wait_and_shutdown_drains() {
        let (pool, stats) = pool(Duration::from_secs(1), 200, 2);
        let start = tokio::time::Instant::now();
        for _ in 0..4 {
            assert!(pool.dispatch(done()));
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        assert_eq!(pool.shutdown(Duration::from_secs(10)).await, 0);
        assert_eq!(stats.snapshot().delivered, 4);
        // Two tasks, four one-second deliveries.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(pool.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_after_shutdown_is_refused() {
        let (pool, _) = pool(Duration::ZERO, 200, 1);
        pool.shutdown(Duration::from_secs(1)).await;
        assert!(!pool.dispatch(done()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_timeout_reports_abandoned() {
        let (pool, stats) = pool(Duration::from_secs(30), 200, 1);
        pool.dispatch(done());
        pool.dispatch(done());

        assert_eq!(pool.shutdown(Duration::from_secs(5)).await, 2);
        assert_eq!(stats.snapshot().delivered, 0);
    }
}
