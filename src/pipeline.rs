use std::{collections::BTreeMap, sync::Arc};

use serde::Serialize;
use tokio::{runtime::Handle, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    Category, Config, Error, Event, EventId, FailureInjector, QueueRouter, Result,
    ShutdownCoordinator, ShutdownReport, Stats, StatsSnapshot, Worker,
    callback::{BackoffPolicy, CallbackDispatcher, CallbackSender, DeliveryPool, HttpCallbackSender},
};

/// Operational view of a running pipeline, for health and monitoring endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub shutting_down: bool,
    /// Events queued across all categories.
    pub backlog: usize,
    pub queues: BTreeMap<Category, usize>,
    /// Callbacks queued or being delivered.
    pub pending_callbacks: usize,
    pub stats: StatsSnapshot,
}

/// Owns the whole intake → queue → worker → callback runtime.
///
/// - `start(config)` spawns one worker per configured category and the
///   callback delivery pool, returning immediately
/// - `submit(category, payload, callback_target)` admits an event
/// - `queue_size`, `backlog`, `is_shutting_down`, `status` answer operational queries
/// - `shutdown()` drains and stops everything, see [`ShutdownCoordinator`]
///
/// Dropping a pipeline without calling `shutdown` aborts its tasks and loses
/// whatever was queued.
pub struct Pipeline {
    config: Arc<Config>,
    router: Arc<QueueRouter>,
    pool: Arc<DeliveryPool>,
    stats: Arc<Stats>,
    coordinator: ShutdownCoordinator,
}

impl Pipeline {
    /// Start a pipeline that reports outcomes over HTTP.
    pub fn start(config: Config) -> Result<Self> {
        let sender = HttpCallbackSender::new(config.callback_timeout)?;
        Self::with_sender(config, Arc::new(sender))
    }

    /// Start a pipeline reporting outcomes through a custom [`CallbackSender`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_sender(config: Config, sender: Arc<dyn CallbackSender>) -> Result<Self> {
        config.validate()?;
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let config = Arc::new(config);
        let stats = Arc::new(Stats::default());

        let policy = BackoffPolicy::new(config.max_retries, config.base_backoff);
        let dispatcher = CallbackDispatcher::new(sender, policy, stats.clone());
        let pool = {
            let _guard = handle.enter();
            Arc::new(DeliveryPool::start(dispatcher, config.callback_workers))
        };

        let (router, queues) = QueueRouter::new(config.categories.keys().copied());
        let router = Arc::new(router);
        let abort = CancellationToken::new();

        let mut workers = JoinSet::new();
        for queue in queues {
            let Some(settings) = config.category(queue.category()) else {
                continue;
            };
            let worker = Worker::new(
                queue,
                settings.processing_delay,
                FailureInjector::new(config.failure_probability),
                pool.clone(),
                stats.clone(),
                abort.clone(),
            );
            workers.spawn_on(worker.run(), &handle);
        }

        let coordinator = ShutdownCoordinator::new(
            router.clone(),
            workers,
            pool.clone(),
            abort,
            config.shutdown_timeout,
            config.progress_interval,
        );

        tracing::info!(
            categories = ?config.categories.keys().collect::<Vec<_>>(),
            failure_probability = config.failure_probability,
            callback_workers = config.callback_workers,
            "notification pipeline started"
        );

        Ok(Self {
            config,
            router,
            pool,
            stats,
            coordinator,
        })
    }

    /// Admit a new event and return its id.
    ///
    /// Fails with [`Error::Rejected`] once shutdown has begun and with
    /// [`Error::UnsupportedCategory`] for a category without a queue.
    /// The payload is not inspected.
    pub fn submit(
        &self,
        category: Category,
        payload: serde_json::Value,
        callback_target: Option<String>,
    ) -> Result<EventId> {
        self.submit_event(Event::new(category, payload, callback_target))
    }

    /// Admit an already constructed event.
    pub fn submit_event(&self, event: Event) -> Result<EventId> {
        let event_id = event.id();
        let category = event.category();
        match self.router.enqueue(event) {
            Ok(()) => {
                self.stats.record_accepted();
                tracing::info!(
                    %event_id,
                    %category,
                    queue_size = self.router.size_of(category),
                    "event accepted"
                );
                Ok(event_id)
            }
            Err(e) => {
                self.stats.record_rejected();
                tracing::warn!(%event_id, %category, error = %e, "event rejected");
                Err(e)
            }
        }
    }

    pub fn queue_size(&self, category: Category) -> usize {
        self.router.size_of(category)
    }

    pub fn backlog(&self) -> usize {
        self.router.total_size()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.coordinator.is_initiated()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            shutting_down: self.is_shutting_down(),
            backlog: self.backlog(),
            queues: self
                .router
                .categories()
                .map(|c| (c, self.router.size_of(c)))
                .collect(),
            pending_callbacks: self.pool.pending(),
            stats: self.stats.snapshot(),
        }
    }

    /// Gracefully stop the pipeline. Idempotent.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.coordinator.initiate().await
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }
}
