use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use parking_lot::RwLock;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{Category, Error, Event, Result};

/// Producer side of one category queue.
#[derive(Debug)]
struct Lane {
    sender: UnboundedSender<Event>,
    depth: Arc<AtomicUsize>,
}

/// Owns one FIFO queue per category and gates admission.
///
/// - `enqueue(event)` appends to the queue of the event's category
/// - `close()` stops admission; queued events stay where they are
/// - `size_of(category)` / `total_size()` report the current backlog
///
/// The consumer ends are returned by [`QueueRouter::new`] as [`CategoryQueue`]s,
/// one per category, and each is meant to be owned by a single worker.
/// Closing the router drops every producer end, so a worker sees the end of
/// its queue only after it has consumed everything admitted before the close.
#[derive(Debug)]
pub struct QueueRouter {
    lanes: RwLock<BTreeMap<Category, Lane>>,
    depths: BTreeMap<Category, Arc<AtomicUsize>>,
    closed: AtomicBool,
}

impl QueueRouter {
    /// Create a router serving the given categories, plus the consumer end
    /// of each category queue.
    pub fn new<I>(categories: I) -> (Self, Vec<CategoryQueue>)
    where
        I: IntoIterator<Item = Category>,
    {
        let mut lanes = BTreeMap::new();
        let mut depths = BTreeMap::new();
        let mut queues = Vec::new();

        for category in categories {
            if lanes.contains_key(&category) {
                continue;
            }
            let (sender, receiver) = unbounded_channel();
            let depth = Arc::new(AtomicUsize::new(0));
            lanes.insert(
                category,
                Lane {
                    sender,
                    depth: depth.clone(),
                },
            );
            depths.insert(category, depth.clone());
            queues.push(CategoryQueue {
                category,
                receiver,
                depth,
            });
            tracing::info!(%category, "initialized queue");
        }

        let router = Self {
            lanes: RwLock::new(lanes),
            depths,
            closed: AtomicBool::new(false),
        };
        (router, queues)
    }

    /// Append an event to its category queue.
    ///
    /// Fails with [`Error::Rejected`] once the router is closed and with
    /// [`Error::UnsupportedCategory`] if the category has no queue.
    pub fn enqueue(&self, event: Event) -> Result<()> {
        // Held for the whole send so close() cannot slip in between check and send.
        let lanes = self.lanes.read();
        if self.is_closed() {
            return Err(Error::Rejected);
        }
        let category = event.category();
        let lane = lanes
            .get(&category)
            .ok_or(Error::UnsupportedCategory(category))?;

        let event_id = event.id();
        lane.depth.fetch_add(1, Ordering::AcqRel);
        if lane.sender.send(event).is_err() {
            // The worker is gone; nothing will ever drain this queue.
            lane.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::Rejected);
        }
        tracing::debug!(
            %event_id,
            %category,
            queue_size = lane.depth.load(Ordering::Acquire),
            "event queued"
        );
        Ok(())
    }

    /// Stop admitting events. Idempotent.
    pub fn close(&self) {
        let mut lanes = self.lanes.write();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        lanes.clear();
        tracing::info!(backlog = self.total_size(), "queue router closed to new events");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of events waiting in a category queue. Advisory.
    pub fn size_of(&self, category: Category) -> usize {
        self.depths
            .get(&category)
            .map_or(0, |d| d.load(Ordering::Acquire))
    }

    /// Number of events waiting across all queues. Advisory.
    pub fn total_size(&self) -> usize {
        self.depths.values().map(|d| d.load(Ordering::Acquire)).sum()
    }

    /// Categories this router has a queue for.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.depths.keys().copied()
    }
}

/// Consumer end of a single category queue.
#[derive(Debug)]
pub struct CategoryQueue {
    category: Category,
    receiver: UnboundedReceiver<Event>,
    depth: Arc<AtomicUsize>,
}

impl CategoryQueue {
    pub fn category(&self) -> Category {
        self.category
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the router is closed and the queue is empty.
    pub async fn dequeue(&mut self) -> Option<Event> {
        let event = self.receiver.recv().await?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(event)
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(category: Category) -> Event {
        Event::new(category, json!({"message": "hi"}), None)
    }

    fn queue_for(queues: &mut Vec<CategoryQueue>, category: Category) -> CategoryQueue {
        let idx = queues
            .iter()
            .position(|q| q.category() == category)
            .unwrap();
        queues.remove(idx)
    }

    #[tokio::test]
    async fn test_fifo_within_category() {
        let (router, mut queues) = QueueRouter::new(Category::ALL);
        let mut email = queue_for(&mut queues, Category::Email);

        let events: Vec<_> = (0..3).map(|_| event(Category::Email)).collect();
        for e in &events {
            router.enqueue(e.clone()).unwrap();
        }
        router.enqueue(event(Category::Sms)).unwrap();

        assert_eq!(router.size_of(Category::Email), 3);
        assert_eq!(router.size_of(Category::Sms), 1);
        assert_eq!(router.total_size(), 4);

        for expected in &events {
            assert_eq!(email.dequeue().await.unwrap().id(), expected.id());
        }
        assert_eq!(router.size_of(Category::Email), 0);
        assert_eq!(router.total_size(), 1);
    }

    #[tokio::test]
    async fn test_close_rejects_and_keeps_backlog() {
        let (router, mut queues) = QueueRouter::new(Category::ALL);
        let mut push = queue_for(&mut queues, Category::Push);
        let queued = event(Category::Push);
        router.enqueue(queued.clone()).unwrap();

        router.close();
        router.close();
        assert!(router.is_closed());
        assert!(matches!(
            router.enqueue(event(Category::Push)),
            Err(Error::Rejected)
        ));
        assert!(matches!(
            router.enqueue(event(Category::Email)),
            Err(Error::Rejected)
        ));

        assert_eq!(push.dequeue().await.unwrap(), queued);
        assert!(push.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_category() {
        let (router, _queues) = QueueRouter::new([Category::Email]);
        let err = router.enqueue(event(Category::Sms)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCategory(Category::Sms)));
        assert_eq!(router.size_of(Category::Sms), 0);
    }

    #[test]
    fn test_duplicate_categories_share_one_queue() {
        let (router, queues) = QueueRouter::new([Category::Sms, Category::Sms]);
        assert_eq!(queues.len(), 1);
        assert_eq!(router.categories().collect::<Vec<_>>(), vec![Category::Sms]);
    }
}
