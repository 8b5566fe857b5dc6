use std::{fmt, hash::Hash};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Category;

/// Unique identifier of an accepted event.
///
/// Assigned at intake and never changed. Displays as a hyphenated UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an [`Event`].
///
/// `Pending -> Processing -> {Completed | Failed}`. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl EventState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventState::Completed | EventState::Failed)
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventState::Pending => write!(f, "PENDING"),
            EventState::Processing => write!(f, "PROCESSING"),
            EventState::Completed => write!(f, "COMPLETED"),
            EventState::Failed => write!(f, "FAILED"),
        }
    }
}

/// A notification event travelling through the pipeline.
///
/// Identity (`id`, `category`, `payload`, `callback_target`, `created_at`) is
/// fixed at construction. Lifecycle fields only change through the transition
/// methods, which keep two invariants:
///
/// - `completed_at` is set iff the state is terminal
/// - `failure_reason` is set iff the state is [`EventState::Failed`]
///
/// The event is moved by value from the intake into its queue, then into the
/// worker and finally into the callback dispatcher, so there is never more
/// than one writer.
#[derive(Debug, Clone)]
pub struct Event {
    id: EventId,
    category: Category,
    payload: serde_json::Value,
    callback_target: Option<String>,
    state: EventState,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
}

impl Event {
    pub fn new(
        category: Category,
        payload: serde_json::Value,
        callback_target: Option<String>,
    ) -> Self {
        Self::with_id(EventId::new(), category, payload, callback_target)
    }

    pub fn with_id(
        id: EventId,
        category: Category,
        payload: serde_json::Value,
        callback_target: Option<String>,
    ) -> Self {
        Self {
            id,
            category,
            payload,
            callback_target,
            state: EventState::Pending,
            created_at: Utc::now(),
            completed_at: None,
            failure_reason: None,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Callback target, if one was given and it is not blank.
    pub fn callback_target(&self) -> Option<&str> {
        self.callback_target
            .as_deref()
            .filter(|target| !target.trim().is_empty())
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub(crate) fn begin_processing(&mut self) {
        if self.state != EventState::Pending {
            tracing::warn!(
                event_id = %self.id,
                state = %self.state,
                "ignoring transition to PROCESSING"
            );
            return;
        }
        self.state = EventState::Processing;
    }

    pub(crate) fn complete(&mut self) {
        self.finish(EventState::Completed, None);
    }

    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        self.finish(EventState::Failed, Some(reason.into()));
    }

    fn finish(&mut self, state: EventState, reason: Option<String>) {
        if self.state != EventState::Processing {
            tracing::warn!(
                event_id = %self.id,
                state = %self.state,
                requested = %state,
                "ignoring transition out of PROCESSING"
            );
            return;
        }
        self.state = state;
        self.failure_reason = reason;
        self.completed_at = Some(Utc::now());
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn email() -> Event {
        Event::new(
            Category::Email,
            json!({"recipient": "user@example.com", "message": "hi"}),
            Some("http://callback.url".into()),
        )
    }

    #[test]
    fn test_new_event_is_pending() {
        let event = email();
        assert_eq!(event.state(), EventState::Pending);
        assert!(event.completed_at().is_none());
        assert!(event.failure_reason().is_none());
    }

    #[test]
    fn test_complete_sets_timestamp_only() {
        let mut event = email();
        event.begin_processing();
        assert_eq!(event.state(), EventState::Processing);
        event.complete();
        assert_eq!(event.state(), EventState::Completed);
        assert!(event.completed_at().is_some());
        assert!(event.failure_reason().is_none());
    }

    #[test]
    fn test_fail_records_reason() {
        let mut event = email();
        event.begin_processing();
        event.fail("boom");
        assert_eq!(event.state(), EventState::Failed);
        assert_eq!(event.failure_reason(), Some("boom"));
        assert!(event.completed_at().is_some());
    }

    #[test]
    fn test_terminal_state_is_absorbing() {
        let mut event = email();
        event.begin_processing();
        event.complete();
        let done_at = event.completed_at();

        event.fail("late");
        event.begin_processing();
        assert_eq!(event.state(), EventState::Completed);
        assert!(event.failure_reason().is_none());
        assert_eq!(event.completed_at(), done_at);
    }

    #[test]
    fn test_pending_event_cannot_skip_processing() {
        let mut event = email();
        event.complete();
        assert_eq!(event.state(), EventState::Pending);
        event.fail("too early");
        assert_eq!(event.state(), EventState::Pending);
        assert!(event.completed_at().is_none());
        assert!(event.failure_reason().is_none());
    }

    #[test]
    fn test_equality_by_id() {
        let id = EventId::new();
        let a = Event::with_id(id, Category::Sms, json!({}), None);
        let b = Event::with_id(id, Category::Push, json!({"x": 1}), Some("u".into()));
        assert_eq!(a, b);
        assert_ne!(a, email());
    }

    #[test]
    fn test_blank_callback_target_is_absent() {
        let event = Event::new(Category::Push, json!({}), Some("   ".into()));
        assert!(event.callback_target().is_none());
    }
}
