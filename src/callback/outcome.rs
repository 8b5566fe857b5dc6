use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::{Category, Event, EventId, EventState};

/// Terminal status of an event as reported to its callback target.
///
/// Serializes as:
///
/// ```json
/// { "eventId": "…", "status": "FAILED", "eventType": "EMAIL",
///   "errorMessage": "Simulated processing failure",
///   "processedAt": "2024-05-01T12:00:00Z" }
/// ```
///
/// `errorMessage` is only present for failed events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub event_id: EventId,
    pub status: EventState,
    pub event_type: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(serialize_with = "utc_seconds")]
    pub processed_at: DateTime<Utc>,
}

impl Outcome {
    /// Build the outcome of a terminal event. `None` if the event is still
    /// pending or processing.
    pub fn from_event(event: &Event) -> Option<Self> {
        if !event.is_terminal() {
            return None;
        }
        let processed_at = event.completed_at()?;
        let error_message = match event.state() {
            EventState::Failed => event.failure_reason().map(str::to_owned),
            _ => None,
        };
        Some(Self {
            event_id: event.id(),
            status: event.state(),
            event_type: event.category(),
            error_message,
            processed_at,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == EventState::Completed
    }
}

fn utc_seconds<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format("%Y-%m-%dT%H:%M:%SZ"))
}
