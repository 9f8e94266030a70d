//! Per-event glue: forward to the subscriber, persist the persistable kinds.

use crate::events::{LiveEvent, Notification};
use crate::store::EventStore;
use tokio::sync::mpsc;

pub struct EventRouter {
    events: EventStore,
}

impl EventRouter {
    pub fn new(events: EventStore) -> Self {
        Self { events }
    }

    /// Forward `event` to the subscriber and, for chat/gift/like, append it to
    /// the event log. Persistence is best-effort: a failed write is logged and
    /// never interrupts forwarding or the worker.
    pub async fn route(
        &self,
        room_id: &str,
        event: LiveEvent,
        subscriber: &mpsc::Sender<Notification>,
    ) {
        let kind = event.kind();
        let record = kind.is_persisted().then(|| event.clone());

        if subscriber.send(Notification::from(event)).await.is_err() {
            log::debug!(
                "Subscriber channel closed, dropped {} event for room {}",
                kind.as_str(),
                room_id
            );
        }

        if let Some(event) = record {
            if let Err(e) = self.events.log_event(room_id, &event) {
                log::warn!(
                    "⚠️  Failed to persist {} event for room {}: {}",
                    kind.as_str(),
                    room_id,
                    e
                );
            }
        }
    }
}
