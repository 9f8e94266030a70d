//! Registry of active connection workers, keyed by subscriber identity.
//!
//! The supervisor is the control point: subscribe/unsubscribe only do map
//! surgery and signal cancellation, they never await a worker. Replacement
//! serialization happens inside the new worker, which waits for its
//! predecessor's task before connecting.

use crate::bridge::router::EventRouter;
use crate::bridge::worker::{run_worker, WorkerContext, WorkerStatus};
use crate::events::Notification;
use crate::source::{ConnectOptions, ConnectTarget, LiveSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum SubscribeError {
    InvalidTarget(String),
}

impl std::fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscribeError::InvalidTarget(raw) => write!(f, "Invalid target '{}'", raw),
        }
    }
}

impl std::error::Error for SubscribeError {}

struct WorkerHandle {
    target: ConnectTarget,
    status: Arc<Mutex<WorkerStatus>>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

pub struct ConnectionSupervisor {
    source: Arc<dyn LiveSource>,
    router: Arc<EventRouter>,
    workers: Mutex<HashMap<String, WorkerHandle>>,
}

impl ConnectionSupervisor {
    pub fn new(source: Arc<dyn LiveSource>, router: Arc<EventRouter>) -> Self {
        Self {
            source,
            router,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Start a worker for `subscriber_id` observing `target`. Any previous
    /// worker for the same subscriber has its cancellation requested before
    /// the new one is spawned; the new worker holds the old join handle and
    /// waits it out before connecting.
    pub fn subscribe(
        &self,
        subscriber_id: &str,
        target: &str,
        options: ConnectOptions,
        subscriber: mpsc::Sender<Notification>,
    ) -> Result<(), SubscribeError> {
        let target = ConnectTarget::parse(target)
            .ok_or_else(|| SubscribeError::InvalidTarget(target.to_string()))?;
        if let ConnectTarget::RoomId(ref id) = target {
            log::info!("Target is numeric, connecting via room id {}", id);
        }

        let cancel = CancellationToken::new();
        let status = Arc::new(Mutex::new(WorkerStatus::Connecting));

        let mut workers = self.workers.lock().unwrap();
        let predecessor = workers.remove(subscriber_id).map(|old| {
            old.cancel.cancel();
            log::info!(
                "Replacing worker for subscriber {} (was {})",
                subscriber_id,
                old.target
            );
            old.join
        });

        let join = tokio::spawn(run_worker(WorkerContext {
            source: self.source.clone(),
            router: self.router.clone(),
            target: target.clone(),
            options,
            subscriber,
            status: status.clone(),
            cancel: cancel.clone(),
            predecessor,
        }));

        workers.insert(
            subscriber_id.to_string(),
            WorkerHandle {
                target,
                status,
                cancel,
                join,
            },
        );
        Ok(())
    }

    /// Cancel and forget the subscriber's worker. No-op when none exists.
    pub fn unsubscribe(&self, subscriber_id: &str) {
        if let Some(handle) = self.workers.lock().unwrap().remove(subscriber_id) {
            handle.cancel.cancel();
            log::info!(
                "Cancelled worker for subscriber {} (target {})",
                subscriber_id,
                handle.target
            );
        }
    }

    pub fn status(&self, subscriber_id: &str) -> Option<WorkerStatus> {
        self.workers
            .lock()
            .unwrap()
            .get(subscriber_id)
            .map(|handle| *handle.status.lock().unwrap())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().unwrap().len()
    }
}
