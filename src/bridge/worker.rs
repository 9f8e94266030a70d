//! The connection worker: a cancellable task owning one external stream
//! connection for one subscriber.
//!
//! Lifecycle: Connecting -> Connected -> Disconnected, with Error on any
//! connect/receive failure. Disconnected is terminal and always announced to
//! the subscriber exactly once.

use crate::bridge::router::EventRouter;
use crate::events::Notification;
use crate::source::{ConnectOptions, ConnectTarget, LiveSource};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

pub(crate) struct WorkerContext {
    pub source: Arc<dyn LiveSource>,
    pub router: Arc<EventRouter>,
    pub target: ConnectTarget,
    pub options: ConnectOptions,
    pub subscriber: mpsc::Sender<Notification>,
    pub status: Arc<Mutex<WorkerStatus>>,
    pub cancel: CancellationToken,
    /// Join handle of the worker this one replaces; awaited before touching
    /// the wire so two workers for the same subscriber never forward at once.
    pub predecessor: Option<JoinHandle<()>>,
}

pub(crate) async fn run_worker(ctx: WorkerContext) {
    let WorkerContext {
        source,
        router,
        target,
        options,
        subscriber,
        status,
        cancel,
        predecessor,
    } = ctx;

    if let Some(previous) = predecessor {
        let _ = previous.await;
    }

    set_status(&status, WorkerStatus::Connecting);

    // The provider only ever sees sanitized options
    let options = options.sanitized();

    let connection = tokio::select! {
        _ = cancel.cancelled() => {
            set_status(&status, WorkerStatus::Disconnected);
            notify(&subscriber, Notification::disconnected("Connection Closed")).await;
            return;
        }
        result = source.connect(&target, &options) => match result {
            Ok(connection) => connection,
            Err(e) => {
                log::error!("❌ Connection to {} failed: {}", target, e);
                set_status(&status, WorkerStatus::Error);
                notify(&subscriber, Notification::disconnected(format!("Error: {}", e))).await;
                set_status(&status, WorkerStatus::Disconnected);
                return;
            }
        }
    };

    set_status(&status, WorkerStatus::Connected);
    notify(&subscriber, Notification::connected()).await;
    log::info!("🔌 Connected to {} (room {})", target, connection.room_id);

    let room_id = connection.room_id;
    let mut events = connection.events;
    let mut reason = "Connection Closed".to_string();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = events.recv() => match next {
                Some(Ok(event)) => router.route(&room_id, event, &subscriber).await,
                Some(Err(e)) => {
                    log::error!("❌ Stream from {} failed: {}", target, e);
                    set_status(&status, WorkerStatus::Error);
                    reason = format!("Error: {}", e);
                    break;
                }
                // Source ended the stream
                None => break,
            }
        }
    }

    // Releases the external connection
    drop(events);
    set_status(&status, WorkerStatus::Disconnected);
    notify(&subscriber, Notification::disconnected(reason.clone())).await;
    log::info!("🔌 Disconnected from {} ({})", target, reason);
}

fn set_status(status: &Arc<Mutex<WorkerStatus>>, next: WorkerStatus) {
    *status.lock().unwrap() = next;
}

async fn notify(subscriber: &mpsc::Sender<Notification>, notification: Notification) {
    // Best effort: the subscriber may already be gone
    let _ = subscriber.send(notification).await;
}
