//! End-to-end bridge tests: scripted source -> supervisor -> worker ->
//! router -> store -> aggregation.

use async_trait::async_trait;
use liveflow::bridge::{ConnectionSupervisor, EventRouter, SubscribeError, WorkerStatus};
use liveflow::events::{
    ChatPayload, GiftPayload, JoinPayload, LikePayload, LiveEvent, Notification,
};
use liveflow::prices::PriceTable;
use liveflow::source::{ConnectOptions, ConnectTarget, LiveConnection, LiveSource, SourceError};
use liveflow::stats;
use liveflow::store::{self, EventStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

type Feed = mpsc::Sender<Result<LiveEvent, SourceError>>;

/// Source controlled by the test: every connect registers a feed the test
/// can take over and push events through.
struct ScriptedSource {
    feeds: Mutex<HashMap<usize, Feed>>,
    connects: Mutex<usize>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            feeds: Mutex::new(HashMap::new()),
            connects: Mutex::new(0),
        }
    }

    /// Take ownership of the feed for the n-th connect (0-based). Dropping
    /// the returned sender ends that connection's stream.
    fn take_feed(&self, index: usize) -> Feed {
        self.feeds
            .lock()
            .unwrap()
            .remove(&index)
            .unwrap_or_else(|| panic!("no feed for connect #{}", index))
    }
}

#[async_trait]
impl LiveSource for ScriptedSource {
    async fn connect(
        &self,
        target: &ConnectTarget,
        _options: &ConnectOptions,
    ) -> Result<LiveConnection, SourceError> {
        let (tx, rx) = mpsc::channel(64);
        let mut connects = self.connects.lock().unwrap();
        self.feeds.lock().unwrap().insert(*connects, tx);
        *connects += 1;
        Ok(LiveConnection {
            room_id: target.as_str().to_string(),
            events: rx,
        })
    }
}

struct FailingSource;

#[async_trait]
impl LiveSource for FailingSource {
    async fn connect(
        &self,
        _target: &ConnectTarget,
        _options: &ConnectOptions,
    ) -> Result<LiveConnection, SourceError> {
        Err(SourceError::Connection("stream is offline".to_string()))
    }
}

/// Source whose connect never resolves, for cancel-while-connecting.
struct PendingSource;

#[async_trait]
impl LiveSource for PendingSource {
    async fn connect(
        &self,
        _target: &ConnectTarget,
        _options: &ConnectOptions,
    ) -> Result<LiveConnection, SourceError> {
        std::future::pending().await
    }
}

struct Harness {
    supervisor: ConnectionSupervisor,
    events: EventStore,
    db_path: std::path::PathBuf,
    _dir: TempDir,
}

fn harness(source: Arc<dyn LiveSource>) -> Harness {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("bridge.db");
    let db = store::open_database(&db_path).unwrap();
    let events = EventStore::new(db);
    let router = Arc::new(EventRouter::new(events.clone()));
    Harness {
        supervisor: ConnectionSupervisor::new(source, router),
        events,
        db_path,
        _dir: dir,
    }
}

fn chat(comment: &str) -> LiveEvent {
    LiveEvent::Chat(ChatPayload {
        unique_id: "viewer1".to_string(),
        nickname: "Viewer".to_string(),
        comment: comment.to_string(),
        user_id: 42,
        region: "US".to_string(),
    })
}

fn gift(gift_id: i64, repeat_count: i64) -> LiveEvent {
    LiveEvent::Gift(GiftPayload {
        unique_id: "viewer1".to_string(),
        nickname: "Viewer".to_string(),
        user_id: 42,
        region: "US".to_string(),
        gift_id,
        gift_name: "Rose".to_string(),
        repeat_count,
        gift_type: 1,
        diamond_count: 1,
    })
}

fn join() -> LiveEvent {
    LiveEvent::Join(JoinPayload {
        unique_id: "viewer2".to_string(),
        nickname: "Other".to_string(),
    })
}

fn like() -> LiveEvent {
    LiveEvent::Like(LikePayload {
        unique_id: "viewer1".to_string(),
        nickname: "Viewer".to_string(),
        user_id: 42,
        like_count: 5,
        total_like_count: 100,
    })
}

async fn next(rx: &mut mpsc::Receiver<Notification>) -> Notification {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification channel closed")
}

#[tokio::test]
async fn test_subscribe_forwards_in_order_and_persists_selectively() {
    let scripted = Arc::new(ScriptedSource::new());
    let h = harness(scripted.clone());
    let (tx, mut rx) = mpsc::channel(64);

    h.supervisor
        .subscribe("sub1", "12345", ConnectOptions::default(), tx)
        .unwrap();

    assert!(matches!(next(&mut rx).await, Notification::Connected { .. }));
    assert_eq!(h.supervisor.status("sub1"), Some(WorkerStatus::Connected));

    let feed = scripted.take_feed(0);
    feed.send(Ok(chat("hello"))).await.unwrap();
    feed.send(Ok(gift(7, 2))).await.unwrap();
    feed.send(Ok(join())).await.unwrap();
    feed.send(Ok(like())).await.unwrap();

    assert!(matches!(next(&mut rx).await, Notification::Chat(ref p) if p.comment == "hello"));
    assert!(matches!(next(&mut rx).await, Notification::Gift(ref p) if p.gift_id == 7));
    assert!(matches!(next(&mut rx).await, Notification::Member(_)));
    assert!(matches!(next(&mut rx).await, Notification::Like(_)));

    // End the stream; once the disconnect arrives every route has completed
    drop(feed);
    assert!(
        matches!(next(&mut rx).await, Notification::Disconnected { ref reason } if reason == "Connection Closed")
    );

    // Aggregation read path sees chat + gift, in order
    let stored = h.events.events_for_room("12345").unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].kind.as_str(), "chat");
    assert_eq!(stored[1].kind.as_str(), "gift");

    // Raw rows: like persisted too, join never
    let conn = rusqlite::Connection::open(&h.db_path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 3);
    let joins: i64 = conn
        .query_row("SELECT COUNT(*) FROM events WHERE type = 'join'", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(joins, 0);
}

#[tokio::test]
async fn test_resubscribe_replaces_worker_without_overlap() {
    let scripted = Arc::new(ScriptedSource::new());
    let h = harness(scripted.clone());
    let (tx, mut rx) = mpsc::channel(64);

    h.supervisor
        .subscribe("sub1", "111", ConnectOptions::default(), tx.clone())
        .unwrap();
    assert!(matches!(next(&mut rx).await, Notification::Connected { .. }));
    let old_feed = scripted.take_feed(0);

    // Replace while the first connection is live
    h.supervisor
        .subscribe("sub1", "222", ConnectOptions::default(), tx.clone())
        .unwrap();

    // The old worker winds down before the new one connects
    assert!(
        matches!(next(&mut rx).await, Notification::Disconnected { ref reason } if reason == "Connection Closed")
    );
    assert!(matches!(next(&mut rx).await, Notification::Connected { .. }));

    // The old connection is released: its feed has no receiver anymore
    assert!(old_feed.send(Ok(chat("stale"))).await.is_err());

    // The new worker forwards
    let new_feed = scripted.take_feed(1);
    new_feed.send(Ok(chat("fresh"))).await.unwrap();
    assert!(matches!(next(&mut rx).await, Notification::Chat(ref p) if p.comment == "fresh"));

    assert_eq!(h.supervisor.worker_count(), 1);
}

#[tokio::test]
async fn test_unsubscribe_cancels_and_is_idempotent() {
    let scripted = Arc::new(ScriptedSource::new());
    let h = harness(scripted.clone());
    let (tx, mut rx) = mpsc::channel(64);

    h.supervisor
        .subscribe("sub1", "111", ConnectOptions::default(), tx)
        .unwrap();
    assert!(matches!(next(&mut rx).await, Notification::Connected { .. }));

    h.supervisor.unsubscribe("sub1");
    assert!(
        matches!(next(&mut rx).await, Notification::Disconnected { ref reason } if reason == "Connection Closed")
    );
    assert_eq!(h.supervisor.worker_count(), 0);

    // Second unsubscribe is a no-op
    h.supervisor.unsubscribe("sub1");
    h.supervisor.unsubscribe("never-subscribed");
}

#[tokio::test]
async fn test_invalid_target_rejected_before_spawn() {
    let h = harness(Arc::new(ScriptedSource::new()));
    let (tx, mut rx) = mpsc::channel(64);

    let err = h
        .supervisor
        .subscribe("sub1", "   ", ConnectOptions::default(), tx)
        .unwrap_err();

    assert!(matches!(err, SubscribeError::InvalidTarget(_)));
    assert_eq!(h.supervisor.worker_count(), 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_connect_failure_reports_error_reason() {
    let h = harness(Arc::new(FailingSource));
    let (tx, mut rx) = mpsc::channel(64);

    h.supervisor
        .subscribe("sub1", "111", ConnectOptions::default(), tx)
        .unwrap();

    match next(&mut rx).await {
        Notification::Disconnected { reason } => {
            assert!(reason.starts_with("Error:"), "got reason '{}'", reason);
            assert!(reason.contains("stream is offline"));
        }
        other => panic!("expected disconnected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_while_connecting() {
    let h = harness(Arc::new(PendingSource));
    let (tx, mut rx) = mpsc::channel(64);

    h.supervisor
        .subscribe("sub1", "111", ConnectOptions::default(), tx)
        .unwrap();
    assert_eq!(h.supervisor.status("sub1"), Some(WorkerStatus::Connecting));

    h.supervisor.unsubscribe("sub1");
    assert!(
        matches!(next(&mut rx).await, Notification::Disconnected { ref reason } if reason == "Connection Closed")
    );
}

#[tokio::test]
async fn test_stream_error_disconnects_with_detail() {
    let scripted = Arc::new(ScriptedSource::new());
    let h = harness(scripted.clone());
    let (tx, mut rx) = mpsc::channel(64);

    h.supervisor
        .subscribe("sub1", "111", ConnectOptions::default(), tx)
        .unwrap();
    assert!(matches!(next(&mut rx).await, Notification::Connected { .. }));

    let feed = scripted.take_feed(0);
    feed.send(Err(SourceError::Protocol("corrupt frame".to_string())))
        .await
        .unwrap();

    match next(&mut rx).await {
        Notification::Disconnected { reason } => {
            assert_eq!(reason, "Error: Protocol error: corrupt frame");
        }
        other => panic!("expected disconnected, got {:?}", other),
    }
    assert_eq!(h.supervisor.status("sub1"), Some(WorkerStatus::Disconnected));
}

#[tokio::test]
async fn test_worker_failure_is_isolated_per_subscriber() {
    let scripted = Arc::new(ScriptedSource::new());
    let h = harness(scripted.clone());
    let (tx1, mut rx1) = mpsc::channel(64);
    let (tx2, mut rx2) = mpsc::channel(64);

    h.supervisor
        .subscribe("sub1", "111", ConnectOptions::default(), tx1)
        .unwrap();
    assert!(matches!(next(&mut rx1).await, Notification::Connected { .. }));
    h.supervisor
        .subscribe("sub2", "222", ConnectOptions::default(), tx2)
        .unwrap();
    assert!(matches!(next(&mut rx2).await, Notification::Connected { .. }));
    assert_eq!(h.supervisor.worker_count(), 2);

    // Kill sub1's stream
    let feed1 = scripted.take_feed(0);
    feed1
        .send(Err(SourceError::Connection("reset".to_string())))
        .await
        .unwrap();
    assert!(matches!(next(&mut rx1).await, Notification::Disconnected { .. }));

    // sub2 keeps forwarding
    let feed2 = scripted.take_feed(1);
    feed2.send(Ok(chat("still here"))).await.unwrap();
    assert!(matches!(next(&mut rx2).await, Notification::Chat(ref p) if p.comment == "still here"));
}

#[tokio::test]
async fn test_recorded_events_aggregate_with_live_prices() {
    let scripted = Arc::new(ScriptedSource::new());
    let h = harness(scripted.clone());
    let prices_dir = TempDir::new().unwrap();
    let prices = PriceTable::load(prices_dir.path().join("prices.json"));
    prices.set_price("7", 5.0).unwrap();

    let (tx, mut rx) = mpsc::channel(64);
    h.supervisor
        .subscribe("sub1", "999", ConnectOptions::default(), tx)
        .unwrap();
    assert!(matches!(next(&mut rx).await, Notification::Connected { .. }));

    let feed = scripted.take_feed(0);
    feed.send(Ok(chat("nice"))).await.unwrap();
    feed.send(Ok(gift(7, 2))).await.unwrap();
    feed.send(Ok(gift(8, 1))).await.unwrap();
    drop(feed);
    assert!(matches!(next(&mut rx).await, Notification::Chat(_)));
    assert!(matches!(next(&mut rx).await, Notification::Gift(_)));
    assert!(matches!(next(&mut rx).await, Notification::Gift(_)));
    assert!(matches!(next(&mut rx).await, Notification::Disconnected { .. }));

    let events = h.events.events_for_room("999").unwrap();
    let buckets = stats::aggregate(&events, &prices.snapshot());
    let income: f64 = buckets.iter().map(|b| b.income).sum();
    let comments: u64 = buckets.iter().map(|b| b.comments).sum();
    assert_eq!(income, 10.0); // gift 8 has no price yet
    assert_eq!(comments, 1);

    // Pricing the second gift re-values the same history on the next query
    prices.set_price("8", 2.0).unwrap();
    let buckets = stats::aggregate(&events, &prices.snapshot());
    let income: f64 = buckets.iter().map(|b| b.income).sum();
    assert_eq!(income, 12.0);
}
