//! Push-stream connections, one per viewer.
//!
//! Each connection runs as a task on the tokio runtime and talks to its
//! viewer only through an unbounded channel of [`StreamEvent`]s. Records are
//! coalesced into batches on a short timer; failures reconnect after a fixed
//! delay, forever, until [`ConnectionManager::disconnect`] is called.

pub mod sse;
#[cfg(test)]
pub(crate) mod testing;
pub mod transport;

use crate::record::split_payload;
use futures_util::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};

pub use transport::{HttpTransport, PayloadStream, Transport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamSettings {
    pub batch_interval: Duration,
    pub retry_delay: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            batch_interval: Duration::from_millis(16),
            retry_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
pub enum StreamEvent {
    Opened,
    /// Raw records, not yet decoded.
    Batch(Vec<Value>),
    Error { message: String, retry_count: u32 },
}

/// Point-in-time view of one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub url: String,
    pub is_connecting: bool,
    pub retry_count: u32,
    pub pending: usize,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Shared {
    is_connecting: bool,
    retry_count: u32,
    pending: Vec<Value>,
    last_error: Option<String>,
    closed: bool,
}

struct Connection {
    url: String,
    shared: Arc<Mutex<Shared>>,
    events: UnboundedSender<StreamEvent>,
    task: JoinHandle<()>,
}

pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,
    runtime: Handle,
    settings: StreamSettings,
    connections: HashMap<String, Connection>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, runtime: Handle, settings: StreamSettings) -> Self {
        Self {
            transport: Arc::new(transport),
            runtime,
            settings,
            connections: HashMap::new(),
        }
    }

    /// Open the connection for `id`, replacing any previous one.
    pub fn connect(&mut self, id: &str, url: &str) -> UnboundedReceiver<StreamEvent> {
        self.disconnect(id);

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(Shared {
            is_connecting: true,
            ..Shared::default()
        }));
        let task = self.runtime.spawn(run_connection(
            Arc::clone(&self.transport),
            id.to_string(),
            url.to_string(),
            Arc::clone(&shared),
            tx.clone(),
            self.settings,
        ));
        tracing::info!(id, url, "stream connecting");

        self.connections.insert(
            id.to_string(),
            Connection {
                url: url.to_string(),
                shared,
                events: tx,
                task,
            },
        );
        rx
    }

    /// Close the connection for `id`, delivering any records still waiting
    /// for the batch timer. Unknown ids are ignored. Returns whether a
    /// connection was closed.
    pub fn disconnect(&mut self, id: &str) -> bool {
        let Some(conn) = self.connections.remove(id) else {
            return false;
        };
        {
            let mut shared = lock(&conn.shared);
            shared.closed = true;
            let tail = std::mem::take(&mut shared.pending);
            if !tail.is_empty() {
                let _ = conn.events.send(StreamEvent::Batch(tail));
            }
        }
        conn.task.abort();
        tracing::info!(id, "stream disconnected");
        true
    }

    pub fn snapshot(&self, id: &str) -> Option<ConnectionSnapshot> {
        self.connections.get(id).map(|conn| {
            let shared = lock(&conn.shared);
            ConnectionSnapshot {
                url: conn.url.clone(),
                is_connecting: shared.is_connecting,
                retry_count: shared.retry_count,
                pending: shared.pending.len(),
                last_error: shared.last_error.clone(),
            }
        })
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        for conn in self.connections.values() {
            conn.task.abort();
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Send `event` unless the connection was closed. The lock is held across
/// the send so nothing can follow the final flush made by `disconnect`.
fn emit(shared: &Mutex<Shared>, tx: &UnboundedSender<StreamEvent>, event: StreamEvent) -> bool {
    let guard = lock(shared);
    if guard.closed {
        return false;
    }
    tx.send(event).is_ok()
}

fn flush(shared: &Mutex<Shared>, tx: &UnboundedSender<StreamEvent>) {
    let mut guard = lock(shared);
    if guard.closed || guard.pending.is_empty() {
        return;
    }
    let batch = std::mem::take(&mut guard.pending);
    let _ = tx.send(StreamEvent::Batch(batch));
}

async fn run_connection<T: Transport>(
    transport: Arc<T>,
    id: String,
    url: String,
    shared: Arc<Mutex<Shared>>,
    tx: UnboundedSender<StreamEvent>,
    settings: StreamSettings,
) {
    loop {
        lock(&shared).is_connecting = true;

        let message = match transport.open(&url).await {
            Ok(payloads) => {
                {
                    let mut guard = lock(&shared);
                    guard.is_connecting = false;
                    guard.retry_count = 0;
                    guard.last_error = None;
                }
                tracing::info!(id = %id, "stream opened");
                if !emit(&shared, &tx, StreamEvent::Opened) {
                    return;
                }
                let message = pump(payloads, &shared, &tx, settings.batch_interval).await;
                // Records already received are delivered before the error.
                flush(&shared, &tx);
                message
            }
            Err(e) => e.to_string(),
        };

        let retry_count = {
            let mut guard = lock(&shared);
            guard.is_connecting = false;
            guard.retry_count += 1;
            guard.last_error = Some(message.clone());
            guard.retry_count
        };
        tracing::warn!(id = %id, retry_count, error = %message, "stream failed, retrying");
        if !emit(
            &shared,
            &tx,
            StreamEvent::Error {
                message,
                retry_count,
            },
        ) {
            return;
        }
        sleep(settings.retry_delay).await;
    }
}

/// Forward payloads into micro-batches until the stream fails or ends.
async fn pump(
    mut payloads: PayloadStream,
    shared: &Mutex<Shared>,
    tx: &UnboundedSender<StreamEvent>,
    interval: Duration,
) -> String {
    let mut deadline: Option<Instant> = None;
    loop {
        tokio::select! {
            item = payloads.next() => match item {
                Some(Ok(payload)) => {
                    let records = match split_payload(&payload) {
                        Ok(records) => records,
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping unparsable batch");
                            continue;
                        }
                    };
                    if records.is_empty() {
                        continue;
                    }
                    {
                        let mut guard = lock(shared);
                        if guard.closed {
                            continue;
                        }
                        guard.pending.extend(records);
                    }
                    if deadline.is_none() {
                        deadline = Some(Instant::now() + interval);
                    }
                }
                Some(Err(e)) => return e.to_string(),
                None => return crate::error::TransportError::Closed.to_string(),
            },
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                flush(shared, tx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Script, ScriptedTransport};
    use super::*;
    use crate::error::TransportError;

    fn manager(transport: ScriptedTransport) -> ConnectionManager<ScriptedTransport> {
        ConnectionManager::new(transport, Handle::current(), StreamSettings::default())
    }

    fn record(line: u64) -> String {
        format!(r#"{{"message":"line {line}","line":{line}}}"#)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_every_five_seconds_until_open() {
        let transport = ScriptedTransport::new();
        let mut scripts: Vec<Script> = (0..50).map(|_| Script::refuse()).collect();
        let (_feed, open) = Script::open();
        scripts.push(open);
        transport.script("http://logs/job", scripts);

        let mut manager = manager(transport.clone());
        let mut rx = manager.connect("job", "http://logs/job");

        for expected in 1..=50u32 {
            match rx.recv().await {
                Some(StreamEvent::Error { retry_count, .. }) => assert_eq!(retry_count, expected),
                other => panic!("expected error event, got {other:?}"),
            }
        }
        assert_eq!(manager.snapshot("job").unwrap().retry_count, 50);

        assert!(matches!(rx.recv().await, Some(StreamEvent::Opened)));
        let snapshot = manager.snapshot("job").unwrap();
        assert_eq!(snapshot.retry_count, 0);
        assert!(!snapshot.is_connecting);
        assert_eq!(snapshot.last_error, None);

        let attempts = transport.attempts("http://logs/job");
        assert_eq!(attempts.len(), 51);
        for pair in attempts.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_delivered_as_one_batch() {
        let transport = ScriptedTransport::new();
        let (feed, open) = Script::open();
        transport.script("u", vec![open]);
        let mut manager = manager(transport);
        let mut rx = manager.connect("job", "u");
        assert!(matches!(rx.recv().await, Some(StreamEvent::Opened)));

        let started = Instant::now();
        for line in 1..=3 {
            feed.send(Ok(record(line))).unwrap();
        }
        feed.send(Ok(format!("[{},{}]", record(4), record(5)))).unwrap();
        feed.send(Ok("not json".to_string())).unwrap();

        match rx.recv().await {
            Some(StreamEvent::Batch(batch)) => {
                assert_eq!(batch.len(), 5);
                assert_eq!(batch[0]["line"], 1);
                assert_eq!(batch[4]["line"], 5);
            }
            other => panic!("expected batch, got {other:?}"),
        }
        assert!(started.elapsed() <= Duration::from_millis(16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_flushes_tail_once() {
        let transport = ScriptedTransport::new();
        let (feed, open) = Script::open();
        transport.script("u", vec![open]);
        let mut manager = manager(transport);
        let mut rx = manager.connect("job", "u");
        assert!(matches!(rx.recv().await, Some(StreamEvent::Opened)));

        feed.send(Ok(record(1))).unwrap();
        feed.send(Ok(record(2))).unwrap();
        sleep(Duration::from_millis(5)).await;
        assert_eq!(manager.snapshot("job").unwrap().pending, 2);

        assert!(manager.disconnect("job"));
        match rx.try_recv() {
            Ok(StreamEvent::Batch(batch)) => assert_eq!(batch.len(), 2),
            other => panic!("expected flushed batch, got {other:?}"),
        }

        assert!(!manager.disconnect("job"));
        assert!(manager.snapshot("job").is_none());
        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_retry() {
        let transport = ScriptedTransport::new();
        transport.script("u", vec![Script::refuse()]);
        let mut manager = manager(transport.clone());
        let mut rx = manager.connect("job", "u");

        match rx.recv().await {
            Some(StreamEvent::Error { retry_count, .. }) => assert_eq!(retry_count, 1),
            other => panic!("expected error event, got {other:?}"),
        }
        sleep(Duration::from_secs(2)).await;
        assert!(manager.disconnect("job"));

        sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.attempts("u").len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_end_reconnects_with_same_url() {
        let transport = ScriptedTransport::new();
        let (feed, first) = Script::open();
        let (_feed2, second) = Script::open();
        transport.script("u", vec![first, second]);
        let mut manager = manager(transport.clone());
        let mut rx = manager.connect("job", "u");
        assert!(matches!(rx.recv().await, Some(StreamEvent::Opened)));

        feed.send(Ok(record(1))).unwrap();
        feed.send(Err(TransportError::Other("reset".to_string()))).unwrap();

        match rx.recv().await {
            Some(StreamEvent::Batch(batch)) => assert_eq!(batch.len(), 1),
            other => panic!("expected batch before error, got {other:?}"),
        }
        match rx.recv().await {
            Some(StreamEvent::Error { message, retry_count }) => {
                assert_eq!(message, "reset");
                assert_eq!(retry_count, 1);
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert!(matches!(rx.recv().await, Some(StreamEvent::Opened)));
        assert_eq!(transport.attempts("u").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_replaces_previous() {
        let transport = ScriptedTransport::new();
        let (_a, first) = Script::open();
        let (_b, second) = Script::open();
        transport.script("u", vec![first, second]);
        let mut manager = manager(transport.clone());
        let _old = manager.connect("job", "u");
        let mut rx = manager.connect("job", "u");
        assert!(matches!(rx.recv().await, Some(StreamEvent::Opened)));
        assert_eq!(manager.len(), 1);
        assert!(manager.is_connected("job"));
        assert!(!manager.disconnect("other"));
    }
}
