use super::transport::{PayloadStream, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

pub(crate) type Feed = UnboundedSender<Result<String, TransportError>>;

/// Outcome of one `open` call.
pub(crate) enum Script {
    Refuse,
    Open(UnboundedReceiver<Result<String, TransportError>>),
}

impl Script {
    pub(crate) fn refuse() -> Self {
        Script::Refuse
    }

    /// An open stream plus the sender that feeds it payloads.
    pub(crate) fn open() -> (Feed, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Script::Open(rx))
    }
}

#[derive(Default)]
struct Inner {
    scripts: HashMap<String, VecDeque<Script>>,
    attempts: HashMap<String, Vec<Instant>>,
}

/// In-memory transport that replays scripted outcomes per URL. When a URL's
/// script runs out, further attempts are refused.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(&self, url: &str, scripts: Vec<Script>) {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .entry(url.to_string())
            .or_default()
            .extend(scripts);
    }

    pub(crate) fn attempts(&self, url: &str) -> Vec<Instant> {
        self.inner
            .lock()
            .unwrap()
            .attempts
            .get(url)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, url: &str) -> Result<PayloadStream, TransportError> {
        let next = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .attempts
                .entry(url.to_string())
                .or_default()
                .push(Instant::now());
            inner.scripts.get_mut(url).and_then(VecDeque::pop_front)
        };
        match next {
            Some(Script::Open(rx)) => Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }))),
            Some(Script::Refuse) | None => Err(TransportError::Status(503)),
        }
    }
}
