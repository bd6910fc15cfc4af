use super::sse::SseDecoder;
use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::collections::VecDeque;
use std::pin::Pin;

/// Data payloads of one open connection, in arrival order.
pub type PayloadStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Opens push streams. A successful `open` is the connection-opened signal;
/// an error item or the end of the stream is the connection-error signal.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<PayloadStream, TransportError>;
}

/// Server-sent events over HTTP, as served by the job log server.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, url: &str) -> Result<PayloadStream, TransportError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let chunks = Box::pin(response.bytes_stream());
        let payloads = stream::unfold(
            (chunks, SseDecoder::new(), VecDeque::<String>::new()),
            |(mut chunks, mut decoder, mut ready)| async move {
                loop {
                    if let Some(data) = ready.pop_front() {
                        return Some((Ok(data), (chunks, decoder, ready)));
                    }
                    match chunks.next().await {
                        Some(Ok(chunk)) => ready.extend(
                            decoder
                                .feed(&chunk)
                                .into_iter()
                                .filter(|event| event.is_message())
                                .map(|event| event.data),
                        ),
                        Some(Err(e)) => {
                            return Some((Err(TransportError::Http(e)), (chunks, decoder, ready)))
                        }
                        None => return None,
                    }
                }
            },
        );
        Ok(Box::pin(payloads))
    }
}
