use super::client::{ByteStream, ChatTransport, TransportError};
use crate::types::ChatRequest;
use anyhow::Result;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One scripted answer to `open_stream`.
pub enum MockResponse {
    /// Emits each string as its own chunk, exactly as given.
    Chunks(Vec<String>),
    /// Emits the chunks, then fails the stream mid-flight.
    ChunksThenError(Vec<String>, String),
    /// Rejects the request before any byte is streamed.
    Reject(TransportError),
    /// Chunks are pushed by the test through the paired sender.
    Live(mpsc::UnboundedReceiver<Result<Bytes>>),
}

/// Transport double that replays scripted responses in order and records
/// every request it was asked to open.
#[derive(Clone, Default)]
pub struct MockChatTransport {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<(ChatRequest, String)>>>,
}

impl MockChatTransport {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::default(),
        }
    }

    /// Queues a live response and returns the sender that feeds it.
    pub fn push_live(&self) -> mpsc::UnboundedSender<Result<Bytes>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(MockResponse::Live(rx));
        tx
    }

    pub fn push(&self, response: MockResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push(response);
        }
    }

    pub fn requests(&self) -> Vec<(ChatRequest, String)> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_response(&self) -> Option<MockResponse> {
        let mut responses = self.responses.lock().ok()?;
        if responses.is_empty() {
            None
        } else {
            Some(responses.remove(0))
        }
    }
}

impl ChatTransport for MockChatTransport {
    fn open_stream(
        &self,
        request: ChatRequest,
        bearer_token: String,
    ) -> BoxFuture<'_, std::result::Result<ByteStream, TransportError>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((request, bearer_token));
        }
        let response = self.next_response();

        Box::pin(async move {
            let stream: ByteStream = match response {
                None => {
                    return Err(TransportError::Request {
                        url: "mock://chat".to_string(),
                        message: "MockChatTransport: no more responses configured".to_string(),
                    })
                }
                Some(MockResponse::Reject(error)) => return Err(error),
                Some(MockResponse::Chunks(chunks)) => Box::pin(stream::iter(
                    chunks.into_iter().map(|chunk| Ok(Bytes::from(chunk))),
                )),
                Some(MockResponse::ChunksThenError(chunks, message)) => {
                    let items: Vec<Result<Bytes>> = chunks
                        .into_iter()
                        .map(|chunk| Ok(Bytes::from(chunk)))
                        .chain(std::iter::once(Err(anyhow::anyhow!(message))))
                        .collect();
                    Box::pin(stream::iter(items))
                }
                Some(MockResponse::Live(rx)) => Box::pin(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })),
            };
            Ok(stream)
        })
    }
}
