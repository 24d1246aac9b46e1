use crate::api::{ByteStream, ChatTransport, FrameDecoder, TransportError};
use crate::types::{ChatRequest, Frame};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Message from a read task to its coordinator, tagged with the send
/// generation it belongs to.
#[derive(Debug)]
pub(crate) struct StreamUpdate {
    pub generation: u64,
    pub kind: StreamUpdateKind,
}

#[derive(Debug)]
pub(crate) enum StreamUpdateKind {
    /// The first byte arrived.
    Opened,
    Frame(Frame),
    /// The request was rejected or never reached the server.
    OpenFailed(TransportError),
    /// The byte stream failed or stalled after opening.
    Aborted(String),
    /// The byte stream closed without a `done` frame.
    Ended,
}

pub(crate) struct ReadTask {
    pub transport: Arc<dyn ChatTransport>,
    pub request: ChatRequest,
    pub bearer_token: String,
    pub generation: u64,
    pub idle_timeout: Option<Duration>,
    pub cancel: CancellationToken,
    pub update_tx: mpsc::UnboundedSender<StreamUpdate>,
}

impl ReadTask {
    pub async fn run(self) {
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(generation = self.generation, "read task abandoned");
            }
            _ = self.pump() => {}
        }
    }

    async fn pump(&self) {
        let opened = self
            .transport
            .open_stream(self.request.clone(), self.bearer_token.clone())
            .await;
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(error) => {
                tracing::warn!(generation = self.generation, %error, "chat stream failed to open");
                self.emit(StreamUpdateKind::OpenFailed(error));
                return;
            }
        };

        let mut decoder = FrameDecoder::new();
        let mut saw_bytes = false;
        loop {
            let chunk = match next_chunk(&mut stream, self.idle_timeout).await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    let dropped = decoder.finish();
                    if dropped > 0 {
                        tracing::debug!(dropped, "discarding incomplete trailing frame");
                    }
                    tracing::warn!(generation = self.generation, "chat stream closed without done");
                    self.emit(StreamUpdateKind::Ended);
                    return;
                }
                Err(error) => {
                    tracing::warn!(generation = self.generation, %error, "chat stream aborted");
                    self.emit(StreamUpdateKind::Aborted(error.to_string()));
                    return;
                }
            };

            if !saw_bytes && !chunk.is_empty() {
                saw_bytes = true;
                self.emit(StreamUpdateKind::Opened);
            }

            for frame in decoder.process(&chunk) {
                let terminal = frame.is_terminal();
                if !self.emit(StreamUpdateKind::Frame(frame)) || terminal {
                    return;
                }
            }
        }
    }

    /// Returns false once the coordinator is gone.
    fn emit(&self, kind: StreamUpdateKind) -> bool {
        self.update_tx
            .send(StreamUpdate {
                generation: self.generation,
                kind,
            })
            .is_ok()
    }
}

async fn next_chunk(
    stream: &mut ByteStream,
    idle_timeout: Option<Duration>,
) -> Result<Option<Bytes>> {
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| anyhow!("no data received for {limit:?}"))?,
        None => stream.next().await,
    };
    next.transpose()
}
