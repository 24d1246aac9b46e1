use super::reader::{ReadTask, StreamUpdate, StreamUpdateKind};
use super::state::{SendError, SessionSnapshot, SessionState, SessionView};
use crate::api::client::GENERIC_OPEN_FAILURE;
use crate::api::{ChatTransport, ThreadDirectory, TransportError};
use crate::auth::TokenProvider;
use crate::state::{dispatch, DispatchOutcome, StreamAccumulator};
use crate::types::{ChatRequest, ThreadRef};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const TRUNCATED_STREAM_MESSAGE: &str = "The response ended before it was complete. Please try again.";

pub type ChangeListener = Box<dyn FnMut(SessionView<'_>) + Send>;

struct ActiveStream {
    generation: u64,
    cancel: CancellationToken,
}

/// Owns the stream lifecycle for one visible conversation.
///
/// At most one read task is live at a time. Every update it sends is tagged
/// with the generation of the send that spawned it, and anything from an
/// older generation is dropped before it reaches the accumulator.
pub struct SessionCoordinator {
    transport: Arc<dyn ChatTransport>,
    auth: Arc<dyn TokenProvider>,
    threads: Arc<ThreadDirectory>,
    idle_timeout: Option<Duration>,
    active_thread: Option<String>,
    state: SessionState,
    accumulator: StreamAccumulator,
    generation: u64,
    active: Option<ActiveStream>,
    update_tx: mpsc::UnboundedSender<StreamUpdate>,
    update_rx: mpsc::UnboundedReceiver<StreamUpdate>,
    listeners: Vec<ChangeListener>,
}

impl SessionCoordinator {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        auth: Arc<dyn TokenProvider>,
        threads: Arc<ThreadDirectory>,
    ) -> Self {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            auth,
            threads,
            idle_timeout: None,
            active_thread: None,
            state: SessionState::Idle,
            accumulator: StreamAccumulator::default(),
            generation: 0,
            active: None,
            update_tx,
            update_rx,
            listeners: Vec::new(),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn active_thread(&self) -> Option<&str> {
        self.active_thread.as_deref()
    }

    pub fn accumulator(&self) -> &StreamAccumulator {
        &self.accumulator
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.view().to_snapshot()
    }

    pub fn threads(&self) -> &Arc<ThreadDirectory> {
        &self.threads
    }

    /// Registers a callback fired after every state or accumulator change.
    pub fn on_accumulator_change<F>(&mut self, listener: F)
    where
        F: FnMut(SessionView<'_>) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Switches the visible thread. Any in-flight stream is abandoned and its
    /// accumulator discarded. Reselecting the current thread does nothing.
    pub fn select_thread(&mut self, thread_id: Option<String>) {
        if self.active_thread == thread_id {
            return;
        }
        self.abandon_active();
        tracing::debug!(from = ?self.active_thread, to = ?thread_id, "thread selected");
        self.active_thread = thread_id;
        self.state = SessionState::Idle;
        self.accumulator = StreamAccumulator::default();
        self.notify();
    }

    /// Starts streaming an answer to `message` on the selected thread.
    ///
    /// Must be called from within a tokio runtime; the read task is spawned
    /// immediately. Drive it with [`Self::next_update`].
    pub fn send(&mut self, message: &str) -> Result<(), SendError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        let Some(bearer_token) = self.auth.token() else {
            return Err(SendError::MissingCredential);
        };
        let Some(thread_id) = self.active_thread.clone() else {
            return Err(SendError::NoThreadSelected);
        };
        if self.state.is_in_flight() {
            return Err(SendError::Busy);
        }

        self.abandon_active();
        self.generation += 1;
        let cancel = CancellationToken::new();
        self.active = Some(ActiveStream {
            generation: self.generation,
            cancel: cancel.clone(),
        });
        self.accumulator = StreamAccumulator::live();
        self.state = SessionState::Sending;

        tracing::info!(thread_id = %thread_id, generation = self.generation, "sending chat message");
        let task = ReadTask {
            transport: Arc::clone(&self.transport),
            request: ChatRequest {
                message: message.to_string(),
                thread_id: Some(thread_id),
            },
            bearer_token,
            generation: self.generation,
            idle_timeout: self.idle_timeout,
            cancel,
            update_tx: self.update_tx.clone(),
        };
        tokio::spawn(task.run());

        self.notify();
        Ok(())
    }

    /// Waits for and applies the next update of the live stream.
    ///
    /// Returns the resulting state, or `None` when no stream is live. Safe to
    /// use as a `tokio::select!` branch.
    pub async fn next_update(&mut self) -> Option<SessionState> {
        loop {
            let generation = self.active.as_ref()?.generation;
            let update = self.update_rx.recv().await?;
            if update.generation != generation {
                tracing::trace!(stale = update.generation, live = generation, "dropping stale stream update");
                continue;
            }
            self.apply_update(update.kind);
            return Some(self.state);
        }
    }

    /// Applies updates until the live stream finishes or is abandoned.
    pub async fn run_until_settled(&mut self) -> SessionState {
        while self.next_update().await.is_some() {}
        self.state
    }

    /// Creates a thread and makes it the active one.
    pub async fn start_new_thread(&mut self) -> Result<ThreadRef> {
        let thread = self.threads.create_thread().await?;
        self.select_thread(Some(thread.id.clone()));
        Ok(thread)
    }

    /// Deletes a thread and deselects it if it was the active one.
    pub async fn delete_thread(&mut self, thread_id: &str) -> Result<()> {
        self.threads.delete_thread(thread_id).await?;
        if self.active_thread.as_deref() == Some(thread_id) {
            self.select_thread(None);
        }
        Ok(())
    }

    fn apply_update(&mut self, update: StreamUpdateKind) {
        match update {
            StreamUpdateKind::Opened => {
                if self.state == SessionState::Sending {
                    self.state = SessionState::Streaming;
                    self.notify();
                }
            }
            StreamUpdateKind::Frame(frame) => {
                let was_sending = self.state == SessionState::Sending;
                if was_sending {
                    self.state = SessionState::Streaming;
                }
                match dispatch(&mut self.accumulator, &frame) {
                    DispatchOutcome::Terminal => self.complete(),
                    outcome if outcome.mutated() || was_sending => self.notify(),
                    _ => {}
                }
            }
            StreamUpdateKind::OpenFailed(error) => self.fail(user_message(&error)),
            StreamUpdateKind::Aborted(message) => self.fail(message),
            StreamUpdateKind::Ended => self.fail(TRUNCATED_STREAM_MESSAGE.to_string()),
        }
    }

    /// Marks the attempt completed. The directory refresh runs on its own task.
    fn complete(&mut self) {
        self.accumulator.close();
        self.state = SessionState::Completed;
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
        tracing::info!(
            thread_id = ?self.active_thread,
            generation = self.generation,
            chars = self.accumulator.display_text().len(),
            "chat stream completed"
        );
        self.notify();

        let threads = Arc::clone(&self.threads);
        tokio::spawn(async move {
            if let Err(error) = threads.refresh().await {
                tracing::warn!(%error, "thread list refresh failed after completion");
            }
        });
    }

    /// Ends the attempt. Before the first byte nothing partial is kept;
    /// mid-stream the received content stays visible beside the error.
    fn fail(&mut self, message: String) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
        if self.state == SessionState::Sending {
            self.accumulator = StreamAccumulator::failed(message);
        } else {
            self.accumulator.close();
            self.accumulator.error = Some(message);
        }
        self.state = SessionState::Failed;
        tracing::warn!(
            thread_id = ?self.active_thread,
            generation = self.generation,
            error = ?self.accumulator.error,
            "chat stream failed"
        );
        self.notify();
    }

    fn abandon_active(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!(generation = active.generation, "abandoning live stream");
            active.cancel.cancel();
            self.accumulator.close();
        }
    }

    fn view(&self) -> SessionView<'_> {
        SessionView {
            thread_id: self.active_thread.as_deref(),
            state: self.state,
            accumulator: &self.accumulator,
        }
    }

    fn notify(&mut self) {
        let view = SessionView {
            thread_id: self.active_thread.as_deref(),
            state: self.state,
            accumulator: &self.accumulator,
        };
        for listener in self.listeners.iter_mut() {
            listener(view);
        }
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

fn user_message(error: &TransportError) -> String {
    match error {
        TransportError::Status { detail, .. } => detail.clone(),
        TransportError::Timeout { .. } => {
            "The assistant took too long to respond. Please try again.".to_string()
        }
        TransportError::Connect { .. } | TransportError::Request { .. } => {
            GENERIC_OPEN_FAILURE.to_string()
        }
    }
}
