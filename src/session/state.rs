use crate::state::StreamAccumulator;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    /// Request issued, no byte received yet.
    Sending,
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Reasons a send is refused before any network action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("Type a message before sending.")]
    EmptyMessage,

    #[error("You are not signed in. Sign in and try again.")]
    MissingCredential,

    #[error("Select or create a conversation first.")]
    NoThreadSelected,

    #[error("A response is still streaming for this conversation.")]
    Busy,
}

/// Borrowed view handed to change observers.
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub thread_id: Option<&'a str>,
    pub state: SessionState,
    pub accumulator: &'a StreamAccumulator,
}

impl SessionView<'_> {
    pub fn to_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            thread_id: self.thread_id.map(ToOwned::to_owned),
            state: self.state,
            accumulator: self.accumulator.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub thread_id: Option<String>,
    pub state: SessionState,
    pub accumulator: StreamAccumulator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_matches_serialized_name() {
        for state in [
            SessionState::Idle,
            SessionState::Sending,
            SessionState::Streaming,
            SessionState::Completed,
            SessionState::Failed,
        ] {
            let serialized = serde_json::to_value(state).unwrap();
            assert_eq!(serialized.as_str(), Some(state.label()));
        }
    }
}
