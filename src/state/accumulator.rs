use crate::types::{FinalAnswer, SemanticEvent, ToolEvent, ToolPhase};
use serde::Serialize;

/// Result of applying one event to an accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// State changed.
    Applied,
    /// Event carried nothing to record (ready, empty token, ...).
    Unchanged,
    /// The accumulator is no longer live.
    Rejected,
    /// `done` was applied; the stream is closed.
    Terminal,
}

impl DispatchOutcome {
    pub fn mutated(self) -> bool {
        matches!(self, Self::Applied | Self::Terminal)
    }
}

/// State of the answer currently being produced for one send.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StreamAccumulator {
    pub draft_text: String,
    pub thoughts: Vec<String>,
    pub tool_events: Vec<ToolEvent>,
    pub final_answer: Option<FinalAnswer>,
    pub error: Option<String>,
    pub is_live: bool,
}

impl StreamAccumulator {
    pub fn live() -> Self {
        Self {
            is_live: true,
            ..Self::default()
        }
    }

    /// Accumulator for an attempt that failed before streaming began.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Text to show: the final answer once known, otherwise the draft.
    pub fn display_text(&self) -> &str {
        match &self.final_answer {
            Some(final_answer) => &final_answer.answer,
            None => &self.draft_text,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.draft_text.is_empty()
            && self.thoughts.is_empty()
            && self.tool_events.is_empty()
            && self.final_answer.is_none()
            && self.error.is_none()
    }

    /// Stops accepting events without touching recorded content.
    pub fn close(&mut self) {
        self.is_live = false;
    }

    pub fn apply(&mut self, event: SemanticEvent) -> DispatchOutcome {
        if !self.is_live {
            return DispatchOutcome::Rejected;
        }

        match event {
            SemanticEvent::Ready => DispatchOutcome::Unchanged,
            SemanticEvent::Token(text) => {
                if text.is_empty() {
                    return DispatchOutcome::Unchanged;
                }
                self.draft_text.push_str(&text);
                DispatchOutcome::Applied
            }
            SemanticEvent::Thought(log) => {
                if log.is_empty() {
                    return DispatchOutcome::Unchanged;
                }
                self.thoughts.push(log);
                DispatchOutcome::Applied
            }
            SemanticEvent::ToolStart { tool, input } => {
                self.tool_events.push(ToolEvent {
                    phase: ToolPhase::Start,
                    tool,
                    payload: input,
                });
                DispatchOutcome::Applied
            }
            SemanticEvent::ToolEnd { tool, output } => {
                self.tool_events.push(ToolEvent {
                    phase: ToolPhase::End,
                    tool,
                    payload: output,
                });
                DispatchOutcome::Applied
            }
            SemanticEvent::Final(final_answer) => {
                self.final_answer = Some(final_answer);
                DispatchOutcome::Applied
            }
            SemanticEvent::Error(message) => {
                self.error = Some(message);
                DispatchOutcome::Applied
            }
            SemanticEvent::Done => {
                self.is_live = false;
                DispatchOutcome::Terminal
            }
        }
    }
}
