use super::api::{DataPreview, RouteMeta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KIND_MESSAGE: &str = "message";
pub const KIND_READY: &str = "ready";
pub const KIND_TOKEN: &str = "token";
pub const KIND_THOUGHT: &str = "thought";
pub const KIND_TOOL_START: &str = "tool_start";
pub const KIND_TOOL_END: &str = "tool_end";
pub const KIND_FINAL: &str = "final";
pub const KIND_ERROR: &str = "error";
pub const KIND_DONE: &str = "done";

const DEFAULT_TOOL_NAME: &str = "tool";

/// One delimited record of the event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: String,
    pub payload: Value,
}

impl Frame {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == KIND_DONE
    }
}

/// The completed answer and its structured side artifacts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinalAnswer {
    pub answer: String,
    pub route: Option<RouteMeta>,
    pub data_preview: Option<DataPreview>,
    pub charts: Option<Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolPhase {
    Start,
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolEvent {
    pub phase: ToolPhase,
    pub tool: String,
    pub payload: Value,
}

/// Application-level interpretation of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticEvent {
    Ready,
    Token(String),
    Thought(String),
    ToolStart { tool: String, input: Value },
    ToolEnd { tool: String, output: Value },
    Final(FinalAnswer),
    Error(String),
    Done,
}

impl SemanticEvent {
    /// Interprets a frame. Unrecognized kinds yield `None`.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        let payload = &frame.payload;
        let event = match frame.kind.as_str() {
            KIND_READY => Self::Ready,
            KIND_TOKEN => Self::Token(coerce_text(payload.get("token"))),
            KIND_THOUGHT => Self::Thought(coerce_text(payload.get("log"))),
            KIND_TOOL_START => Self::ToolStart {
                tool: tool_name(payload),
                input: payload.get("input").cloned().unwrap_or(Value::Null),
            },
            KIND_TOOL_END => Self::ToolEnd {
                tool: tool_name(payload),
                output: payload.clone(),
            },
            KIND_FINAL => Self::Final(final_answer(payload)),
            KIND_ERROR => Self::Error(stringify_payload(payload)),
            KIND_DONE => Self::Done,
            _ => return None,
        };
        Some(event)
    }
}

fn coerce_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn tool_name(payload: &Value) -> String {
    match payload.get("tool") {
        None | Some(Value::Null) => DEFAULT_TOOL_NAME.to_string(),
        name => coerce_text(name),
    }
}

fn stringify_payload(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn final_answer(payload: &Value) -> FinalAnswer {
    FinalAnswer {
        answer: coerce_text(payload.get("answer")),
        route: typed_field(payload, "route"),
        data_preview: typed_field(payload, "data_preview"),
        charts: payload.get("charts").filter(|v| !v.is_null()).cloned(),
    }
}

fn typed_field<T: serde::de::DeserializeOwned>(payload: &Value, key: &str) -> Option<T> {
    let value = payload.get(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            tracing::warn!(field = key, %error, "final payload field has unexpected shape");
            None
        }
    }
}
