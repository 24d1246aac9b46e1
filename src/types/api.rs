use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a streaming chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// A conversation thread as listed by the thread API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadRef {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Which tool and connector produced the final answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RouteMeta {
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub connector_id: Option<String>,
    #[serde(default)]
    pub connector_type: Option<String>,
}

/// Tabular sample of the data behind an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataPreview {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: Option<Value>,
}
