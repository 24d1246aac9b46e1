use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::types::api::ErrorBody;
use crate::types::ChatRequest;
use crate::util::is_local_endpoint_url;
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

pub const CHAT_STREAM_PATH: &str = "/api/v1/chat/stream";
pub const GENERIC_OPEN_FAILURE: &str = "The assistant could not be reached. Please try again.";

/// Failure to open a chat stream, before any frame was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("cannot reach chat endpoint '{url}': {message}")]
    Connect { url: String, message: String },

    #[error("chat request to '{url}' timed out")]
    Timeout { url: String },

    #[error("{detail}")]
    Status { status: u16, detail: String },

    #[error("chat request to '{url}' failed: {message}")]
    Request { url: String, message: String },
}

/// Opens the server-push response for one chat message.
pub trait ChatTransport: Send + Sync {
    fn open_stream(
        &self,
        request: ChatRequest,
        bearer_token: String,
    ) -> BoxFuture<'_, std::result::Result<ByteStream, TransportError>>;
}

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    api_url: String,
}

impl ChatClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }

    pub async fn create_stream(
        &self,
        request: &ChatRequest,
        bearer_token: &str,
    ) -> std::result::Result<ByteStream, TransportError> {
        let request_url = format!("{}{}", self.api_url, CHAT_STREAM_PATH);

        if debug_payload_enabled() {
            let payload = serde_json::to_value(request).unwrap_or(Value::Null);
            emit_debug_payload(&request_url, &payload);
        }

        let response = self
            .http
            .post(&request_url)
            .header("accept", "text/event-stream")
            .bearer_auth(bearer_token)
            .json(request)
            .send()
            .await
            .map_err(|error| map_request_error(error, &request_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail_from_body(&body)
                .unwrap_or_else(|| GENERIC_OPEN_FAILURE.to_string());
            tracing::warn!(url = %request_url, status = status.as_u16(), %detail, "chat stream rejected");
            return Err(TransportError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        tracing::info!(url = %request_url, thread_id = ?request.thread_id, "chat stream opened");
        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| anyhow!(map_request_error(error, &request_url_for_stream)))
        });
        Ok(Box::pin(stream))
    }
}

impl ChatTransport for ChatClient {
    fn open_stream(
        &self,
        request: ChatRequest,
        bearer_token: String,
    ) -> BoxFuture<'_, std::result::Result<ByteStream, TransportError>> {
        Box::pin(async move { self.create_stream(&request, &bearer_token).await })
    }
}

fn map_request_error(error: reqwest::Error, request_url: &str) -> TransportError {
    if error.is_connect() {
        let hint = if is_local_endpoint_url(request_url) {
            ". Start the local server or update CHATSTREAM_API_URL"
        } else {
            ""
        };
        return TransportError::Connect {
            url: request_url.to_string(),
            message: format!("{error}{hint}"),
        };
    }
    if error.is_timeout() {
        return TransportError::Timeout {
            url: request_url.to_string(),
        };
    }
    if let Some(status) = error.status() {
        return TransportError::Status {
            status: status.as_u16(),
            detail: error.to_string(),
        };
    }
    TransportError::Request {
        url: request_url.to_string(),
        message: error.to_string(),
    }
}

/// Extracts the human-readable detail from an error response body.
///
/// Accepts `{"detail": "..."}`, validation lists (`{"detail": [{"msg": ...}]}`)
/// and short plain-text bodies.
pub fn error_detail_from_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(trimmed) {
        return match parsed.detail? {
            Value::String(text) if !text.trim().is_empty() => Some(text),
            Value::Array(items) => {
                let messages: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .map(ToOwned::to_owned)
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            Value::Null | Value::String(_) => None,
            other => Some(other.to_string()),
        };
    }

    if trimmed.starts_with('{') || trimmed.starts_with('<') || trimmed.len() > 300 {
        return None;
    }
    Some(trimmed.to_string())
}
