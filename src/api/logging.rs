use crate::util::parse_bool_flag;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;

const DEBUG_PAYLOAD_ENV: &str = "CHATSTREAM_DEBUG_PAYLOAD";
const API_LOG_PATH_ENV: &str = "CHATSTREAM_API_LOG_PATH";

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(parse_bool_flag)
        .unwrap_or(false)
}

/// Dumps an outgoing request body. Headers are never included, so the
/// bearer token stays out of the log.
pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());

    if let Some(path) = resolve_log_path() {
        let message =
            format!("CHATSTREAM DEBUG payload_request url={request_url}\npayload:\n{formatted_payload}\n");
        match append_log_file(&path, &message) {
            Ok(()) => return,
            Err(error) => {
                tracing::warn!(path = %path, %error, "could not append to api log file");
            }
        }
    }

    tracing::debug!(url = request_url, payload = %formatted_payload, "payload_request");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(API_LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}
