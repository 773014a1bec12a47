//! Traffic logging for LLM API calls
//!
//! Appends one line per request/response to the app log file. Payloads are
//! truncated so conversation content does not leak into logs wholesale.

use config::PathManager;
use std::io::Write;

/// Maximum characters of payload recorded per event
const MAX_CONTENT_LOG_CHARS: usize = 200;

pub fn log_request(model: &str, request: &impl serde::Serialize) {
    write_event("REQUEST", model, &summarize(request));
}

pub fn log_response(model: &str, response: &impl serde::Serialize) {
    write_event("RESPONSE", model, &summarize(response));
}

pub fn log_stream_start(model: &str, request: &impl serde::Serialize) {
    write_event("STREAM_START", model, &summarize(request));
}

pub fn log_error(model: &str, error: &str) {
    write_event("ERROR", model, error);
}

fn summarize(payload: &impl serde::Serialize) -> String {
    let json =
        serde_json::to_string(payload).unwrap_or_else(|_| "<serialization error>".to_string());
    let char_count = json.chars().count();
    if char_count <= MAX_CONTENT_LOG_CHARS {
        json
    } else {
        let truncated: String = json.chars().take(MAX_CONTENT_LOG_CHARS).collect();
        format!("{}... ({} chars total)", truncated, char_count)
    }
}

fn write_event(event_type: &str, model: &str, message: &str) {
    let Some(log_path) = PathManager::log_file_path() else {
        return;
    };
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let _ = writeln!(
            file,
            "[{}] [TRAFFIC] [{}] [{}] {}",
            timestamp, event_type, model, message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_short_payload() {
        let summary = summarize(&serde_json::json!({"k": "v"}));
        assert_eq!(summary, r#"{"k":"v"}"#);
    }

    #[test]
    fn test_summarize_truncates_long_payload() {
        let summary = summarize(&"x".repeat(500));
        assert!(summary.contains("..."));
        assert!(summary.ends_with("(502 chars total)"));
    }
}
