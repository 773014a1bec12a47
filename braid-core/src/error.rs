//! Error taxonomy for the chat core
//!
//! Turn-level failures are converted into conversation messages at the
//! orchestration boundary; the conversation log is the error channel.

use crate::ids::MessageId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Required credential missing at startup. Fatal: rendered once, input
    /// disabled, no recovery path.
    #[error("configuration error: {0}")]
    Config(String),

    /// The model collaborator call failed or returned no content. Recovered
    /// locally by appending a visible error notice; never retried.
    #[error("model call failed: {0}")]
    TurnFailure(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// Editing was rejected before any mutation occurred.
    #[error("cannot edit message: {0}")]
    InvalidEdit(String),

    /// A message references a parent id that does not exist in the
    /// conversation.
    #[error("message {0} references a missing parent")]
    DanglingParent(MessageId),

    #[error("message {0} not found")]
    MessageNotFound(MessageId),
}

/// Marker prefixes identifying error-notice messages in a conversation log.
/// Follow-up suggestion generation skips responses carrying these.
pub const TURN_ERROR_MARKER: &str = "**Oops! An error occurred.**";
pub const FATAL_ERROR_MARKER: &str = "**Fatal Error:**";

/// Format a turn failure as the user-visible chat notice
pub fn turn_error_notice(detail: &str) -> String {
    format!("{}\n\n{}", TURN_ERROR_MARKER, detail)
}

/// Format a fatal startup failure as the user-visible chat notice
pub fn fatal_error_notice(detail: &str) -> String {
    format!("{} {}", FATAL_ERROR_MARKER, detail)
}

/// True if a response text is one of our own error notices
pub fn is_error_notice(text: &str) -> bool {
    text.contains(TURN_ERROR_MARKER) || text.contains(FATAL_ERROR_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_error_notice_format() {
        let notice = turn_error_notice("rate limited");
        assert!(notice.starts_with(TURN_ERROR_MARKER));
        assert!(notice.ends_with("rate limited"));
        assert!(is_error_notice(&notice));
    }

    #[test]
    fn test_plain_text_is_not_notice() {
        assert!(!is_error_notice("All good here."));
    }
}
