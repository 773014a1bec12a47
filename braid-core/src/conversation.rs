//! Conversation structure types
//!
//! A conversation holds an insertion-ordered sequence of messages linked into
//! a forest by parent ids:
//!
//! - `parent_id = None` marks a top-level message (the main timeline)
//! - children of a message are its thread replies
//!
//! The sequence is append-only during normal operation and explicitly
//! truncated during an edit (see `thread.rs`).

use llm::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId};

/// Title given to a conversation before its first completed exchange
pub const DEFAULT_TITLE: &str = "New Chat";

/// Seed message every new conversation starts with
pub const WELCOME_TEXT: &str = "Hello! I'm a helpful assistant. How can I help you today?";

/// Maximum characters of the first user message used for a derived title
const TITLE_MAX_CHARS: usize = 30;

/// A single message in the conversation forest
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// None for top-level messages; otherwise the id of the message this one
    /// replies to. Must reference an existing message in the same
    /// conversation.
    pub parent_id: Option<MessageId>,
    pub content: ChatMessage,
}

impl Message {
    pub fn new(parent_id: Option<MessageId>, content: ChatMessage) -> Self {
        Self {
            id: MessageId::new(),
            parent_id,
            content,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A full conversation: metadata plus its message forest
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub history: Vec<Message>,
}

impl Conversation {
    /// Create a new conversation seeded with the model-authored welcome
    /// message
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            title: DEFAULT_TITLE.to_string(),
            history: vec![Message::new(None, ChatMessage::model(WELCOME_TEXT))],
        }
    }

    /// Create an empty conversation (tests, migration)
    pub fn empty() -> Self {
        Self {
            id: ConversationId::new(),
            title: DEFAULT_TITLE.to_string(),
            history: Vec::new(),
        }
    }

    pub fn find(&self, id: &MessageId) -> Option<&Message> {
        self.history.iter().find(|m| m.id == *id)
    }

    /// Top-level messages in insertion order
    pub fn top_level(&self) -> impl Iterator<Item = &Message> {
        self.history.iter().filter(|m| m.is_top_level())
    }

    /// Thread replies to `parent_id`, in insertion order
    pub fn replies<'a>(&'a self, parent_id: &'a MessageId) -> impl Iterator<Item = &'a Message> {
        self.history
            .iter()
            .filter(move |m| m.parent_id.as_ref() == Some(parent_id))
    }

    pub fn reply_count(&self, id: &MessageId) -> usize {
        self.replies(id).count()
    }

    pub fn has_replies(&self, id: &MessageId) -> bool {
        self.history
            .iter()
            .any(|m| m.parent_id.as_ref() == Some(id))
    }

    /// Still carrying the default title
    pub fn is_untitled(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    /// Nothing beyond the seeded welcome message
    pub fn is_seed_only(&self) -> bool {
        self.history.len() <= 1
    }

    /// Derive a short title from the first user message: its first text
    /// part, capped at 30 characters with an ellipsis when truncated.
    pub fn derive_title(&self) -> String {
        let first_user_text = self
            .history
            .iter()
            .find(|m| m.content.is_user())
            .map(|m| m.content.get_text());

        match first_user_text {
            Some(text) if !text.is_empty() => {
                let truncated: String = text.chars().take(TITLE_MAX_CHARS).collect();
                if text.chars().count() > TITLE_MAX_CHARS {
                    format!("{}...", truncated)
                } else {
                    truncated
                }
            }
            _ => DEFAULT_TITLE.to_string(),
        }
    }

    /// Check the reachability invariant: every non-null parent id references
    /// an existing message.
    pub fn validate(&self) -> Result<(), crate::error::ChatError> {
        for message in &self.history {
            if let Some(parent_id) = &message.parent_id {
                if self.find(parent_id).is_none() {
                    return Err(crate::error::ChatError::DanglingParent(message.id.clone()));
                }
            }
        }
        Ok(())
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::ChatPayload;

    #[test]
    fn test_new_conversation_is_seeded() {
        let convo = Conversation::new();
        assert_eq!(convo.title, DEFAULT_TITLE);
        assert_eq!(convo.history.len(), 1);
        assert!(convo.is_seed_only());
        assert!(convo.is_untitled());

        let seed = &convo.history[0];
        assert!(seed.is_top_level());
        assert!(!seed.content.is_user());
        assert_eq!(seed.content.get_text(), WELCOME_TEXT);
    }

    #[test]
    fn test_top_level_and_replies_views() {
        let mut convo = Conversation::empty();
        let a = Message::new(None, ChatMessage::user("a"));
        let a_id = a.id.clone();
        convo.history.push(a);
        let b = Message::new(None, ChatMessage::model("b"));
        convo.history.push(b);
        let reply = Message::new(Some(a_id.clone()), ChatMessage::user("reply"));
        convo.history.push(reply);

        assert_eq!(convo.top_level().count(), 2);
        assert_eq!(convo.reply_count(&a_id), 1);
        assert!(convo.has_replies(&a_id));
        assert_eq!(
            convo.replies(&a_id).next().unwrap().content.get_text(),
            "reply"
        );
    }

    #[test]
    fn test_reply_order_preserved() {
        let mut convo = Conversation::empty();
        let parent = Message::new(None, ChatMessage::model("parent"));
        let parent_id = parent.id.clone();
        convo.history.push(parent);
        for i in 0..5 {
            convo.history.push(Message::new(
                Some(parent_id.clone()),
                ChatMessage::user(format!("reply {}", i)),
            ));
        }

        let texts: Vec<String> = convo
            .replies(&parent_id)
            .map(|m| m.content.get_text())
            .collect();
        assert_eq!(texts, vec!["reply 0", "reply 1", "reply 2", "reply 3", "reply 4"]);
    }

    #[test]
    fn test_derive_title_short_message() {
        let mut convo = Conversation::new();
        convo
            .history
            .push(Message::new(None, ChatMessage::user("Hello")));
        assert_eq!(convo.derive_title(), "Hello");
    }

    #[test]
    fn test_derive_title_truncates_at_30_chars() {
        let mut convo = Conversation::new();
        convo.history.push(Message::new(
            None,
            ChatMessage::user("This is a fairly long first message from the user"),
        ));
        let title = convo.derive_title();
        assert_eq!(title, "This is a fairly long first me...");
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
    }

    #[test]
    fn test_derive_title_without_user_message() {
        let convo = Conversation::new();
        assert_eq!(convo.derive_title(), DEFAULT_TITLE);
    }

    #[test]
    fn test_derive_title_skips_attachment_only_part() {
        let mut convo = Conversation::new();
        convo.history.push(Message::new(
            None,
            ChatMessage::user(ChatPayload::inline_data("aGk=", "image/png")),
        ));
        // No text part to derive from
        assert_eq!(convo.derive_title(), DEFAULT_TITLE);
    }

    #[test]
    fn test_validate_detects_dangling_parent() {
        let mut convo = Conversation::new();
        convo.history.push(Message::new(
            Some(MessageId::new()),
            ChatMessage::user("orphan"),
        ));
        assert!(convo.validate().is_err());
    }

    #[test]
    fn test_validate_ok_for_well_formed_tree() {
        let mut convo = Conversation::new();
        let root_id = convo.history[0].id.clone();
        convo
            .history
            .push(Message::new(Some(root_id), ChatMessage::user("reply")));
        assert!(convo.validate().is_ok());
    }

    #[test]
    fn test_conversation_serde_roundtrip() {
        let mut convo = Conversation::new();
        let root_id = convo.history[0].id.clone();
        convo
            .history
            .push(Message::new(Some(root_id), ChatMessage::user("hi")));

        let json = serde_json::to_string(&convo).unwrap();
        let back: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, convo);
    }
}
