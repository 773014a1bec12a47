use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Model,
    System,
}

/// A single content fragment within a message: plain text or inline binary
/// data (base64) with its mime type.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    InlineData { data: String, mime_type: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline_data(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Part::InlineData {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Mime type for binary parts, None for text
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Part::InlineData { mime_type, .. } => Some(mime_type),
            Part::Text { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct ChatPayload {
    pub parts: Vec<Part>,
}

impl From<&str> for ChatPayload {
    fn from(text: &str) -> Self {
        ChatPayload::text(text)
    }
}

impl From<String> for ChatPayload {
    fn from(text: String) -> Self {
        ChatPayload::text(text)
    }
}

impl ChatPayload {
    pub fn new(parts: Vec<Part>) -> Self {
        ChatPayload { parts }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ChatPayload {
            parts: vec![Part::text(text)],
        }
    }

    pub fn inline_data(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ChatPayload {
            parts: vec![Part::inline_data(data, mime_type)],
        }
    }

    /// All text parts concatenated
    pub fn get_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Inline (base64, mime_type) attachments
    pub fn get_inline_data(&self) -> Vec<(&str, &str)> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::InlineData { data, mime_type } => Some((data.as_str(), mime_type.as_str())),
                Part::Text { .. } => None,
            })
            .collect()
    }

    pub fn has_inline_data(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, Part::InlineData { .. }))
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: Role,
    #[serde(flatten)]
    pub payload: ChatPayload,
}

impl ChatMessage {
    pub fn new(role: Role, payload: ChatPayload) -> Self {
        Self { role, payload }
    }

    pub fn user(payload: impl Into<ChatPayload>) -> Self {
        Self::new(Role::User, payload.into())
    }

    pub fn model(payload: impl Into<ChatPayload>) -> Self {
        Self::new(Role::Model, payload.into())
    }

    pub fn system(payload: impl Into<ChatPayload>) -> Self {
        Self::new(Role::System, payload.into())
    }

    pub fn get_text(&self) -> String {
        self.payload.get_text()
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// One streamed increment of a model response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatChunk {
    pub role: Role,
    #[serde(flatten)]
    pub payload: ChatPayload,
}

impl ChatChunk {
    pub fn new(role: Role, payload: ChatPayload) -> Self {
        Self { role, payload }
    }

    pub fn model(payload: impl Into<ChatPayload>) -> Self {
        Self::new(Role::Model, payload.into())
    }

    pub fn get_text(&self) -> String {
        self.payload.get_text()
    }
}

impl From<ChatChunk> for ChatMessage {
    fn from(chunk: ChatChunk) -> Self {
        ChatMessage {
            role: chunk.role,
            payload: chunk.payload,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) system_instruction: Option<String>,
    pub(crate) response_schema: Option<serde_json::Value>,
}

impl ChatRequest {
    /// Create a new chat request from an iterator of message references.
    ///
    /// Accepts anything yielding `&ChatMessage` (a slice, a context-path
    /// iterator), cloning each message exactly once.
    pub fn new<'a>(messages: impl IntoIterator<Item = &'a ChatMessage>) -> Self {
        ChatRequest {
            messages: messages.into_iter().cloned().collect(),
            system_instruction: None,
            response_schema: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Constrain the response to a JSON document matching `schema`.
    /// The provider maps this to its structured-output mechanism.
    pub fn with_json_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction.as_deref()
    }

    pub fn response_schema(&self) -> Option<&serde_json::Value> {
        self.response_schema.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_payload_text() {
        let payload = ChatPayload::text("Hello, world!");
        assert_eq!(payload.get_text(), "Hello, world!");
        assert_eq!(payload.parts.len(), 1);
        assert!(matches!(payload.parts[0], Part::Text { .. }));
    }

    #[test]
    fn test_chat_payload_mixed_parts() {
        let payload = ChatPayload::new(vec![
            Part::inline_data("aGVsbG8=", "image/png"),
            Part::text("What is this?"),
        ]);

        assert_eq!(payload.get_text(), "What is this?");
        assert!(payload.has_inline_data());
        assert_eq!(payload.get_inline_data(), vec![("aGVsbG8=", "image/png")]);
    }

    #[test]
    fn test_chat_payload_multiple_text_parts() {
        let payload = ChatPayload::new(vec![Part::text("First "), Part::text("Second")]);
        assert_eq!(payload.get_text(), "First Second");
    }

    #[test]
    fn test_chat_message_constructors() {
        let user_msg = ChatMessage::user("Test");
        assert_eq!(user_msg.role, Role::User);
        assert_eq!(user_msg.get_text(), "Test");
        assert!(user_msg.is_user());

        let model_msg = ChatMessage::model("Reply");
        assert_eq!(model_msg.role, Role::Model);
        assert!(!model_msg.is_user());
    }

    #[test]
    fn test_part_serialization() {
        let part = Part::text("Hello");
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"text\":\"Hello\""));

        let data = Part::inline_data("Zm9v", "image/jpeg");
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"type\":\"inline_data\""));
        assert!(json.contains("\"mime_type\":\"image/jpeg\""));
    }

    #[test]
    fn test_message_roundtrip() {
        let msg = ChatMessage::user(ChatPayload::new(vec![
            Part::text("caption"),
            Part::inline_data("YmFy", "image/png"),
        ]));
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_chat_request_builders() {
        let messages = vec![ChatMessage::user("Hello")];
        let request = ChatRequest::new(&messages)
            .with_system_instruction("Be brief.")
            .with_json_schema(serde_json::json!({"type": "object"}));

        assert_eq!(request.messages().len(), 1);
        assert_eq!(request.system_instruction(), Some("Be brief."));
        assert!(request.response_schema.is_some());
    }
}
