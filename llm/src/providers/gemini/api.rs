use serde::{Deserialize, Serialize};

use crate::{ChatPayload, ChatRequest};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModelDefinition {
    pub(crate) name: String,

    pub(crate) display_name: Option<String>,

    pub(crate) supported_generation_methods: Option<Vec<String>>,
}

impl ModelDefinition {
    /// Chat-capable models advertise generateContent
    pub(crate) fn supports_chat(&self) -> bool {
        self.supported_generation_methods
            .as_ref()
            .is_some_and(|methods| methods.iter().any(|m| m == "generateContent"))
    }
}

impl From<ModelDefinition> for crate::ModelDefinition {
    fn from(model: ModelDefinition) -> Self {
        match model.display_name {
            Some(display_name) => crate::ModelDefinition::with_display_name(model.name, display_name),
            None => crate::ModelDefinition::new(model.name),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListModelsResponse {
    pub(crate) models: Vec<ModelDefinition>,

    pub(crate) next_page_token: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Model,
}

impl TryFrom<crate::api::Role> for Role {
    type Error = anyhow::Error;

    fn try_from(value: crate::api::Role) -> Result<Self, Self::Error> {
        match value {
            crate::api::Role::User => Ok(Role::User),
            crate::api::Role::Model => Ok(Role::Model),
            crate::api::Role::System => Err(anyhow::anyhow!(
                "System messages go into systemInstruction, not contents."
            )),
        }
    }
}

impl From<Role> for crate::api::Role {
    fn from(value: Role) -> Self {
        match value {
            Role::User => crate::api::Role::User,
            Role::Model => crate::api::Role::Model,
        }
    }
}

/// Gemini inline data for images/audio
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    pub(crate) mime_type: String,
    pub(crate) data: String, // base64-encoded
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum PartType {
    Text(String),
    InlineData(InlineData),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Part {
    #[serde(flatten)]
    pub(crate) data: PartType,

    #[serde(flatten)]
    pub(crate) extra: Option<serde_json::Value>,
}

impl Part {
    pub(crate) fn new_text(text: String) -> Self {
        Part {
            data: PartType::Text(text),
            extra: None,
        }
    }
}

impl From<&Part> for crate::api::Part {
    fn from(part: &Part) -> Self {
        match &part.data {
            PartType::Text(t) => crate::api::Part::text(t.clone()),
            PartType::InlineData(inline) => {
                crate::api::Part::inline_data(inline.data.clone(), inline.mime_type.clone())
            }
        }
    }
}

impl From<&crate::api::Part> for Part {
    fn from(part: &crate::api::Part) -> Self {
        match part {
            crate::api::Part::Text { text } => Part::new_text(text.clone()),
            crate::api::Part::InlineData { data, mime_type } => Part {
                data: PartType::InlineData(InlineData {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                }),
                extra: None,
            },
        }
    }
}

// Gemini representation of messages.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Content {
    pub(crate) role: Role,
    pub(crate) parts: Vec<Part>,
}

impl From<&Content> for crate::ChatMessage {
    fn from(content: &Content) -> Self {
        let parts: Vec<crate::api::Part> = content.parts.iter().map(|p| p.into()).collect();
        crate::ChatMessage::new(content.role.into(), ChatPayload::new(parts))
    }
}

impl From<&Content> for crate::ChatChunk {
    fn from(content: &Content) -> Self {
        let parts: Vec<crate::api::Part> = content.parts.iter().map(|p| p.into()).collect();
        crate::ChatChunk::new(content.role.into(), ChatPayload::new(parts))
    }
}

impl From<&crate::ChatMessage> for Content {
    fn from(msg: &crate::ChatMessage) -> Self {
        Content {
            role: msg.role.try_into().expect("Invalid role"),
            parts: msg.payload.parts.iter().map(|p| p.into()).collect(),
        }
    }
}

/// Generation options; only structured-output fields are needed here.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub(crate) response_mime_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) response_schema: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub(crate) contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system_instruction: Option<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) generation_config: Option<GenerationConfig>,
}

impl From<&ChatRequest> for GenerateContentRequest {
    fn from(request: &ChatRequest) -> Self {
        // System messages in the history and the explicit instruction both
        // land in systemInstruction; everything else is a content turn.
        let mut system_parts: Vec<Part> = request
            .messages
            .iter()
            .filter(|m| m.role == crate::api::Role::System)
            .flat_map(|m| m.payload.parts.iter().map(Part::from))
            .collect();
        if let Some(instruction) = &request.system_instruction {
            system_parts.push(Part::new_text(instruction.clone()));
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(Content {
                role: Role::User, // Role is ignored for system instructions
                parts: system_parts,
            })
        };

        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != crate::api::Role::System)
            .map(Content::from)
            .collect::<Vec<Content>>();

        let generation_config = request.response_schema.clone().map(|schema| GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: Some(schema),
        });

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Candidate {
    pub(crate) content: Content,

    #[serde(flatten)]
    pub(crate) extra: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<Candidate>,

    #[serde(flatten)]
    pub(crate) extra: Option<serde_json::Value>,
}

impl From<GenerateContentResponse> for crate::ChatMessage {
    fn from(response: GenerateContentResponse) -> Self {
        response
            .candidates
            .first()
            .map(|c| (&c.content).into())
            .unwrap_or_else(|| crate::ChatMessage::model(ChatPayload::default()))
    }
}

impl From<GenerateContentResponse> for crate::ChatChunk {
    fn from(response: GenerateContentResponse) -> Self {
        response
            .candidates
            .first()
            .map(|c| (&c.content).into())
            .unwrap_or_else(|| crate::ChatChunk::model(ChatPayload::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatMessage;

    #[test]
    fn test_content_serialization() {
        let content = Content {
            role: Role::User,
            parts: vec![Part::new_text("Hello, world!".to_string())],
        };
        let json = serde_json::to_string(&content).unwrap();
        assert_eq!(json, r#"{"role":"user","parts":[{"text":"Hello, world!"}]}"#);
    }

    #[test]
    fn test_inline_data_serialization() {
        let content = Content {
            role: Role::User,
            parts: vec![Part {
                data: PartType::InlineData(InlineData {
                    mime_type: "image/png".to_string(),
                    data: "aGVsbG8=".to_string(),
                }),
                extra: None,
            }],
        };
        let json = serde_json::to_string(&content).unwrap();
        assert!(json.contains(r#""inlineData""#));
        assert!(json.contains(r#""mimeType":"image/png""#));
    }

    #[test]
    fn test_request_routes_system_instruction() {
        let messages = vec![ChatMessage::user("Hi")];
        let request = ChatRequest::new(&messages).with_system_instruction("Be helpful.");
        let api_request = GenerateContentRequest::from(&request);

        assert_eq!(api_request.contents.len(), 1);
        let instruction = api_request.system_instruction.expect("instruction set");
        assert!(matches!(&instruction.parts[0].data, PartType::Text(t) if t == "Be helpful."));
    }

    #[test]
    fn test_request_json_schema_sets_generation_config() {
        let messages = vec![ChatMessage::user("Hi")];
        let request =
            ChatRequest::new(&messages).with_json_schema(serde_json::json!({"type": "OBJECT"}));
        let api_request = GenerateContentRequest::from(&request);

        let config = api_request.generation_config.expect("config set");
        assert_eq!(config.response_mime_type, "application/json");
        assert!(config.response_schema.is_some());
    }

    #[test]
    fn test_response_without_candidates_is_empty_message() {
        let response = GenerateContentResponse {
            candidates: vec![],
            extra: None,
        };
        let msg: ChatMessage = response.into();
        assert!(msg.get_text().is_empty());
    }
}
