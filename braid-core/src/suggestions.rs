//! Follow-up suggestion generation
//!
//! After a successful turn, the model is asked for a small JSON object of
//! follow-up prompts to show as chips. This is a best-effort enhancement:
//! every failure — transport, refusal, unparseable output — yields an empty
//! list, never an error.

use llm::{ChatMessage, ChatModel, ChatRequest};
use serde::Deserialize;

use crate::error;

/// At most this many chips are shown
pub const MAX_SUGGESTIONS: usize = 3;

const SYSTEM_INSTRUCTION: &str = "You are an expert at anticipating user needs. Your task is to \
generate three concise and relevant follow-up suggestions based on a given AI response. The \
suggestions should be actions or questions. Provide the output as a JSON object with a single \
key \"suggestions\" which is an array of strings. Example: {\"suggestions\": [\"Summarize \
this.\", \"Explain it simply.\", \"Give me a code example.\"]}.";

fn suggestions_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "suggestions": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
            },
        },
        "required": ["suggestions"],
    })
}

#[derive(Deserialize)]
struct SuggestionsResponse {
    suggestions: Vec<String>,
}

/// Generate follow-up suggestions for the given model response text.
///
/// Error-notice responses get no suggestions.
pub async fn generate(model: &(impl ChatModel + Sync), last_response: &str) -> Vec<String> {
    if error::is_error_notice(last_response) {
        return Vec::new();
    }

    let prompt = format!(
        "Based on this AI response, provide three short, relevant follow-up questions or \
         actions a user might find helpful:\n\n---\n\n{}",
        last_response
    );
    let messages = vec![ChatMessage::user(prompt)];
    let request = ChatRequest::new(&messages)
        .with_system_instruction(SYSTEM_INSTRUCTION)
        .with_json_schema(suggestions_schema());

    let response = match model.chat(&request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("suggestion generation failed: {}", e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<SuggestionsResponse>(&response.get_text()) {
        Ok(parsed) => parsed
            .suggestions
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .take(MAX_SUGGESTIONS)
            .collect(),
        Err(e) => {
            tracing::debug!("unparseable suggestions payload: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use llm::{ChatPayload, ChatStream};

    struct CannedModel {
        reply: String,
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        fn name(&self) -> &str {
            "canned"
        }

        async fn chat(&self, _request: &ChatRequest) -> anyhow::Result<ChatMessage> {
            Ok(ChatMessage::model(self.reply.clone()))
        }

        async fn stream_chat(&self, _request: &ChatRequest) -> anyhow::Result<ChatStream> {
            let chunk = llm::ChatChunk::model(ChatPayload::text(self.reply.clone()));
            Ok(Box::pin(stream::iter(vec![chunk])))
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        fn name(&self) -> &str {
            "failing"
        }

        async fn chat(&self, _request: &ChatRequest) -> anyhow::Result<ChatMessage> {
            Err(anyhow::anyhow!("boom"))
        }

        async fn stream_chat(&self, _request: &ChatRequest) -> anyhow::Result<ChatStream> {
            Err(anyhow::anyhow!("boom"))
        }
    }

    #[tokio::test]
    async fn test_parses_suggestions() {
        let model = CannedModel {
            reply: r#"{"suggestions": ["One", "Two", "Three"]}"#.to_string(),
        };
        let suggestions = generate(&model, "Some helpful answer.").await;
        assert_eq!(suggestions, vec!["One", "Two", "Three"]);
    }

    #[tokio::test]
    async fn test_caps_at_three() {
        let model = CannedModel {
            reply: r#"{"suggestions": ["1", "2", "3", "4", "5"]}"#.to_string(),
        };
        let suggestions = generate(&model, "Answer.").await;
        assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
    }

    #[tokio::test]
    async fn test_unparseable_payload_yields_nothing() {
        let model = CannedModel {
            reply: "not json at all".to_string(),
        };
        assert!(generate(&model, "Answer.").await.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_yields_nothing() {
        assert!(generate(&FailingModel, "Answer.").await.is_empty());
    }

    #[tokio::test]
    async fn test_error_notice_is_skipped() {
        let model = CannedModel {
            reply: r#"{"suggestions": ["should not appear"]}"#.to_string(),
        };
        let notice = crate::error::turn_error_notice("it broke");
        assert!(generate(&model, &notice).await.is_empty());
    }
}
