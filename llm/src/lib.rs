//! Model-API collaborator for the chat client.
//!
//! This crate provides:
//! - **Types**: `ChatMessage`, `ChatPayload`, `Part`, `ChatRequest`, `ChatChunk`
//! - **Traits**: `ChatModel` (batched + streamed chat), `ModelProvider`
//! - **Provider**: Gemini (`generateContent` / `streamGenerateContent`)

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;

pub mod api;
mod client;
pub mod providers;
pub mod traffic_log;

pub use api::*;
pub use providers::{GeminiChatModel, GeminiProvider};

pub type ChatStream = Pin<Box<dyn Stream<Item = ChatChunk> + Send>>;

#[derive(Clone, Debug)]
pub struct ModelDefinition {
    pub id: String,
    pub display_name: Option<String>,
}

impl ModelDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: Some(display_name.into()),
        }
    }

    /// Display name, falling back to id
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[async_trait]
pub trait ChatModel {
    fn name(&self) -> &str;

    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatMessage>;

    async fn stream_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatStream>;
}

// Blanket implementation so Arc<dyn ChatModel> is itself a ChatModel
#[async_trait]
impl ChatModel for Arc<dyn ChatModel + Send + Sync> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatMessage> {
        (**self).chat(request).await
    }

    async fn stream_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatStream> {
        (**self).stream_chat(request).await
    }
}

#[async_trait]
pub trait ModelProvider {
    /// List available models from the provider
    async fn list_models(&self) -> anyhow::Result<Vec<ModelDefinition>>;

    /// Create a chat model by name, shared across threads
    fn create_chat_model(&self, model_name: &str) -> Option<Arc<dyn ChatModel + Send + Sync>>;
}
