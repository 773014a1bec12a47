//! Core of the braid chat client
//!
//! This crate provides:
//! - **Model**: `Conversation` / `Message` — a forest of messages linked by
//!   parent ids, with derived views (top-level timeline, thread replies)
//! - **Thread engine**: context-path reconstruction, append,
//!   edit-as-prune-and-resend
//! - **Store**: `ConversationStore` over a string-keyed `Storage` backend
//!   (`MemoryStorage`, `FileStorage`)
//! - **Engine**: `ChatEngine` command/event orchestration of the send flow
//! - **Suggestions**: best-effort follow-up chips after a successful turn

pub mod conversation;
pub mod engine;
pub mod error;
pub mod ids;
pub mod store;
pub mod suggestions;
mod thread;

pub use conversation::{Conversation, Message, DEFAULT_TITLE, WELCOME_TEXT};
pub use engine::{ChatEngine, EngineCommand, EngineEvent};
pub use error::ChatError;
pub use ids::{ConversationId, MessageId};
pub use store::{ConversationStore, FileStorage, MemoryStorage, Storage, Theme};
