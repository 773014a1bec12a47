//! Chat engine orchestration
//!
//! The engine owns the conversation store and the model collaborator behind
//! a command/event channel pair. A single spawned processor loop handles one
//! command at a time, so mutation of the store is serialized — only one send
//! is ever in flight.
//!
//! Turn-level failures never escape as process failures: they are converted
//! into error-notice messages appended to the conversation.

use futures::StreamExt;
use llm::{ChatMessage, ChatModel, ChatPayload, ChatRequest, Part};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::conversation::Message;
use crate::error::{self, ChatError};
use crate::ids::{ConversationId, MessageId};
use crate::store::{ConversationStore, Storage};
use crate::suggestions;

pub enum EngineCommand {
    SendMessage {
        parts: Vec<Part>,
        parent_id: Option<MessageId>,
    },
    EditMessage {
        message_id: MessageId,
        new_text: String,
    },
    StartNewConversation,
    SelectConversation(ConversationId),
    DeleteConversation(ConversationId),
    RenameConversation {
        id: ConversationId,
        title: String,
    },
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A message (user, model, or error notice) was appended and persisted
    MessageAppended(Message),
    /// The send flow finished, successfully or not; input can be re-enabled
    TurnComplete { suggestions: Vec<String> },
    /// An edit removed the tail of a sibling group; the replay follows
    HistoryTruncated,
    /// Conversation list, titles or active pointer changed
    ConversationsChanged,
    Error(String),
}

/// Chat engine generic over the storage backend
pub struct ChatEngine<S: Storage + 'static> {
    store: Arc<Mutex<ConversationStore<S>>>,
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    event_rx: mpsc::UnboundedReceiver<EngineEvent>,
    model_name: String,
    #[allow(dead_code)]
    processor_handle: JoinHandle<()>,
}

impl<S: Storage + 'static> ChatEngine<S> {
    pub fn new(
        store: ConversationStore<S>,
        model: Arc<dyn ChatModel + Send + Sync>,
        system_instruction: impl Into<String>,
    ) -> Self {
        let model_name = model.name().to_string();
        let store = Arc::new(Mutex::new(store));
        let system_instruction = system_instruction.into();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let store_clone = Arc::clone(&store);
        let processor_handle = tokio::spawn(async move {
            Self::processor_loop(store_clone, model, system_instruction, cmd_rx, event_tx).await;
        });

        Self {
            store,
            cmd_tx,
            event_rx,
            model_name,
            processor_handle,
        }
    }

    async fn processor_loop(
        store: Arc<Mutex<ConversationStore<S>>>,
        model: Arc<dyn ChatModel + Send + Sync>,
        system_instruction: String,
        mut cmd_rx: mpsc::UnboundedReceiver<EngineCommand>,
        event_tx: mpsc::UnboundedSender<EngineEvent>,
    ) {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                EngineCommand::SendMessage { parts, parent_id } => {
                    Self::handle_send(
                        &store,
                        &model,
                        &system_instruction,
                        parts,
                        parent_id,
                        &event_tx,
                    )
                    .await;
                }
                EngineCommand::EditMessage {
                    message_id,
                    new_text,
                } => {
                    let parent_id = {
                        let mut store_guard = store.lock().await;
                        let Some(conversation) = store_guard.active_mut() else {
                            let _ = event_tx
                                .send(EngineEvent::Error("no active conversation".to_string()));
                            continue;
                        };
                        match conversation.prune_for_edit(&message_id) {
                            Ok(parent_id) => {
                                if let Err(e) = store_guard.save() {
                                    let _ = event_tx.send(EngineEvent::Error(e.to_string()));
                                    continue;
                                }
                                parent_id
                            }
                            Err(e) => {
                                // Rejected before any mutation; surface and move on
                                let _ = event_tx.send(EngineEvent::Error(e.to_string()));
                                continue;
                            }
                        }
                    };
                    let _ = event_tx.send(EngineEvent::HistoryTruncated);
                    Self::handle_send(
                        &store,
                        &model,
                        &system_instruction,
                        vec![Part::text(new_text)],
                        parent_id,
                        &event_tx,
                    )
                    .await;
                }
                EngineCommand::StartNewConversation => {
                    let result = store.lock().await.start_new();
                    Self::report(result.map(|_| ()), &event_tx);
                }
                EngineCommand::SelectConversation(id) => {
                    let result = store.lock().await.set_active(&id);
                    Self::report(result, &event_tx);
                }
                EngineCommand::DeleteConversation(id) => {
                    let result = store.lock().await.delete(&id);
                    Self::report(result, &event_tx);
                }
                EngineCommand::RenameConversation { id, title } => {
                    let result = store.lock().await.rename(&id, title);
                    Self::report(result, &event_tx);
                }
            }
        }
    }

    fn report(result: Result<(), ChatError>, event_tx: &mpsc::UnboundedSender<EngineEvent>) {
        match result {
            Ok(()) => {
                let _ = event_tx.send(EngineEvent::ConversationsChanged);
            }
            Err(e) => {
                let _ = event_tx.send(EngineEvent::Error(e.to_string()));
            }
        }
    }

    /// The send-and-await-response contract:
    /// append user message, persist, build context excluding the new turn,
    /// stream the model, append the response (or an error notice) under the
    /// same parent, derive the title on the first completed top-level
    /// exchange, persist, then best-effort suggestions.
    async fn handle_send(
        store: &Arc<Mutex<ConversationStore<S>>>,
        model: &Arc<dyn ChatModel + Send + Sync>,
        system_instruction: &str,
        parts: Vec<Part>,
        parent_id: Option<MessageId>,
        event_tx: &mpsc::UnboundedSender<EngineEvent>,
    ) {
        // Append and persist the user's message first, so a crash
        // mid-request does not lose their input.
        let (user_message, context) = {
            let mut store_guard = store.lock().await;
            let Some(conversation) = store_guard.active_mut() else {
                let _ = event_tx.send(EngineEvent::Error("no active conversation".to_string()));
                return;
            };
            let user_message = conversation
                .append(parent_id.clone(), ChatMessage::user(ChatPayload::new(parts)))
                .clone();
            if let Err(e) = store_guard.save() {
                let _ = event_tx.send(EngineEvent::Error(e.to_string()));
                return;
            }
            let conversation = store_guard.active().expect("active conversation");
            let mut context = match conversation.context_path(&user_message.id) {
                Ok(context) => context,
                Err(e) => {
                    let _ = event_tx.send(EngineEvent::Error(e.to_string()));
                    return;
                }
            };
            // The new turn is passed to the collaborator separately from the
            // prior history.
            context.pop();
            (user_message, context)
        };
        let _ = event_tx.send(EngineEvent::MessageAppended(user_message.clone()));

        // Stream the model without holding the store lock
        let turn_result =
            Self::stream_turn(model, system_instruction, &context, &user_message.content).await;

        let response_text = {
            let mut store_guard = store.lock().await;
            let Some(conversation) = store_guard.active_mut() else {
                let _ = event_tx.send(EngineEvent::Error("no active conversation".to_string()));
                return;
            };

            let (text, titled) = match &turn_result {
                Ok(text) => {
                    let message = conversation
                        .append(parent_id.clone(), ChatMessage::model(text.clone()))
                        .clone();
                    // First completed exchange in the top-level thread
                    // derives the title, unless the user renamed already.
                    let mut titled = false;
                    if parent_id.is_none()
                        && conversation.is_untitled()
                        && conversation.top_level().filter(|m| m.content.is_user()).count() == 1
                    {
                        let derived = conversation.derive_title();
                        conversation.title = derived;
                        titled = true;
                    }
                    let _ = event_tx.send(EngineEvent::MessageAppended(message));
                    (text.clone(), titled)
                }
                Err(e) => {
                    // The conversation log is the error channel: the user
                    // must see that the turn failed. Nothing is retried.
                    let notice = error::turn_error_notice(&e.to_string());
                    let message = conversation
                        .append(parent_id.clone(), ChatMessage::model(notice.clone()))
                        .clone();
                    let _ = event_tx.send(EngineEvent::MessageAppended(message));
                    (notice, false)
                }
            };

            if let Err(e) = store_guard.save() {
                let _ = event_tx.send(EngineEvent::Error(e.to_string()));
            }
            if titled {
                let _ = event_tx.send(EngineEvent::ConversationsChanged);
            }
            text
        };

        let suggestions = if turn_result.is_ok() {
            suggestions::generate(model, &response_text).await
        } else {
            Vec::new()
        };
        let _ = event_tx.send(EngineEvent::TurnComplete { suggestions });
    }

    async fn stream_turn(
        model: &Arc<dyn ChatModel + Send + Sync>,
        system_instruction: &str,
        context: &[ChatMessage],
        new_message: &ChatMessage,
    ) -> Result<String, ChatError> {
        let mut messages: Vec<ChatMessage> = context.to_vec();
        messages.push(new_message.clone());
        let request =
            ChatRequest::new(&messages).with_system_instruction(system_instruction);

        let mut stream = model
            .stream_chat(&request)
            .await
            .map_err(|e| ChatError::TurnFailure(e.to_string()))?;

        let mut full_response = String::new();
        while let Some(chunk) = stream.next().await {
            full_response.push_str(&chunk.get_text());
        }

        if full_response.is_empty() {
            return Err(ChatError::TurnFailure(
                "the model returned no content".to_string(),
            ));
        }
        Ok(full_response)
    }

    pub fn send_message(&self, parts: Vec<Part>, parent_id: Option<MessageId>) {
        let _ = self
            .cmd_tx
            .send(EngineCommand::SendMessage { parts, parent_id });
    }

    /// Send plain text to the top-level thread
    pub fn send_text(&self, text: impl Into<String>) {
        self.send_message(vec![Part::text(text.into())], None);
    }

    /// Send plain text as a thread reply
    pub fn send_reply(&self, text: impl Into<String>, parent_id: MessageId) {
        self.send_message(vec![Part::text(text.into())], Some(parent_id));
    }

    pub fn edit_message(&self, message_id: MessageId, new_text: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::EditMessage {
            message_id,
            new_text: new_text.into(),
        });
    }

    pub fn start_new_conversation(&self) {
        let _ = self.cmd_tx.send(EngineCommand::StartNewConversation);
    }

    pub fn select_conversation(&self, id: ConversationId) {
        let _ = self.cmd_tx.send(EngineCommand::SelectConversation(id));
    }

    pub fn delete_conversation(&self, id: ConversationId) {
        let _ = self.cmd_tx.send(EngineCommand::DeleteConversation(id));
    }

    pub fn rename_conversation(&self, id: ConversationId, title: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::RenameConversation {
            id,
            title: title.into(),
        });
    }

    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.recv().await
    }

    pub fn store(&self) -> Arc<Mutex<ConversationStore<S>>> {
        Arc::clone(&self.store)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}
