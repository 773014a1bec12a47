//! Conversation store: the id -> conversation mapping, the active pointer
//! and the theme preference, persisted through a `Storage` backend.
//!
//! Every mutation round-trips the entire store: serialize wholesale,
//! overwrite, last write wins. Loading fails open — missing, corrupt or
//! unknown-version data yields an empty store, never a user-visible error.

use serde::{Deserialize, Serialize};

use super::traits::Storage;
use crate::conversation::Conversation;
use crate::error::ChatError;
use crate::ids::ConversationId;

/// Version tag for the serialized store, for future migrations
pub const STORE_VERSION: u32 = 1;

const CONVERSATIONS_KEY: &str = "conversations";
const ACTIVE_CONVERSATION_KEY: &str = "active-conversation-id";
const THEME_KEY: &str = "theme";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Serialized envelope. Conversations keep their insertion order so
/// "first remaining becomes active" after a delete is deterministic.
#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    conversations: Vec<Conversation>,
}

pub struct ConversationStore<S: Storage> {
    storage: S,
    conversations: Vec<Conversation>,
    active_id: Option<ConversationId>,
}

impl<S: Storage> ConversationStore<S> {
    /// Open the store, loading whatever the backend holds. Fails open: any
    /// deserialization problem yields an empty mapping.
    pub fn open(storage: S) -> Self {
        let conversations = storage
            .get(CONVERSATIONS_KEY)
            .and_then(|json| serde_json::from_str::<StoreFile>(&json).ok())
            .filter(|file| file.version == STORE_VERSION)
            .map(|file| file.conversations)
            .unwrap_or_default();

        let active_id = storage
            .get(ACTIVE_CONVERSATION_KEY)
            .map(ConversationId::from_string)
            .filter(|id| conversations.iter().any(|c| c.id == *id));

        Self {
            storage,
            conversations,
            active_id,
        }
    }

    /// Persist the whole store
    pub fn save(&self) -> Result<(), ChatError> {
        let file = StoreFile {
            version: STORE_VERSION,
            conversations: self.conversations.clone(),
        };
        let json = serde_json::to_string(&file)
            .map_err(|e| ChatError::Storage(format!("serializing store: {}", e)))?;
        self.storage
            .set(CONVERSATIONS_KEY, &json)
            .map_err(|e| ChatError::Storage(e.to_string()))?;
        match &self.active_id {
            Some(id) => self
                .storage
                .set(ACTIVE_CONVERSATION_KEY, id.as_str())
                .map_err(|e| ChatError::Storage(e.to_string()))?,
            None => self
                .storage
                .remove(ACTIVE_CONVERSATION_KEY)
                .map_err(|e| ChatError::Storage(e.to_string()))?,
        }
        Ok(())
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == *id)
    }

    pub fn get_mut(&mut self, id: &ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == *id)
    }

    pub fn active_id(&self) -> Option<&ConversationId> {
        self.active_id.as_ref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        let id = self.active_id.as_ref()?;
        self.conversations.iter().find(|c| c.id == *id)
    }

    pub fn active_mut(&mut self) -> Option<&mut Conversation> {
        let id = self.active_id.clone()?;
        self.get_mut(&id)
    }

    /// Make `id` the active conversation
    pub fn set_active(&mut self, id: &ConversationId) -> Result<(), ChatError> {
        if self.get(id).is_none() {
            return Err(ChatError::Storage(format!(
                "conversation {} does not exist",
                id
            )));
        }
        self.active_id = Some(id.clone());
        self.save()
    }

    /// Ensure some conversation is active, creating one if the store is
    /// empty. Returns the active id.
    pub fn ensure_active(&mut self) -> Result<ConversationId, ChatError> {
        if let Some(active) = self.active() {
            return Ok(active.id.clone());
        }
        if let Some(first) = self.conversations.first() {
            let id = first.id.clone();
            self.set_active(&id)?;
            return Ok(id);
        }
        self.start_new()
    }

    /// Start a fresh conversation and make it active.
    ///
    /// The previous active conversation is tidied up first: an untitled
    /// seed-only conversation is discarded rather than kept as clutter; an
    /// untitled one with real exchanges receives a derived title.
    pub fn start_new(&mut self) -> Result<ConversationId, ChatError> {
        let tidy = self
            .active()
            .map(|c| (c.id.clone(), c.is_seed_only(), c.is_untitled(), c.derive_title()));
        if let Some((id, seed_only, untitled, derived)) = tidy {
            if seed_only && untitled {
                self.conversations.retain(|c| c.id != id);
            } else if untitled {
                if let Some(conversation) = self.get_mut(&id) {
                    conversation.title = derived;
                }
            }
        }

        let conversation = Conversation::new();
        let id = conversation.id.clone();
        self.conversations.push(conversation);
        self.active_id = Some(id.clone());
        self.save()?;
        Ok(id)
    }

    /// Delete a conversation. Interactive confirmation is the caller's
    /// concern. If the deleted conversation was active, the active pointer
    /// moves to the first remaining conversation, or a fresh one — it is
    /// never left dangling.
    pub fn delete(&mut self, id: &ConversationId) -> Result<(), ChatError> {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != *id);
        if self.conversations.len() == before {
            return Ok(());
        }

        if self.active_id.as_ref() == Some(id) {
            self.active_id = None;
            let next = self.conversations.first().map(|c| c.id.clone());
            match next {
                Some(next) => self.set_active(&next)?,
                None => {
                    self.start_new()?;
                }
            }
        } else {
            self.save()?;
        }
        Ok(())
    }

    /// Manual rename; bypasses automatic derivation and is never overwritten
    /// by it.
    pub fn rename(&mut self, id: &ConversationId, title: impl Into<String>) -> Result<(), ChatError> {
        if let Some(conversation) = self.get_mut(id) {
            conversation.title = title.into();
            self.save()?;
        }
        Ok(())
    }

    pub fn theme(&self) -> Theme {
        self.storage
            .get(THEME_KEY)
            .and_then(|s| Theme::from_str(&s))
            .unwrap_or(Theme::Dark)
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), ChatError> {
        self.storage
            .set(THEME_KEY, theme.as_str())
            .map_err(|e| ChatError::Storage(e.to_string()))
    }
}
