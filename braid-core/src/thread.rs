//! Thread engine: traversal and mutation of one conversation's message forest
//!
//! - `context_path` reconstructs the linear root-to-leaf history handed to
//!   the model collaborator
//! - `append` adds a message under a parent
//! - `prune_for_edit` implements edit-as-prune-and-resend: the edited user
//!   message and every later sibling in the same parent group are removed
//!   (with their descendants), and the caller resends under the original
//!   parent

use llm::ChatMessage;
use std::collections::HashSet;

use crate::conversation::{Conversation, Message};
use crate::error::ChatError;
use crate::ids::MessageId;

impl Conversation {
    /// Build the root-to-leaf context path ending at `leaf_id`.
    ///
    /// Walks `parent_id` links upward and reverses. The final element is the
    /// leaf's own content. A parent reference that cannot be resolved is a
    /// hard error, not a silent truncation.
    pub fn context_path(&self, leaf_id: &MessageId) -> Result<Vec<ChatMessage>, ChatError> {
        let mut path = Vec::new();
        let mut current = match self.find(leaf_id) {
            Some(message) => message,
            None => return Err(ChatError::MessageNotFound(leaf_id.clone())),
        };

        loop {
            path.push(current.content.clone());
            match &current.parent_id {
                None => break,
                Some(parent_id) => {
                    current = self
                        .find(parent_id)
                        .ok_or_else(|| ChatError::DanglingParent(current.id.clone()))?;
                }
            }
        }

        path.reverse();
        Ok(path)
    }

    /// Append a new message under `parent_id` (None for top-level) and return
    /// it. The conversation is dirty afterwards; the caller persists.
    pub fn append(&mut self, parent_id: Option<MessageId>, content: ChatMessage) -> &Message {
        let message = Message::new(parent_id, content);
        self.history.push(message);
        self.history.last().expect("just pushed")
    }

    /// Remove `message_id` and every later sibling in its parent group, plus
    /// all their descendants, returning the parent id to resend under.
    ///
    /// Preconditions, checked before any mutation:
    /// - the message exists and is a user message
    /// - it has no thread replies
    /// - it carries no inline attachment (the resend path is text-only)
    pub fn prune_for_edit(
        &mut self,
        message_id: &MessageId,
    ) -> Result<Option<MessageId>, ChatError> {
        let target = self
            .find(message_id)
            .ok_or_else(|| ChatError::MessageNotFound(message_id.clone()))?;

        if !target.content.is_user() {
            return Err(ChatError::InvalidEdit(
                "only user messages can be edited".to_string(),
            ));
        }
        if self.has_replies(message_id) {
            return Err(ChatError::InvalidEdit(
                "this message already has replies".to_string(),
            ));
        }
        if target.content.payload.has_inline_data() {
            return Err(ChatError::InvalidEdit(
                "messages with attachments cannot be edited".to_string(),
            ));
        }

        let parent_id = target.parent_id.clone();

        // Collect the edited message and every later message in the same
        // sibling group, in insertion order.
        let mut removed: HashSet<MessageId> = HashSet::new();
        let mut found = false;
        for message in &self.history {
            if message.parent_id == parent_id {
                if message.id == *message_id {
                    found = true;
                }
                if found {
                    removed.insert(message.id.clone());
                }
            }
        }

        // Cascade to descendants of removed messages so no dangling parent
        // references survive the truncation.
        loop {
            let orphans: Vec<MessageId> = self
                .history
                .iter()
                .filter(|m| {
                    !removed.contains(&m.id)
                        && m.parent_id
                            .as_ref()
                            .is_some_and(|p| removed.contains(p))
                })
                .map(|m| m.id.clone())
                .collect();
            if orphans.is_empty() {
                break;
            }
            removed.extend(orphans);
        }

        self.history.retain(|m| !removed.contains(&m.id));
        Ok(parent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::ChatPayload;

    fn text_path(path: &[ChatMessage]) -> Vec<String> {
        path.iter().map(|m| m.get_text()).collect()
    }

    #[test]
    fn test_context_path_root_to_leaf_order() {
        let mut convo = Conversation::empty();
        let root = convo.append(None, ChatMessage::user("root")).id.clone();
        let mid = convo
            .append(Some(root.clone()), ChatMessage::model("mid"))
            .id
            .clone();
        let leaf = convo
            .append(Some(mid), ChatMessage::user("leaf"))
            .id
            .clone();

        let path = convo.context_path(&leaf).unwrap();
        assert_eq!(text_path(&path), vec!["root", "mid", "leaf"]);
    }

    #[test]
    fn test_context_path_last_element_is_leaf_for_every_message() {
        let mut convo = Conversation::empty();
        let a = convo.append(None, ChatMessage::user("a")).id.clone();
        let b = convo
            .append(Some(a.clone()), ChatMessage::model("b"))
            .id
            .clone();
        convo.append(None, ChatMessage::user("c"));
        convo.append(Some(b), ChatMessage::user("d"));

        for message in convo.history.clone() {
            let path = convo.context_path(&message.id).unwrap();
            assert_eq!(path.last().unwrap().get_text(), message.content.get_text());
        }
        // and the deep leaf sees its full ancestry in order
        let deep = convo.history.last().unwrap().id.clone();
        assert_eq!(text_path(&convo.context_path(&deep).unwrap()), vec!["a", "b", "d"]);
    }

    #[test]
    fn test_context_path_top_level_is_single_element() {
        let mut convo = Conversation::empty();
        let id = convo.append(None, ChatMessage::user("solo")).id.clone();
        let path = convo.context_path(&id).unwrap();
        assert_eq!(text_path(&path), vec!["solo"]);
    }

    #[test]
    fn test_context_path_dangling_parent_is_hard_error() {
        let mut convo = Conversation::empty();
        convo.append(None, ChatMessage::user("root"));
        // Insert a message whose parent never existed
        let orphan = Message::new(Some(MessageId::new()), ChatMessage::user("orphan"));
        let orphan_id = orphan.id.clone();
        convo.history.push(orphan);

        let err = convo.context_path(&orphan_id).unwrap_err();
        assert!(matches!(err, ChatError::DanglingParent(id) if id == orphan_id));
    }

    #[test]
    fn test_context_path_unknown_leaf() {
        let convo = Conversation::empty();
        let err = convo.context_path(&MessageId::new()).unwrap_err();
        assert!(matches!(err, ChatError::MessageNotFound(_)));
    }

    #[test]
    fn test_append_preserves_sibling_order() {
        let mut convo = Conversation::empty();
        let parent = convo.append(None, ChatMessage::model("parent")).id.clone();
        for i in 0..4 {
            convo.append(
                Some(parent.clone()),
                ChatMessage::user(format!("m{}", i)),
            );
        }

        let order: Vec<String> = convo
            .replies(&parent)
            .map(|m| m.content.get_text())
            .collect();
        assert_eq!(order, vec!["m0", "m1", "m2", "m3"]);
    }

    /// Sibling sequence [A, B, C, D] under one parent; editing B must leave
    /// exactly [A].
    #[test]
    fn test_prune_removes_edited_sibling_and_everything_after() {
        let mut convo = Conversation::empty();
        let parent = convo.append(None, ChatMessage::model("parent")).id.clone();
        let _a = convo
            .append(Some(parent.clone()), ChatMessage::model("A"))
            .id
            .clone();
        let b = convo
            .append(Some(parent.clone()), ChatMessage::user("B"))
            .id
            .clone();
        convo.append(Some(parent.clone()), ChatMessage::model("C"));
        convo.append(Some(parent.clone()), ChatMessage::user("D"));

        let resend_parent = convo.prune_for_edit(&b).unwrap();
        assert_eq!(resend_parent, Some(parent.clone()));

        let remaining: Vec<String> = convo
            .replies(&parent)
            .map(|m| m.content.get_text())
            .collect();
        assert_eq!(remaining, vec!["A"]);
    }

    #[test]
    fn test_prune_top_level_returns_none_parent() {
        let mut convo = Conversation::empty();
        convo.append(None, ChatMessage::model("welcome"));
        let user = convo.append(None, ChatMessage::user("question")).id.clone();
        convo.append(None, ChatMessage::model("answer"));

        let resend_parent = convo.prune_for_edit(&user).unwrap();
        assert_eq!(resend_parent, None);
        let remaining: Vec<String> = convo
            .top_level()
            .map(|m| m.content.get_text())
            .collect();
        assert_eq!(remaining, vec!["welcome"]);
    }

    #[test]
    fn test_prune_cascades_to_descendants_of_removed_siblings() {
        let mut convo = Conversation::empty();
        convo.append(None, ChatMessage::model("welcome"));
        let user = convo.append(None, ChatMessage::user("question")).id.clone();
        let answer = convo.append(None, ChatMessage::model("answer")).id.clone();
        // A thread hanging off the soon-to-be-removed answer
        let thread_reply = convo
            .append(Some(answer.clone()), ChatMessage::user("thread reply"))
            .id
            .clone();
        convo.append(Some(thread_reply), ChatMessage::model("thread answer"));

        convo.prune_for_edit(&user).unwrap();

        assert_eq!(convo.history.len(), 1);
        assert!(convo.validate().is_ok());
    }

    #[test]
    fn test_prune_rejects_message_with_replies() {
        let mut convo = Conversation::empty();
        let user = convo.append(None, ChatMessage::user("question")).id.clone();
        convo.append(Some(user.clone()), ChatMessage::model("thread reply"));

        let before = convo.history.clone();
        let err = convo.prune_for_edit(&user).unwrap_err();
        assert!(matches!(err, ChatError::InvalidEdit(_)));
        // Rejected before any mutation
        assert_eq!(convo.history, before);
    }

    #[test]
    fn test_prune_rejects_model_message() {
        let mut convo = Conversation::empty();
        let model = convo.append(None, ChatMessage::model("answer")).id.clone();
        assert!(matches!(
            convo.prune_for_edit(&model),
            Err(ChatError::InvalidEdit(_))
        ));
    }

    #[test]
    fn test_prune_rejects_attachment_message() {
        let mut convo = Conversation::empty();
        let msg = convo
            .append(
                None,
                ChatMessage::user(ChatPayload::new(vec![
                    llm::Part::inline_data("aW1n", "image/png"),
                    llm::Part::text("look at this"),
                ])),
            )
            .id
            .clone();
        assert!(matches!(
            convo.prune_for_edit(&msg),
            Err(ChatError::InvalidEdit(_))
        ));
    }

    #[test]
    fn test_prune_does_not_touch_other_sibling_groups() {
        let mut convo = Conversation::empty();
        let first = convo.append(None, ChatMessage::model("first")).id.clone();
        convo.append(Some(first.clone()), ChatMessage::user("thread a"));
        let user = convo.append(None, ChatMessage::user("question")).id.clone();

        convo.prune_for_edit(&user).unwrap();

        assert_eq!(convo.reply_count(&first), 1);
        assert_eq!(convo.top_level().count(), 1);
    }
}
