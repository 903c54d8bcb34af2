//! Per-NPC context assembly.
//!
//! An NPC only ever sees broadcasts, messages addressed to it and its own
//! replies. The window is the last [`CONTEXT_WINDOW`] of those, oldest first.

use std::sync::Arc;

use npcchat_domain::{ConversationId, Message, MessageId, NpcId, Sender};

use crate::infrastructure::ports::{MessageRepo, RepoError};

/// Number of visible messages fed into a prompt.
pub const CONTEXT_WINDOW: usize = 10;

/// One visible message, reduced to what the prompt needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLine {
    pub message_id: MessageId,
    pub speaker: Sender,
    pub content: String,
}

impl From<Message> for ContextLine {
    fn from(message: Message) -> Self {
        Self {
            message_id: message.id,
            speaker: message.sender,
            content: message.content,
        }
    }
}

/// Chronological slice of the conversation as one NPC knows it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextWindow {
    lines: Vec<ContextLine>,
}

impl ContextWindow {
    pub fn new(lines: Vec<ContextLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[ContextLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Message texts in order, without speakers.
    pub fn utterances(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.content.as_str()).collect()
    }
}

pub struct AssembleNpcContext {
    messages: Arc<dyn MessageRepo>,
    window: usize,
}

impl AssembleNpcContext {
    pub fn new(messages: Arc<dyn MessageRepo>) -> Self {
        Self {
            messages,
            window: CONTEXT_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Build the context window of `npc_id` in `conversation_id`.
    ///
    /// Read-only. Reflects every message committed before the call.
    pub async fn execute(
        &self,
        conversation_id: ConversationId,
        npc_id: NpcId,
    ) -> Result<ContextWindow, RepoError> {
        let mut recent = self
            .messages
            .list_visible_to_npc(conversation_id, npc_id, self.window)
            .await?;

        // The store filters already; a leaking adapter must not leak into a prompt.
        recent.retain(|message| message.is_visible_to(npc_id));
        recent.truncate(self.window);
        recent.reverse();

        Ok(ContextWindow::new(
            recent.into_iter().map(ContextLine::from).collect(),
        ))
    }
}
