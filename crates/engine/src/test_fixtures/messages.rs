//! In-memory message log with the same visibility rules as the SQLite store.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use npcchat_domain::{ConversationId, Message, NpcId, Sender};

use crate::infrastructure::ports::{MessageRepo, RepoError};

#[derive(Default)]
pub struct InMemoryMessageRepo {
    messages: Mutex<Vec<Message>>,
    rejected_senders: Mutex<HashSet<Sender>>,
}

impl InMemoryMessageRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every append authored by `sender` fail.
    pub fn reject_from(self, sender: Sender) -> Self {
        self.rejected_senders
            .lock()
            .expect("rejected senders")
            .insert(sender);
        self
    }

    /// Seed a message without going through a use case.
    pub fn push(&self, message: Message) {
        self.messages.lock().expect("message log").push(message);
    }

    /// Snapshot of the log in insertion order.
    pub fn all(&self) -> Vec<Message> {
        self.messages.lock().expect("message log").clone()
    }
}

#[async_trait]
impl MessageRepo for InMemoryMessageRepo {
    async fn append(&self, message: &Message) -> Result<(), RepoError> {
        if self
            .rejected_senders
            .lock()
            .expect("rejected senders")
            .contains(&message.sender)
        {
            return Err(RepoError::database("append_message", "disk full"));
        }
        self.push(message.clone());
        Ok(())
    }

    async fn list_visible_to_npc(
        &self,
        conversation_id: ConversationId,
        npc_id: NpcId,
        limit: usize,
    ) -> Result<Vec<Message>, RepoError> {
        let log = self.all();
        // Newest first; among equal timestamps the later insert wins.
        let mut visible: Vec<_> = log
            .into_iter()
            .enumerate()
            .filter(|(_, m)| m.conversation_id == conversation_id && m.is_visible_to(npc_id))
            .collect();
        visible.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        Ok(visible.into_iter().take(limit).map(|(_, m)| m).collect())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, RepoError> {
        let mut messages: Vec<_> = self
            .all()
            .into_iter()
            .filter(|m| m.conversation_id == conversation_id)
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn list_by_sender(
        &self,
        conversation_id: ConversationId,
        sender: Sender,
    ) -> Result<Vec<Message>, RepoError> {
        let mut messages: Vec<_> = self
            .all()
            .into_iter()
            .filter(|m| m.conversation_id == conversation_id && m.sender == sender)
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}
