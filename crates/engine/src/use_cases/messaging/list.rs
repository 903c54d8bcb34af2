//! Read-side use cases: a conversation's full log and one author's messages.

use std::collections::HashMap;
use std::sync::Arc;

use npcchat_domain::{
    Conversation, ConversationId, DomainError, Message, NpcId, Sender, SenderKind, UserId,
};

use crate::infrastructure::ports::{ConversationRepo, MessageRepo, NpcRepo, RepoError};

/// A stored message with its NPC author's display name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub message: Message,
    /// Set for NPC authors that still exist.
    pub sender_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListMessagesError {
    #[error("{0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("Conversation not found")]
    ConversationNotFound,
    #[error("You do not have access to this conversation")]
    AccessDenied,
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

pub struct ListMessages {
    conversations: Arc<dyn ConversationRepo>,
    npcs: Arc<dyn NpcRepo>,
    messages: Arc<dyn MessageRepo>,
}

impl ListMessages {
    pub fn new(
        conversations: Arc<dyn ConversationRepo>,
        npcs: Arc<dyn NpcRepo>,
        messages: Arc<dyn MessageRepo>,
    ) -> Self {
        Self {
            conversations,
            npcs,
            messages,
        }
    }

    /// Every message of the conversation, oldest first.
    pub async fn for_conversation(
        &self,
        caller: Option<UserId>,
        conversation_id: ConversationId,
    ) -> Result<Vec<ConversationMessage>, ListMessagesError> {
        let caller = caller.ok_or(ListMessagesError::Unauthenticated)?;
        let conversation = self.owned_conversation(caller, conversation_id).await?;

        let messages = self.messages.list_for_conversation(conversation.id).await?;
        self.with_sender_names(messages).await
    }

    /// Messages written by one author, oldest first.
    pub async fn by_sender(
        &self,
        caller: Option<UserId>,
        conversation_id: ConversationId,
        sender_type: Option<&str>,
        sender_id: &str,
    ) -> Result<Vec<ConversationMessage>, ListMessagesError> {
        let caller = caller.ok_or(ListMessagesError::Unauthenticated)?;
        let sender = parse_sender(sender_type, sender_id)?;
        let conversation = self.owned_conversation(caller, conversation_id).await?;

        let messages = self
            .messages
            .list_by_sender(conversation.id, sender)
            .await?;
        self.with_sender_names(messages).await
    }

    async fn owned_conversation(
        &self,
        caller: UserId,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ListMessagesError> {
        let conversation = self
            .conversations
            .get(conversation_id)
            .await?
            .ok_or(ListMessagesError::ConversationNotFound)?;
        if !conversation.is_owned_by(caller) {
            return Err(ListMessagesError::AccessDenied);
        }
        Ok(conversation)
    }

    async fn with_sender_names(
        &self,
        messages: Vec<Message>,
    ) -> Result<Vec<ConversationMessage>, ListMessagesError> {
        let mut names: HashMap<NpcId, Option<String>> = HashMap::new();
        let mut listed = Vec::with_capacity(messages.len());

        for message in messages {
            let sender_name = match message.sender.npc_id() {
                Some(npc_id) => match names.get(&npc_id) {
                    Some(name) => name.clone(),
                    None => {
                        let name = self.npcs.get(npc_id).await?.map(|npc| npc.name);
                        names.insert(npc_id, name.clone());
                        name
                    }
                },
                None => None,
            };
            listed.push(ConversationMessage {
                message,
                sender_name,
            });
        }

        Ok(listed)
    }
}

fn parse_sender(sender_type: Option<&str>, sender_id: &str) -> Result<Sender, ListMessagesError> {
    let invalid = |e: DomainError| ListMessagesError::Validation(e.to_string());

    let kind: SenderKind = sender_type
        .ok_or_else(|| ListMessagesError::Validation("sender_type is required".to_string()))?
        .parse()
        .map_err(invalid)?;

    Ok(match kind {
        SenderKind::User => Sender::User(sender_id.parse().map_err(invalid)?),
        SenderKind::Npc => Sender::Npc(sender_id.parse().map_err(invalid)?),
    })
}
