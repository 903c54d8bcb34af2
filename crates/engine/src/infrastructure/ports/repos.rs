//! Repository port traits for database access.

use async_trait::async_trait;
use npcchat_domain::{Conversation, ConversationId, Message, NpcId, NpcProfile, Sender};

use super::error::RepoError;

// =============================================================================
// Conversations and participants
// =============================================================================

/// Conversations and their NPC participant links.
///
/// Writes belong to the conversation/participant collaborators; the messaging
/// core only reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationRepo: Send + Sync {
    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, RepoError>;
    async fn save(&self, conversation: &Conversation) -> Result<(), RepoError>;
    /// Removes the conversation together with its messages and participant links.
    async fn delete(&self, id: ConversationId) -> Result<(), RepoError>;

    async fn add_participant(
        &self,
        conversation_id: ConversationId,
        npc_id: NpcId,
    ) -> Result<(), RepoError>;
    async fn list_participants(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<NpcId>, RepoError>;
    async fn is_participant(
        &self,
        conversation_id: ConversationId,
        npc_id: NpcId,
    ) -> Result<bool, RepoError>;
}

// =============================================================================
// NPC profiles
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NpcRepo: Send + Sync {
    async fn get(&self, id: NpcId) -> Result<Option<NpcProfile>, RepoError>;
    async fn save(&self, npc: &NpcProfile) -> Result<(), RepoError>;
}

// =============================================================================
// Message store
// =============================================================================

/// Append-only message log with per-NPC visibility.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepo: Send + Sync {
    /// Persist one message and its visibility rows atomically.
    async fn append(&self, message: &Message) -> Result<(), RepoError>;

    /// Most recent messages visible to `npc_id`, newest first, at most `limit`.
    ///
    /// Visible means broadcast, addressed to the NPC, or written by it.
    async fn list_visible_to_npc(
        &self,
        conversation_id: ConversationId,
        npc_id: NpcId,
        limit: usize,
    ) -> Result<Vec<Message>, RepoError>;

    /// Every message of a conversation, oldest first.
    async fn list_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, RepoError>;

    /// Messages from one author, oldest first.
    async fn list_by_sender(
        &self,
        conversation_id: ConversationId,
        sender: Sender,
    ) -> Result<Vec<Message>, RepoError>;
}
