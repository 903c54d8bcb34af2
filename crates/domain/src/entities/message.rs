//! Message entity - One immutable entry of a conversation's append-only log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{ConversationId, MessageId, NpcId, UserId};
use crate::value_objects::{DeliveryMode, MessageRecipients, Sender};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: Sender,
    pub content: String,
    pub recipients: MessageRecipients,
    pub delivery_mode: DeliveryMode,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a new message, rejecting blank content.
    pub fn new(
        conversation_id: ConversationId,
        sender: Sender,
        content: impl Into<String>,
        recipients: MessageRecipients,
        delivery_mode: DeliveryMode,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::validation("message content cannot be empty"));
        }

        Ok(Self {
            id: MessageId::new(),
            conversation_id,
            sender,
            content,
            recipients,
            delivery_mode,
            created_at,
        })
    }

    /// An NPC reply routed back to the player who addressed it.
    pub fn npc_reply(
        conversation_id: ConversationId,
        npc_id: NpcId,
        player_id: UserId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Self::new(
            conversation_id,
            Sender::Npc(npc_id),
            content,
            MessageRecipients::Player(player_id),
            DeliveryMode::NpcToPlayer,
            created_at,
        )
    }

    /// Whether this message belongs in an NPC's context window.
    ///
    /// Broadcasts, messages addressed to the NPC, and the NPC's own messages
    /// are visible. Everything else is private to someone else.
    pub fn is_visible_to(&self, npc_id: NpcId) -> bool {
        self.recipients.reaches(npc_id) || self.sender.is_npc(npc_id)
    }
}
