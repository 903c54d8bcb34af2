//! Conversation entity - A chat owned by one player, shared with NPC participants.
//!
//! Conversations and their participant links are maintained by collaborators
//! outside the messaging core. The core only reads them to authorize sends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    /// The single human player of this conversation.
    pub owner_id: UserId,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(title: impl Into<String>, owner_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ConversationId::new(),
            title: title.into(),
            owner_id,
            image_url: None,
            created_at,
        }
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }
}
