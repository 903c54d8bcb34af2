//! Recipient addressing.
//!
//! Inbound requests address a message with a loosely typed field: nothing,
//! a single id, a list of ids, or the `"all"` sentinel. [`Recipients::normalize`]
//! turns that into a typed value. Persisted messages carry the richer
//! [`MessageRecipients`], which also covers NPC replies addressed back to the
//! player.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{NpcId, UserId};

/// Sentinel that addresses every NPC in the conversation.
pub const BROADCAST_MARKER: &str = "all";

/// Raw recipient field as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipientInput {
    Many(Vec<RecipientToken>),
    One(RecipientToken),
}

/// A single entry of the raw recipient field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipientToken {
    Text(String),
    Integer(i64),
}

impl RecipientToken {
    fn is_broadcast(&self) -> bool {
        matches!(self, Self::Text(text) if text == BROADCAST_MARKER)
    }

    fn to_npc_id(&self) -> Result<NpcId, DomainError> {
        match self {
            Self::Text(text) => text.parse(),
            Self::Integer(n) => Err(DomainError::invalid_id(format!("npc id '{n}'"))),
        }
    }
}

impl From<&str> for RecipientToken {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<NpcId> for RecipientToken {
    fn from(value: NpcId) -> Self {
        Self::Text(value.to_string())
    }
}

/// Normalized recipients of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// Visible to every current and future NPC of the conversation.
    Broadcast,
    /// Addressed to specific NPCs. May be empty before classification.
    Npcs(BTreeSet<NpcId>),
}

impl Recipients {
    /// Canonicalize a raw recipient field.
    ///
    /// A single value is treated as a one-element list. `"all"` anywhere in
    /// the list collapses the result to [`Recipients::Broadcast`] and every
    /// other entry is discarded, malformed ones included. Duplicate ids are
    /// merged.
    pub fn normalize(input: Option<RecipientInput>) -> Result<Self, DomainError> {
        let tokens = match input {
            None => Vec::new(),
            Some(RecipientInput::One(token)) => vec![token],
            Some(RecipientInput::Many(tokens)) => tokens,
        };

        if tokens.iter().any(RecipientToken::is_broadcast) {
            return Ok(Self::Broadcast);
        }

        let ids = tokens
            .iter()
            .map(RecipientToken::to_npc_id)
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Self::Npcs(ids))
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast)
    }

    /// True only for an empty NPC set; broadcast is never empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Npcs(ids) if ids.is_empty())
    }

    /// Addressed NPCs in ascending id order. Empty for broadcast.
    pub fn npc_ids(&self) -> Vec<NpcId> {
        match self {
            Self::Broadcast => Vec::new(),
            Self::Npcs(ids) => ids.iter().copied().collect(),
        }
    }
}

/// Recipients as recorded on a stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ids", rename_all = "snake_case")]
pub enum MessageRecipients {
    Broadcast,
    Npcs(BTreeSet<NpcId>),
    /// An NPC reply routed back to the human player.
    Player(UserId),
    /// NPC-to-player message whose recipient is implied by the conversation.
    Implicit,
}

impl MessageRecipients {
    /// Whether an NPC is an addressee, either directly or through broadcast.
    pub fn reaches(&self, npc_id: NpcId) -> bool {
        match self {
            Self::Broadcast => true,
            Self::Npcs(ids) => ids.contains(&npc_id),
            Self::Player(_) | Self::Implicit => false,
        }
    }

    pub fn kind_str(&self) -> Option<&'static str> {
        match self {
            Self::Broadcast => Some("broadcast"),
            Self::Npcs(_) => Some("npcs"),
            Self::Player(_) => Some("player"),
            Self::Implicit => None,
        }
    }

    /// Serialized id list: NPC ids, `["all"]` for broadcast, the player id,
    /// or `None` when implicit.
    pub fn encoded_ids(&self) -> Option<Vec<String>> {
        match self {
            Self::Broadcast => Some(vec![BROADCAST_MARKER.to_string()]),
            Self::Npcs(ids) => Some(ids.iter().map(ToString::to_string).collect()),
            Self::Player(user_id) => Some(vec![user_id.to_string()]),
            Self::Implicit => None,
        }
    }

    /// Rebuild from the stored kind tag and id list.
    pub fn decode(kind: Option<&str>, ids: Option<Vec<String>>) -> Result<Self, DomainError> {
        match (kind, ids) {
            (None, _) => Ok(Self::Implicit),
            (Some("broadcast"), _) => Ok(Self::Broadcast),
            (Some("npcs"), Some(ids)) => ids
                .iter()
                .map(|id| id.parse::<NpcId>())
                .collect::<Result<BTreeSet<_>, _>>()
                .map(Self::Npcs),
            (Some("player"), Some(ids)) => match ids.as_slice() {
                [user_id] => Ok(Self::Player(user_id.parse()?)),
                _ => Err(DomainError::parse("player recipients must hold exactly one id")),
            },
            (Some(other), _) => Err(DomainError::parse(format!(
                "Unknown recipient encoding: {other}"
            ))),
        }
    }
}

impl From<Recipients> for MessageRecipients {
    fn from(value: Recipients) -> Self {
        match value {
            Recipients::Broadcast => Self::Broadcast,
            Recipients::Npcs(ids) => Self::Npcs(ids),
        }
    }
}
