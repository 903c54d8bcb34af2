//! Delivery mode classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::recipients::Recipients;
use crate::value_objects::sender::Sender;

/// How a message travels through the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Player speaks to the whole table. Context only, nobody answers.
    PlayerToAll,
    /// Player addresses one or more NPCs, each of which replies.
    PlayerToNpc,
    /// An NPC speaks back to the player.
    NpcToPlayer,
}

/// Why a message cannot be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("missing recipients")]
    MissingRecipients,
    #[error("NPCs cannot send broadcast messages")]
    NpcBroadcast,
}

impl DeliveryMode {
    /// Derive the delivery mode from the author and the normalized recipients.
    ///
    /// Participation of an NPC author is checked by the caller, which owns
    /// store access.
    pub fn classify(sender: &Sender, recipients: &Recipients) -> Result<Self, ClassifyError> {
        match sender {
            Sender::User(_) if recipients.is_broadcast() => Ok(Self::PlayerToAll),
            Sender::User(_) if recipients.is_empty() => Err(ClassifyError::MissingRecipients),
            Sender::User(_) => Ok(Self::PlayerToNpc),
            Sender::Npc(_) if recipients.is_broadcast() => Err(ClassifyError::NpcBroadcast),
            Sender::Npc(_) => Ok(Self::NpcToPlayer),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlayerToAll => "player_to_all",
            Self::PlayerToNpc => "player_to_npc",
            Self::NpcToPlayer => "npc_to_player",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "player_to_all" => Ok(Self::PlayerToAll),
            "player_to_npc" => Ok(Self::PlayerToNpc),
            "npc_to_player" => Ok(Self::NpcToPlayer),
            other => Err(DomainError::parse(format!("Unknown delivery mode: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::ids::{NpcId, UserId};

    #[test]
    fn user_broadcast_is_player_to_all() {
        let mode = DeliveryMode::classify(&Sender::User(UserId::new()), &Recipients::Broadcast);
        assert_eq!(mode, Ok(DeliveryMode::PlayerToAll));
    }

    #[test]
    fn user_addressing_npcs_is_player_to_npc() {
        let recipients = Recipients::Npcs(BTreeSet::from([NpcId::new()]));
        let mode = DeliveryMode::classify(&Sender::User(UserId::new()), &recipients);
        assert_eq!(mode, Ok(DeliveryMode::PlayerToNpc));
    }

    #[test]
    fn user_without_recipients_is_rejected() {
        let recipients = Recipients::Npcs(BTreeSet::new());
        let mode = DeliveryMode::classify(&Sender::User(UserId::new()), &recipients);
        assert_eq!(mode, Err(ClassifyError::MissingRecipients));
    }

    #[test]
    fn npc_may_never_broadcast() {
        let mode = DeliveryMode::classify(&Sender::Npc(NpcId::new()), &Recipients::Broadcast);
        assert_eq!(mode, Err(ClassifyError::NpcBroadcast));
    }

    #[test]
    fn npc_speaks_to_the_player_regardless_of_listed_npcs() {
        let sender = Sender::Npc(NpcId::new());
        for recipients in [
            Recipients::Npcs(BTreeSet::new()),
            Recipients::Npcs(BTreeSet::from([NpcId::new()])),
        ] {
            assert_eq!(
                DeliveryMode::classify(&sender, &recipients),
                Ok(DeliveryMode::NpcToPlayer)
            );
        }
    }

    #[test]
    fn wire_names_parse_back() {
        assert_eq!("player_to_npc".parse(), Ok(DeliveryMode::PlayerToNpc));
        assert!("whisper".parse::<DeliveryMode>().is_err());
    }
}
