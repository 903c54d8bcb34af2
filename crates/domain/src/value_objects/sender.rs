//! Message authorship.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{NpcId, UserId};

/// Which side of the table wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    /// The human player who owns the conversation.
    User,
    /// An AI-driven character.
    Npc,
}

impl SenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Npc => "npc",
        }
    }
}

impl fmt::Display for SenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SenderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user" => Ok(Self::User),
            "npc" => Ok(Self::Npc),
            other => Err(DomainError::parse(format!("Unknown sender type: {other}"))),
        }
    }
}

/// A resolved message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Sender {
    User(UserId),
    Npc(NpcId),
}

impl Sender {
    pub fn kind(&self) -> SenderKind {
        match self {
            Self::User(_) => SenderKind::User,
            Self::Npc(_) => SenderKind::Npc,
        }
    }

    /// Raw id of the author, independent of kind.
    pub fn id_string(&self) -> String {
        match self {
            Self::User(id) => id.to_string(),
            Self::Npc(id) => id.to_string(),
        }
    }

    pub fn npc_id(&self) -> Option<NpcId> {
        match self {
            Self::Npc(id) => Some(*id),
            Self::User(_) => None,
        }
    }

    pub fn is_npc(&self, npc_id: NpcId) -> bool {
        self.npc_id() == Some(npc_id)
    }
}
