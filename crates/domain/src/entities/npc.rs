//! NPC profile - Persona data used to condition generated replies.

use serde::{Deserialize, Serialize};

use crate::ids::{NpcId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcProfile {
    pub id: NpcId,
    pub name: String,
    /// Persona backstory text fed verbatim into prompts.
    pub backstory: String,
    pub owner_id: UserId,
}

impl NpcProfile {
    pub fn new(name: impl Into<String>, backstory: impl Into<String>, owner_id: UserId) -> Self {
        Self {
            id: NpcId::new(),
            name: name.into(),
            backstory: backstory.into(),
            owner_id,
        }
    }
}
