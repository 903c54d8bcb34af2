//! Shared fakes for use case and handler tests.
//!
//! Conversation and NPC lookups are served by mockall mocks seeded from a
//! [`Table`]; the message log and the LLM get hand-written fakes because tests
//! need to inspect what was written and steer each NPC's reply.

mod llm;
mod messages;

pub use llm::ScriptedLlm;
pub use messages::InMemoryMessageRepo;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use npcchat_domain::{Conversation, ConversationId, NpcId, NpcProfile, UserId};

use crate::infrastructure::ports::{MockConversationRepo, MockNpcRepo};

pub fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
}

/// One conversation, its owner and a cast of NPCs.
#[derive(Clone)]
pub struct Table {
    pub owner: UserId,
    pub conversation: Conversation,
    npcs: HashMap<NpcId, NpcProfile>,
    participants: HashSet<NpcId>,
}

impl Table {
    pub fn new() -> Self {
        let owner = UserId::new();
        Self {
            owner,
            conversation: Conversation::new("The Rusty Flagon", owner, fixed_time()),
            npcs: HashMap::new(),
            participants: HashSet::new(),
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation.id
    }

    /// Add an NPC seated at this conversation.
    pub fn seat(&mut self, name: &str, backstory: &str) -> NpcId {
        let id = self.stranger(name, backstory);
        self.participants.insert(id);
        id
    }

    /// Add an NPC that exists but is not part of this conversation.
    pub fn stranger(&mut self, name: &str, backstory: &str) -> NpcId {
        let npc = NpcProfile::new(name, backstory, self.owner);
        let id = npc.id;
        self.npcs.insert(id, npc);
        id
    }

    pub fn conversation_repo(&self) -> MockConversationRepo {
        let mut repo = MockConversationRepo::new();

        let conversation = self.conversation.clone();
        repo.expect_get().returning(move |id| {
            Ok((id == conversation.id).then(|| conversation.clone()))
        });

        let conversation_id = self.conversation.id;
        let participants = self.participants.clone();
        repo.expect_is_participant()
            .returning(move |cid, npc| Ok(cid == conversation_id && participants.contains(&npc)));

        let participants = self.participants.clone();
        repo.expect_list_participants().returning(move |cid| {
            let mut ids: Vec<_> = participants.iter().copied().collect();
            ids.sort();
            Ok(if cid == conversation_id { ids } else { Vec::new() })
        });

        repo
    }

    pub fn npc_repo(&self) -> MockNpcRepo {
        let mut repo = MockNpcRepo::new();
        let npcs = self.npcs.clone();
        repo.expect_get()
            .returning(move |id| Ok(npcs.get(&id).cloned()));
        repo
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}
