//! Domain entities.

mod conversation;
mod message;
mod npc;

pub use conversation::Conversation;
pub use message::Message;
pub use npc::NpcProfile;
