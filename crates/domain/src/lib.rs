//! Domain model for NPC conversations.
//!
//! Pure types and rules with no I/O: identifiers, the conversation, NPC and
//! message entities, and the value objects that normalize recipients and
//! classify delivery.

pub mod entities;
pub mod error;
pub mod ids;
pub mod value_objects;

pub use entities::{Conversation, Message, NpcProfile};
pub use error::DomainError;
pub use ids::{ConversationId, MessageId, NpcId, UserId};
pub use value_objects::{
    ClassifyError, DeliveryMode, MessageRecipients, RecipientInput, RecipientToken, Recipients,
    Sender, SenderKind, BROADCAST_MARKER,
};
