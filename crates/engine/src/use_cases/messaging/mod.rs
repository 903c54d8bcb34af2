//! Messaging use cases.
//!
//! A player message flows through [`SendMessage`]: recipients are normalized,
//! the delivery mode is derived, the message is stored, and for player-to-NPC
//! messages [`RespondAsNpcs`] lets each addressed NPC reply using only the
//! context [`AssembleNpcContext`] allows it to see.

use std::sync::Arc;

mod context;
mod list;
mod prompt;
mod respond;
mod send;

pub use context::{AssembleNpcContext, ContextLine, ContextWindow, CONTEXT_WINDOW};
pub use list::{ConversationMessage, ListMessages, ListMessagesError};
pub use prompt::build_persona_prompt;
pub use respond::{Addressee, ReplyFailure, ReplyOutcome, RespondAsNpcs, Utterance};
pub use send::{MessageSent, SendMessage, SendMessageError, SendMessageInput};

/// Container for messaging use cases.
pub struct MessagingUseCases {
    pub send: Arc<SendMessage>,
    pub list: Arc<ListMessages>,
    pub context: Arc<AssembleNpcContext>,
}

impl MessagingUseCases {
    pub fn new(
        send: Arc<SendMessage>,
        list: Arc<ListMessages>,
        context: Arc<AssembleNpcContext>,
    ) -> Self {
        Self {
            send,
            list,
            context,
        }
    }
}
