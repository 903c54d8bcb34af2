//! Send message use case.
//!
//! Flow: validate the request, classify it, persist the original message,
//! then for player-to-NPC messages let every addressed NPC take a turn.
//! Nothing is written until validation passes; once it passes the original
//! message is written exactly once, whatever happens to the replies.

use std::sync::Arc;

use npcchat_domain::{
    ClassifyError, Conversation, ConversationId, DeliveryMode, DomainError, Message,
    MessageRecipients, NpcId, RecipientInput, Recipients, Sender, SenderKind, UserId,
};

use super::respond::{Addressee, ReplyFailure, ReplyOutcome, RespondAsNpcs, Utterance};
use crate::infrastructure::ports::{ClockPort, ConversationRepo, MessageRepo, NpcRepo, RepoError};

/// Inbound message as received from a transport, not yet validated.
#[derive(Debug, Clone, Default)]
pub struct SendMessageInput {
    pub conversation_id: ConversationId,
    /// Authenticated caller, if any.
    pub caller: Option<UserId>,
    pub sender_type: Option<String>,
    pub sender_id: Option<String>,
    pub content: Option<String>,
    pub recipients: Option<RecipientInput>,
    /// Client-side delivery hint. The derived mode always wins.
    pub message_type: Option<String>,
}

/// A persisted message and what its addressees did with it.
#[derive(Debug, Clone)]
pub struct MessageSent {
    pub message: Message,
    /// Set when the client's `message_type` hint disagreed with the derived mode.
    pub ignored_hint: Option<String>,
    pub outcomes: Vec<ReplyOutcome>,
}

impl MessageSent {
    pub fn delivery_mode(&self) -> DeliveryMode {
        self.message.delivery_mode
    }

    pub fn replies(&self) -> impl Iterator<Item = &ReplyOutcome> {
        self.outcomes.iter().filter(|o| o.is_replied())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReplyOutcome> {
        self.outcomes.iter().filter(|o| !o.is_replied())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendMessageError {
    #[error("{0}")]
    Validation(String),
    #[error("recipients are required")]
    MissingRecipients,
    #[error("authentication required")]
    Unauthenticated,
    #[error("Conversation not found")]
    ConversationNotFound,
    #[error("You do not have access to this conversation")]
    ConversationAccessDenied,
    #[error("NPC not found")]
    NpcNotFound,
    #[error("NPC is not a participant of this conversation")]
    NpcNotParticipant,
    #[error("NPCs cannot send broadcast messages")]
    NpcBroadcast,
    #[error("No valid recipients found")]
    RecipientsNotFound,
    #[error("Recipients are not participants of this conversation")]
    RecipientsOutsideConversation,
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl From<ClassifyError> for SendMessageError {
    fn from(error: ClassifyError) -> Self {
        match error {
            ClassifyError::MissingRecipients => Self::MissingRecipients,
            ClassifyError::NpcBroadcast => Self::NpcBroadcast,
        }
    }
}

pub struct SendMessage {
    conversations: Arc<dyn ConversationRepo>,
    npcs: Arc<dyn NpcRepo>,
    messages: Arc<dyn MessageRepo>,
    respond: Arc<RespondAsNpcs>,
    clock: Arc<dyn ClockPort>,
}

impl SendMessage {
    pub fn new(
        conversations: Arc<dyn ConversationRepo>,
        npcs: Arc<dyn NpcRepo>,
        messages: Arc<dyn MessageRepo>,
        respond: Arc<RespondAsNpcs>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            conversations,
            npcs,
            messages,
            respond,
            clock,
        }
    }

    pub async fn execute(&self, input: SendMessageInput) -> Result<MessageSent, SendMessageError> {
        // 1. Shape checks that need no store access
        let content = input
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SendMessageError::Validation("content is required".to_string()))?
            .to_string();

        let sender_kind: SenderKind = input
            .sender_type
            .as_deref()
            .ok_or_else(|| SendMessageError::Validation("sender_type is required".to_string()))?
            .parse()
            .map_err(|e: DomainError| SendMessageError::Validation(e.to_string()))?;

        let recipients = Recipients::normalize(input.recipients)
            .map_err(|e| SendMessageError::Validation(e.to_string()))?;

        if sender_kind == SenderKind::User && input.caller.is_none() {
            return Err(SendMessageError::Unauthenticated);
        }

        // 2. Conversation and author
        let conversation = self
            .conversations
            .get(input.conversation_id)
            .await?
            .ok_or(SendMessageError::ConversationNotFound)?;

        let sender = match sender_kind {
            SenderKind::User => self.authorize_player(&conversation, input.caller)?,
            SenderKind::Npc => {
                self.authorize_npc(&conversation, input.caller, input.sender_id.as_deref())
                    .await?
            }
        };

        // 3. Delivery mode
        let mode = DeliveryMode::classify(&sender, &recipients)?;
        let ignored_hint = check_hint(input.message_type.as_deref(), mode);

        // 4. Addressees must include at least one NPC seated here
        let addressees = match mode {
            DeliveryMode::PlayerToNpc => {
                let addressees = self
                    .respond
                    .resolve(conversation.id, &recipients.npc_ids())
                    .await?;
                ensure_someone_can_answer(&addressees)?;
                addressees
            }
            DeliveryMode::PlayerToAll | DeliveryMode::NpcToPlayer => Vec::new(),
        };

        // 5. Persist the original
        let stored_recipients = match mode {
            DeliveryMode::NpcToPlayer => MessageRecipients::Player(conversation.owner_id),
            DeliveryMode::PlayerToAll | DeliveryMode::PlayerToNpc => {
                MessageRecipients::from(recipients)
            }
        };
        let message = Message::new(
            conversation.id,
            sender,
            content,
            stored_recipients,
            mode,
            self.clock.now(),
        )
        .map_err(|e| SendMessageError::Validation(e.to_string()))?;

        self.messages.append(&message).await?;

        tracing::info!(
            conversation_id = %conversation.id,
            message_id = %message.id,
            sender_kind = %sender.kind(),
            delivery_mode = %mode,
            "Message stored"
        );

        // 6. NPC turns
        let outcomes = match Utterance::from_player_message(&message) {
            Some(utterance) if mode == DeliveryMode::PlayerToNpc => {
                self.respond.respond(&utterance, addressees).await
            }
            _ => Vec::new(),
        };

        Ok(MessageSent {
            message,
            ignored_hint,
            outcomes,
        })
    }

    fn authorize_player(
        &self,
        conversation: &Conversation,
        caller: Option<UserId>,
    ) -> Result<Sender, SendMessageError> {
        let caller = caller.ok_or(SendMessageError::Unauthenticated)?;
        if !conversation.is_owned_by(caller) {
            return Err(SendMessageError::ConversationAccessDenied);
        }
        Ok(Sender::User(caller))
    }

    /// NPC authors must exist and sit at the conversation. A caller, when
    /// present, must own it.
    async fn authorize_npc(
        &self,
        conversation: &Conversation,
        caller: Option<UserId>,
        sender_id: Option<&str>,
    ) -> Result<Sender, SendMessageError> {
        if caller.is_some_and(|user| !conversation.is_owned_by(user)) {
            return Err(SendMessageError::ConversationAccessDenied);
        }

        let npc_id: NpcId = sender_id
            .ok_or_else(|| {
                SendMessageError::Validation("sender_id is required for NPC messages".to_string())
            })?
            .parse()
            .map_err(|e: DomainError| SendMessageError::Validation(e.to_string()))?;

        if self.npcs.get(npc_id).await?.is_none() {
            return Err(SendMessageError::NpcNotFound);
        }
        if !self
            .conversations
            .is_participant(conversation.id, npc_id)
            .await?
        {
            return Err(SendMessageError::NpcNotParticipant);
        }
        Ok(Sender::Npc(npc_id))
    }
}

/// Returns the hint when it names a different mode than the derived one.
fn check_hint(hint: Option<&str>, derived: DeliveryMode) -> Option<String> {
    let hint = hint?.trim();
    if hint.is_empty() {
        return None;
    }
    match hint.parse::<DeliveryMode>() {
        Ok(mode) if mode == derived => None,
        _ => {
            tracing::warn!(hint, derived = %derived, "Ignoring message_type hint");
            Some(hint.to_string())
        }
    }
}

/// Partial recipient problems degrade to per-NPC failures; a request nobody
/// can answer is rejected outright.
fn ensure_someone_can_answer(addressees: &[Addressee]) -> Result<(), SendMessageError> {
    if addressees.iter().any(Addressee::is_ready) {
        return Ok(());
    }
    let any_outsider = addressees.iter().any(|a| {
        matches!(
            a,
            Addressee::Unavailable {
                reason: ReplyFailure::NotParticipant,
                ..
            }
        )
    });
    if any_outsider {
        Err(SendMessageError::RecipientsOutsideConversation)
    } else {
        Err(SendMessageError::RecipientsNotFound)
    }
}
