//! HTTP routes.
//!
//! Caller identity arrives in the `X-User-Id` header, set by the auth layer
//! in front of the engine.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use npcchat_domain::{
    ConversationId, DeliveryMode, MessageId, NpcId, RecipientInput, SenderKind, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::App;
use crate::use_cases::messaging::{
    ConversationMessage, ListMessagesError, MessageSent, ReplyFailure, ReplyOutcome,
    SendMessageError, SendMessageInput,
};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route(
            "/api/conversations/{id}/messages",
            get(list_messages).post(send_message),
        )
        .route(
            "/api/conversations/{id}/senders/{sender_id}/messages",
            get(list_sender_messages),
        )
}

async fn health() -> &'static str {
    "OK"
}

fn caller_id(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

// =============================================================================
// Send
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender_type: Option<String>,
    pub sender_id: Option<String>,
    pub content: Option<String>,
    pub recipients: Option<RecipientInput>,
    pub message_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: &'static str,
    pub message_id: MessageId,
    pub delivery_mode: DeliveryMode,
    pub replies: Vec<ReplyDto>,
    pub failed: Vec<FailedReplyDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_message_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplyDto {
    pub npc_id: NpcId,
    pub message_id: MessageId,
}

#[derive(Debug, Serialize)]
pub struct FailedReplyDto {
    pub npc_id: NpcId,
    pub reason: ReplyFailure,
    pub error: String,
}

impl From<MessageSent> for SendMessageResponse {
    fn from(sent: MessageSent) -> Self {
        let mut replies = Vec::new();
        let mut failed = Vec::new();
        for outcome in sent.outcomes {
            match outcome {
                ReplyOutcome::Replied { npc_id, message_id } => {
                    replies.push(ReplyDto { npc_id, message_id })
                }
                ReplyOutcome::Failed { npc_id, reason } => failed.push(FailedReplyDto {
                    npc_id,
                    error: reason.to_string(),
                    reason,
                }),
            }
        }

        let message = match sent.message.delivery_mode {
            DeliveryMode::PlayerToAll => "Message shared with the conversation",
            DeliveryMode::PlayerToNpc if !failed.is_empty() => {
                "Message sent; some NPCs could not reply"
            }
            DeliveryMode::PlayerToNpc | DeliveryMode::NpcToPlayer => "Message sent",
        };

        Self {
            message,
            message_id: sent.message.id,
            delivery_mode: sent.message.delivery_mode,
            replies,
            failed,
            ignored_message_type: sent.ignored_hint,
        }
    }
}

async fn send_message(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ApiError> {
    let Json(request) = payload?;

    let input = SendMessageInput {
        conversation_id: ConversationId::from_uuid(id),
        caller: caller_id(&headers),
        sender_type: request.sender_type,
        sender_id: request.sender_id,
        content: request.content,
        recipients: request.recipients,
        message_type: request.message_type,
    };

    // Detached so a client hanging up mid-generation does not cancel replies.
    let send = app.use_cases.messaging.send.clone();
    let sent = tokio::spawn(async move { send.execute(input).await })
        .await
        .map_err(|e| ApiError::Internal(format!("send task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(sent.into())))
}

// =============================================================================
// Read
// =============================================================================

#[derive(Debug, Serialize)]
pub struct MessageDto {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_type: SenderKind,
    pub sender_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub content: String,
    pub recipients: Option<Vec<String>>,
    pub delivery_mode: DeliveryMode,
    pub created_at: DateTime<Utc>,
}

impl From<ConversationMessage> for MessageDto {
    fn from(listed: ConversationMessage) -> Self {
        let message = listed.message;
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_type: message.sender.kind(),
            sender_id: message.sender.id_string(),
            sender_name: listed.sender_name,
            recipients: message.recipients.encoded_ids(),
            content: message.content,
            delivery_mode: message.delivery_mode,
            created_at: message.created_at,
        }
    }
}

async fn list_messages(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let messages = app
        .use_cases
        .messaging
        .list
        .for_conversation(caller_id(&headers), ConversationId::from_uuid(id))
        .await?;
    Ok(Json(messages.into_iter().map(MessageDto::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct SenderQuery {
    pub sender_type: Option<String>,
}

async fn list_sender_messages(
    State(app): State<Arc<App>>,
    Path((id, sender_id)): Path<(Uuid, String)>,
    Query(query): Query<SenderQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let messages = app
        .use_cases
        .messaging
        .list
        .by_sender(
            caller_id(&headers),
            ConversationId::from_uuid(id),
            query.sender_type.as_deref(),
            &sender_id,
        )
        .await?;
    Ok(Json(messages.into_iter().map(MessageDto::from).collect()))
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized,
    Forbidden(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<SendMessageError> for ApiError {
    fn from(error: SendMessageError) -> Self {
        let message = error.to_string();
        match error {
            SendMessageError::Validation(_) | SendMessageError::MissingRecipients => {
                ApiError::BadRequest(message)
            }
            SendMessageError::Unauthenticated => ApiError::Unauthorized,
            SendMessageError::ConversationAccessDenied
            | SendMessageError::NpcNotParticipant
            | SendMessageError::NpcBroadcast
            | SendMessageError::RecipientsOutsideConversation => ApiError::Forbidden(message),
            SendMessageError::ConversationNotFound
            | SendMessageError::NpcNotFound
            | SendMessageError::RecipientsNotFound => ApiError::NotFound(message),
            SendMessageError::Repo(_) => ApiError::Internal(message),
        }
    }
}

impl From<ListMessagesError> for ApiError {
    fn from(error: ListMessagesError) -> Self {
        let message = error.to_string();
        match error {
            ListMessagesError::Validation(_) => ApiError::BadRequest(message),
            ListMessagesError::Unauthenticated => ApiError::Unauthorized,
            ListMessagesError::AccessDenied => ApiError::Forbidden(message),
            ListMessagesError::ConversationNotFound => ApiError::NotFound(message),
            ListMessagesError::Repo(_) => ApiError::Internal(message),
        }
    }
}
