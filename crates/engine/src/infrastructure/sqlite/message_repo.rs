//! SQLite message log.
//!
//! Each message row is paired with `message_visibility` rows: one broadcast
//! row, or one row per addressed NPC. Replies to the player get none; their
//! author sees them through the sender columns.

use async_trait::async_trait;
use npcchat_domain::{ConversationId, Message, MessageRecipients, NpcId, Sender, SenderKind};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{decode_id, decode_time, encode_time};
use crate::infrastructure::ports::{MessageRepo, RepoError};

const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.sender_kind, m.sender_id, m.content, \
     m.recipient_kind, m.recipients, m.delivery_mode, m.created_at";

#[derive(Clone)]
pub struct SqliteMessageRepo {
    pool: SqlitePool,
}

impl SqliteMessageRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepo for SqliteMessageRepo {
    async fn append(&self, message: &Message) -> Result<(), RepoError> {
        let recipients = message
            .recipients
            .encoded_ids()
            .map(|ids| serde_json::to_string(&ids))
            .transpose()
            .map_err(RepoError::serialization)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("append_message", e))?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, sender_kind, sender_id, content,
                                  recipient_kind, recipients, delivery_mode, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id.to_string())
        .bind(message.conversation_id.to_string())
        .bind(message.sender.kind().as_str())
        .bind(message.sender.id_string())
        .bind(&message.content)
        .bind(message.recipients.kind_str())
        .bind(recipients)
        .bind(message.delivery_mode.as_str())
        .bind(encode_time(message.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| RepoError::database("append_message", e))?;

        match &message.recipients {
            MessageRecipients::Broadcast => {
                sqlx::query(
                    "INSERT INTO message_visibility (message_id, npc_id, is_broadcast) VALUES (?, NULL, 1)",
                )
                .bind(message.id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| RepoError::database("append_message", e))?;
            }
            MessageRecipients::Npcs(ids) => {
                for npc_id in ids {
                    sqlx::query(
                        "INSERT INTO message_visibility (message_id, npc_id, is_broadcast) VALUES (?, ?, 0)",
                    )
                    .bind(message.id.to_string())
                    .bind(npc_id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| RepoError::database("append_message", e))?;
                }
            }
            MessageRecipients::Player(_) | MessageRecipients::Implicit => {}
        }

        tx.commit()
            .await
            .map_err(|e| RepoError::database("append_message", e))?;
        Ok(())
    }

    async fn list_visible_to_npc(
        &self,
        conversation_id: ConversationId,
        npc_id: NpcId,
        limit: usize,
    ) -> Result<Vec<Message>, RepoError> {
        let query = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages m
            WHERE m.conversation_id = ?
              AND (
                (m.sender_kind = 'npc' AND m.sender_id = ?)
                OR EXISTS (
                    SELECT 1 FROM message_visibility v
                    WHERE v.message_id = m.id AND (v.is_broadcast = 1 OR v.npc_id = ?)
                )
              )
            ORDER BY m.created_at DESC, m.seq DESC
            LIMIT ?
            "#
        );

        let npc = npc_id.to_string();
        let rows = sqlx::query(&query)
            .bind(conversation_id.to_string())
            .bind(&npc)
            .bind(&npc)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("list_visible_to_npc", e))?;

        rows.iter().map(message_from_row).collect()
    }

    async fn list_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, RepoError> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.conversation_id = ? \
             ORDER BY m.created_at ASC, m.seq ASC"
        );

        let rows = sqlx::query(&query)
            .bind(conversation_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("list_for_conversation", e))?;

        rows.iter().map(message_from_row).collect()
    }

    async fn list_by_sender(
        &self,
        conversation_id: ConversationId,
        sender: Sender,
    ) -> Result<Vec<Message>, RepoError> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m \
             WHERE m.conversation_id = ? AND m.sender_kind = ? AND m.sender_id = ? \
             ORDER BY m.created_at ASC, m.seq ASC"
        );

        let rows = sqlx::query(&query)
            .bind(conversation_id.to_string())
            .bind(sender.kind().as_str())
            .bind(sender.id_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("list_by_sender", e))?;

        rows.iter().map(message_from_row).collect()
    }
}

fn message_from_row(row: &SqliteRow) -> Result<Message, RepoError> {
    let sender_kind: SenderKind = row
        .get::<&str, _>("sender_kind")
        .parse()
        .map_err(RepoError::serialization)?;
    let sender_id: &str = row.get("sender_id");
    let sender = match sender_kind {
        SenderKind::User => Sender::User(decode_id(sender_id)?),
        SenderKind::Npc => Sender::Npc(decode_id(sender_id)?),
    };

    let recipient_ids = row
        .get::<Option<String>, _>("recipients")
        .map(|json| serde_json::from_str::<Vec<String>>(&json))
        .transpose()
        .map_err(RepoError::serialization)?;
    let recipients = MessageRecipients::decode(
        row.get::<Option<&str>, _>("recipient_kind"),
        recipient_ids,
    )
    .map_err(RepoError::serialization)?;

    Ok(Message {
        id: decode_id(row.get::<&str, _>("id"))?,
        conversation_id: decode_id(row.get::<&str, _>("conversation_id"))?,
        sender,
        content: row.get("content"),
        recipients,
        delivery_mode: row
            .get::<&str, _>("delivery_mode")
            .parse()
            .map_err(RepoError::serialization)?,
        created_at: decode_time(row.get::<&str, _>("created_at"))?,
    })
}
