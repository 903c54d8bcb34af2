//! SQLite conversation and participant storage.

use async_trait::async_trait;
use npcchat_domain::{Conversation, ConversationId, NpcId};
use sqlx::{Row, SqlitePool};

use super::{decode_id, decode_time, encode_time};
use crate::infrastructure::ports::{ConversationRepo, RepoError};

#[derive(Clone)]
pub struct SqliteConversationRepo {
    pool: SqlitePool,
}

impl SqliteConversationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepo for SqliteConversationRepo {
    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, RepoError> {
        let row = sqlx::query(
            "SELECT id, title, owner_id, image_url, created_at FROM conversations WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::database("get_conversation", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.get("id");
        let owner_id: String = row.get("owner_id");
        let created_at: String = row.get("created_at");
        Ok(Some(Conversation {
            id: decode_id(&id)?,
            title: row.get("title"),
            owner_id: decode_id(&owner_id)?,
            image_url: row.get("image_url"),
            created_at: decode_time(&created_at)?,
        }))
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO conversations (id, title, owner_id, image_url, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET title = excluded.title, image_url = excluded.image_url
            "#,
        )
        .bind(conversation.id.to_string())
        .bind(&conversation.title)
        .bind(conversation.owner_id.to_string())
        .bind(&conversation.image_url)
        .bind(encode_time(conversation.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("save_conversation", e))?;
        Ok(())
    }

    async fn delete(&self, id: ConversationId) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("delete_conversation", e))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::not_found("Conversation", id));
        }
        Ok(())
    }

    async fn add_participant(
        &self,
        conversation_id: ConversationId,
        npc_id: NpcId,
    ) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT OR IGNORE INTO conversation_participants (conversation_id, npc_id) VALUES (?, ?)",
        )
        .bind(conversation_id.to_string())
        .bind(npc_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("add_participant", e))?;
        Ok(())
    }

    async fn list_participants(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<NpcId>, RepoError> {
        let rows = sqlx::query(
            "SELECT npc_id FROM conversation_participants WHERE conversation_id = ? ORDER BY npc_id",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_participants", e))?;

        rows.iter()
            .map(|row| decode_id(row.get::<&str, _>("npc_id")))
            .collect()
    }

    async fn is_participant(
        &self,
        conversation_id: ConversationId,
        npc_id: NpcId,
    ) -> Result<bool, RepoError> {
        let row = sqlx::query(
            "SELECT 1 FROM conversation_participants WHERE conversation_id = ? AND npc_id = ?",
        )
        .bind(conversation_id.to_string())
        .bind(npc_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::database("is_participant", e))?;
        Ok(row.is_some())
    }
}
