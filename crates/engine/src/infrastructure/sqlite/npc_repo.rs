//! SQLite NPC profile storage.

use async_trait::async_trait;
use npcchat_domain::{NpcId, NpcProfile};
use sqlx::{Row, SqlitePool};

use super::decode_id;
use crate::infrastructure::ports::{NpcRepo, RepoError};

#[derive(Clone)]
pub struct SqliteNpcRepo {
    pool: SqlitePool,
}

impl SqliteNpcRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NpcRepo for SqliteNpcRepo {
    async fn get(&self, id: NpcId) -> Result<Option<NpcProfile>, RepoError> {
        let row = sqlx::query("SELECT id, name, backstory, owner_id FROM npcs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_npc", e))?;

        row.map(|row| {
            Ok(NpcProfile {
                id: decode_id(row.get::<&str, _>("id"))?,
                name: row.get("name"),
                backstory: row.get("backstory"),
                owner_id: decode_id(row.get::<&str, _>("owner_id"))?,
            })
        })
        .transpose()
    }

    async fn save(&self, npc: &NpcProfile) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO npcs (id, name, backstory, owner_id) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, backstory = excluded.backstory
            "#,
        )
        .bind(npc.id.to_string())
        .bind(&npc.name)
        .bind(&npc.backstory)
        .bind(npc.owner_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("save_npc", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use npcchat_domain::UserId;

    use super::*;
    use crate::infrastructure::sqlite::test_support::temp_pool;

    #[tokio::test]
    async fn saved_profile_can_be_read_and_updated() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteNpcRepo::new(pool);
        let mut npc = NpcProfile::new("Borin", "A smith.", UserId::new());

        repo.save(&npc).await.expect("save");
        npc.backstory = "A retired smith.".to_string();
        repo.save(&npc).await.expect("update");

        assert_eq!(repo.get(npc.id).await.expect("get"), Some(npc));
        assert_eq!(repo.get(NpcId::new()).await.expect("get"), None);
    }
}
