//! SQLite persistence for conversations, NPC profiles and the message log.

mod conversation_repo;
mod message_repo;
mod npc_repo;

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

pub use conversation_repo::SqliteConversationRepo;
pub use message_repo::SqliteMessageRepo;
pub use npc_repo::SqliteNpcRepo;

use crate::infrastructure::ports::RepoError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        image_url TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS npcs (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        backstory TEXT NOT NULL,
        owner_id TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversation_participants (
        conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        npc_id TEXT NOT NULL REFERENCES npcs(id) ON DELETE CASCADE,
        PRIMARY KEY (conversation_id, npc_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        sender_kind TEXT NOT NULL CHECK (sender_kind IN ('user', 'npc')),
        sender_id TEXT NOT NULL,
        content TEXT NOT NULL,
        recipient_kind TEXT,
        recipients TEXT,
        delivery_mode TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_messages_timeline ON messages (conversation_id, created_at, seq)",
    "CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages (conversation_id, sender_kind, sender_id)",
    r#"
    CREATE TABLE IF NOT EXISTS message_visibility (
        message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
        npc_id TEXT,
        is_broadcast INTEGER NOT NULL DEFAULT 0,
        CHECK ((is_broadcast = 1 AND npc_id IS NULL) OR (is_broadcast = 0 AND npc_id IS NOT NULL))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_visibility_npc ON message_visibility (npc_id, message_id)",
    "CREATE INDEX IF NOT EXISTS idx_visibility_broadcast ON message_visibility (is_broadcast, message_id)",
];

/// Open (creating if needed) the database file and ensure the schema.
pub async fn connect(db_path: &str) -> Result<SqlitePool, RepoError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| RepoError::database("connect", e))?;

    ensure_schema(&pool).await?;
    Ok(pool)
}

pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), RepoError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| RepoError::database("ensure_schema", e))?;
    }
    Ok(())
}

/// All SQLite repositories sharing one pool.
#[derive(Clone)]
pub struct SqliteRepositories {
    pub conversation: SqliteConversationRepo,
    pub npc: SqliteNpcRepo,
    pub message: SqliteMessageRepo,
}

impl SqliteRepositories {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            conversation: SqliteConversationRepo::new(pool.clone()),
            npc: SqliteNpcRepo::new(pool.clone()),
            message: SqliteMessageRepo::new(pool),
        }
    }
}

/// Microsecond RFC 3339 in UTC sorts lexicographically in time order.
fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| RepoError::serialization(format!("bad timestamp '{raw}': {e}")))
}

fn decode_id<T>(raw: &str) -> Result<T, RepoError>
where
    T: std::str::FromStr<Err = npcchat_domain::DomainError>,
{
    raw.parse().map_err(RepoError::serialization)
}
