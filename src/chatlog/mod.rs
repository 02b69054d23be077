//! Conversation log store.
//!
//! A separate, optional SQLite database holding the append-only message
//! history and voice-sample metadata. The connection is attempted once at
//! startup; when it fails the process runs in degraded mode for its
//! lifetime and every operation reports an explicit capability result
//! (`Appended::Skipped`, `History::Unavailable`) instead of an error.
//! Persistence failures never block a chat turn.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ChatLogConfig;
use crate::db::execute_sql;

/// Sentinel id returned to callers when a write was not persisted.
pub const UNPERSISTED_ID: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub persona_id: Option<String>,
    pub role: String,
    pub text: String,
    pub created_at: String,
}

/// Result of an append attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
    Stored(String),
    Skipped,
}

impl Appended {
    pub fn id_or_sentinel(&self) -> String {
        match self {
            Appended::Stored(id) => id.clone(),
            Appended::Skipped => UNPERSISTED_ID.to_string(),
        }
    }
}

/// Result of a history read.
#[derive(Debug)]
pub enum History {
    Messages(Vec<Message>),
    Unavailable,
}

#[derive(Clone)]
pub enum ChatLog {
    Connected(SqlitePool),
    Unavailable,
}

impl ChatLog {
    /// Open the log store. Any failure degrades to `Unavailable` with a
    /// warning; the decision holds for the process lifetime.
    pub async fn connect(config: &ChatLogConfig, data_dir: &Path) -> Self {
        let db_url = match &config.url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite:{}?mode=rwc",
                data_dir.join("chatlog.db").display()
            ),
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(2))
            .connect(&db_url)
            .await;

        let pool = match pool {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "Chat log store not available; history will not be persisted");
                return ChatLog::Unavailable;
            }
        };

        if let Err(e) = Self::migrate(&pool).await {
            warn!(error = %e, "Chat log schema setup failed; history will not be persisted");
            return ChatLog::Unavailable;
        }

        info!("Chat log store connected");
        ChatLog::Connected(pool)
    }

    async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
        execute_sql(pool, include_str!("../../migrations/002_chatlog.sql")).await?;
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ChatLog::Connected(_))
    }

    /// Append one message. Write failures degrade to `Skipped` with a
    /// warning; this must never fail the surrounding turn.
    pub async fn append(
        &self,
        user_id: &str,
        persona_id: Option<&str>,
        role: Role,
        text: &str,
    ) -> Appended {
        let pool = match self {
            ChatLog::Connected(pool) => pool,
            ChatLog::Unavailable => return Appended::Skipped,
        };

        let id = Uuid::new_v4().to_string();
        let result = sqlx::query(
            "INSERT INTO messages (id, user_id, persona_id, role, text, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(persona_id)
        .bind(role.as_str())
        .bind(text)
        .bind(now())
        .execute(pool)
        .await;

        match result {
            Ok(_) => Appended::Stored(id),
            Err(e) => {
                warn!(error = %e, "Failed to persist message, continuing without it");
                Appended::Skipped
            }
        }
    }

    /// Read one (user, persona) conversation in ascending creation order.
    pub async fn history(
        &self,
        user_id: &str,
        persona_id: Option<&str>,
        limit: i64,
        skip: i64,
    ) -> History {
        let pool = match self {
            ChatLog::Connected(pool) => pool,
            ChatLog::Unavailable => return History::Unavailable,
        };

        // rowid breaks ties between messages written in the same
        // microsecond, keeping a turn's user message ahead of its reply.
        let result = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE user_id = ? AND persona_id IS ? \
             ORDER BY created_at ASC, rowid ASC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(persona_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(pool)
        .await;

        match result {
            Ok(messages) => History::Messages(messages),
            Err(e) => {
                warn!(error = %e, "Failed to read chat history");
                History::Unavailable
            }
        }
    }

    /// Record voice-sample metadata; the audio itself lives on disk.
    pub async fn record_sample(&self, user_id: &str, filename: &str, path: &str) -> Appended {
        let pool = match self {
            ChatLog::Connected(pool) => pool,
            ChatLog::Unavailable => return Appended::Skipped,
        };

        let id = Uuid::new_v4().to_string();
        let result = sqlx::query(
            "INSERT INTO voice_samples (id, user_id, filename, path, uploaded_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(filename)
        .bind(path)
        .bind(now())
        .execute(pool)
        .await;

        match result {
            Ok(_) => Appended::Stored(id),
            Err(e) => {
                warn!(error = %e, "Failed to record voice sample metadata");
                Appended::Skipped
            }
        }
    }
}

/// Fixed-width timestamps so lexicographic TEXT ordering matches
/// chronological ordering.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    async fn connected_log() -> ChatLog {
        let pool = memory_pool().await;
        execute_sql(&pool, include_str!("../../migrations/002_chatlog.sql"))
            .await
            .unwrap();
        ChatLog::Connected(pool)
    }

    #[tokio::test]
    async fn test_append_and_history_in_order() {
        let log = connected_log().await;
        let first = log.append("u1", Some("p1"), Role::User, "hello").await;
        let second = log.append("u1", Some("p1"), Role::Assistant, "hi!").await;
        assert!(matches!(first, Appended::Stored(_)));
        assert!(matches!(second, Appended::Stored(_)));

        match log.history("u1", Some("p1"), 50, 0).await {
            History::Messages(messages) => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].role, "user");
                assert_eq!(messages[0].text, "hello");
                assert_eq!(messages[1].role, "assistant");
                assert!(messages[0].created_at <= messages[1].created_at);
            }
            History::Unavailable => panic!("store is connected"),
        }
    }

    #[tokio::test]
    async fn test_history_pagination() {
        let log = connected_log().await;
        log.append("u1", Some("p1"), Role::User, "one").await;
        log.append("u1", Some("p1"), Role::Assistant, "two").await;
        log.append("u1", Some("p1"), Role::User, "three").await;

        match log.history("u1", Some("p1"), 1, 0).await {
            History::Messages(messages) => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].text, "one");
            }
            History::Unavailable => panic!("store is connected"),
        }

        match log.history("u1", Some("p1"), 2, 1).await {
            History::Messages(messages) => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].text, "two");
                assert_eq!(messages[1].text, "three");
            }
            History::Unavailable => panic!("store is connected"),
        }
    }

    #[tokio::test]
    async fn test_history_keeps_insertion_order_on_equal_timestamps() {
        let log = connected_log().await;
        let pool = match &log {
            ChatLog::Connected(pool) => pool.clone(),
            ChatLog::Unavailable => unreachable!(),
        };
        // Both sides of a turn can land in the same microsecond
        let stamp = "2026-01-01T00:00:00.000000Z";
        for (id, role, text) in [("m1", "user", "hello"), ("m2", "assistant", "hi!")] {
            sqlx::query(
                "INSERT INTO messages (id, user_id, persona_id, role, text, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind("u1")
            .bind("p1")
            .bind(role)
            .bind(text)
            .bind(stamp)
            .execute(&pool)
            .await
            .unwrap();
        }

        match log.history("u1", Some("p1"), 50, 0).await {
            History::Messages(messages) => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].role, "user");
                assert_eq!(messages[1].role, "assistant");
            }
            History::Unavailable => panic!("store is connected"),
        }
    }

    #[tokio::test]
    async fn test_history_scoped_by_user_and_persona() {
        let log = connected_log().await;
        log.append("u1", Some("p1"), Role::User, "mine").await;
        log.append("u2", Some("p1"), Role::User, "theirs").await;
        log.append("u1", None, Role::User, "no persona").await;

        match log.history("u1", Some("p1"), 50, 0).await {
            History::Messages(messages) => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].text, "mine");
            }
            History::Unavailable => panic!("store is connected"),
        }

        match log.history("u1", None, 50, 0).await {
            History::Messages(messages) => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].text, "no persona");
            }
            History::Unavailable => panic!("store is connected"),
        }
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades() {
        let log = ChatLog::Unavailable;
        assert!(!log.is_available());
        assert_eq!(
            log.append("u1", None, Role::User, "hello").await,
            Appended::Skipped
        );
        assert!(matches!(
            log.history("u1", None, 50, 0).await,
            History::Unavailable
        ));
        assert_eq!(
            log.record_sample("u1", "a.wav", "/tmp/a.wav").await,
            Appended::Skipped
        );
    }

    #[tokio::test]
    async fn test_record_sample_stores_row() {
        let log = connected_log().await;
        let appended = log.record_sample("u1", "a.wav", "/data/uploads/u1/a.wav").await;
        assert!(matches!(appended, Appended::Stored(_)));
    }

    #[test]
    fn test_id_or_sentinel() {
        assert_eq!(Appended::Stored("x".to_string()).id_or_sentinel(), "x");
        assert_eq!(Appended::Skipped.id_or_sentinel(), UNPERSISTED_ID);
    }
}
