mod models;

pub use models::*;

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
pub(crate) async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

/// Open the primary database holding users and personas.
pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("eidolon.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    // Enable WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: users and personas
    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// An in-memory pool sharing a single connection so every query sees the
    /// same database.
    pub async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    pub async fn memory_db() -> DbPool {
        let pool = memory_pool().await;
        execute_sql(&pool, include_str!("../../migrations/001_initial.sql"))
            .await
            .unwrap();
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init(dir.path()).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert!(names.contains(&"users"));
        assert!(names.contains(&"personas"));
    }

    #[tokio::test]
    async fn test_migration_files_survive_statement_splitting() {
        // The splitter cuts on `;` before stripping comment lines, so a
        // semicolon inside a SQL comment would leak prose into a statement.
        // Every shipped migration must pass through it cleanly.
        let pool = test_support::memory_pool().await;
        execute_sql(&pool, include_str!("../../migrations/001_initial.sql"))
            .await
            .unwrap();
        execute_sql(&pool, include_str!("../../migrations/002_chatlog.sql"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_username_unique_constraint() {
        let pool = test_support::memory_db().await;
        let insert = "INSERT INTO users (id, username, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)";
        sqlx::query(insert)
            .bind("u1")
            .bind("alice")
            .bind("alice@x.com")
            .bind("hash")
            .bind("2026-01-01T00:00:00+00:00")
            .execute(&pool)
            .await
            .unwrap();
        let dup = sqlx::query(insert)
            .bind("u2")
            .bind("alice")
            .bind("other@x.com")
            .bind("hash")
            .bind("2026-01-01T00:00:00+00:00")
            .execute(&pool)
            .await;
        assert!(dup.is_err());
    }
}
