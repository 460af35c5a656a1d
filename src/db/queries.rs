use crate::db::models::*;
use crate::error::AppResult;
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

pub type DbPool = Pool<Sqlite>;

/// Database operations for the token -> payload mapping.
///
/// Rows are only ever inserted or deleted, never updated, so concurrent
/// writers for the same token cannot race on a read-modify-write.
pub struct ShareLinkRepo;

impl ShareLinkRepo {
    /// Mint a fresh token for a single payload.
    pub async fn mint(pool: &DbPool, payload: &PayloadRef) -> AppResult<Token> {
        let token = Token::generate();
        Self::insert(pool, &token, payload).await?;
        debug!(token = %token, message_id = payload.message_id, "Minted token");
        Ok(token)
    }

    /// Add another payload under an existing token (batch members).
    pub async fn append_to_group(pool: &DbPool, token: &Token, payload: &PayloadRef) -> AppResult<()> {
        Self::insert(pool, token, payload).await?;
        debug!(token = %token, message_id = payload.message_id, "Appended payload to token");
        Ok(())
    }

    async fn insert(pool: &DbPool, token: &Token, payload: &PayloadRef) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO share_links (token, payload_message_id, payload_kind, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(token.as_str())
        .bind(payload.message_id)
        .bind(payload.kind.as_str())
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// All payloads for a token in insertion order. Empty means the token is
    /// unknown, revoked or cleared.
    pub async fn resolve(pool: &DbPool, token: &str) -> AppResult<Vec<PayloadRef>> {
        let rows = sqlx::query_as::<_, ShareLink>(
            "SELECT * FROM share_links WHERE token = ? ORDER BY id ASC",
        )
        .bind(token)
        .fetch_all(pool)
        .await?;

        Ok(rows.iter().map(ShareLink::payload_ref).collect())
    }

    /// Delete every row for a token, returning how many payloads were mapped.
    pub async fn revoke(pool: &DbPool, token: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM share_links WHERE token = ?")
            .bind(token)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete all rows unconditionally.
    pub async fn clear(pool: &DbPool) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM share_links").execute(pool).await?;
        info!("Cleared {} share link rows", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Number of distinct live tokens
    pub async fn count_tokens(pool: &DbPool) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT token) FROM share_links")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
pub async fn setup_test_db() -> DbPool {
    use sqlx::sqlite::SqlitePoolOptions;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_db(&pool).await.expect("Failed to init database");
    pool
}

/// Create the schema if it does not exist yet
pub async fn init_db(pool: &DbPool) -> AppResult<()> {
    info!("Running database migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS share_links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            token TEXT NOT NULL,
            payload_message_id INTEGER NOT NULL,
            payload_kind TEXT NOT NULL DEFAULT 'generic',
            created_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_share_links_token ON share_links(token)")
        .execute(pool)
        .await?;

    info!("Database migrations complete");
    Ok(())
}
