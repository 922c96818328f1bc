//! SQLite backend for the relay registries.

use crate::config::DatabaseConfig;
use crate::error::StorageError;
use crate::store::{ServerKeyRecord, ServerKeyStore, TokenCheckRecord, TokenCheckStore};
use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

/// SQLite-backed store for server keys and token checks.
///
/// Uses WAL mode for concurrent reads/writes. Uniqueness of `client_id` and
/// `token_digest` is enforced by the schema.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database described by `config` and run migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        tracing::info!(path = %config.path.display(), "database ready");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection would get its own empty database, so pin exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    // Runs in one transaction so no pooled connection can observe the tables
    // without their uniqueness constraints.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS webpush_server_keys (
                client_id TEXT PRIMARY KEY,
                public_key BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS webpush_token_checks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token_digest TEXT NOT NULL UNIQUE,
                install_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Round-trips a trivial query; used for readiness.
    pub async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn token_check_count(&self, token_digest: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM webpush_token_checks WHERE token_digest = ?1")
            .bind(token_digest)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

#[derive(sqlx::FromRow)]
struct ServerKeyRow {
    client_id: String,
    public_key: Vec<u8>,
    updated_at: i64,
}

impl From<ServerKeyRow> for ServerKeyRecord {
    fn from(row: ServerKeyRow) -> Self {
        ServerKeyRecord {
            client_id: row.client_id,
            public_key: row.public_key,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TokenCheckRow {
    token_digest: String,
    install_id: String,
    created_at: i64,
    updated_at: i64,
}

impl From<TokenCheckRow> for TokenCheckRecord {
    fn from(row: TokenCheckRow) -> Self {
        TokenCheckRecord {
            token_digest: row.token_digest,
            install_id: row.install_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ServerKeyStore for SqliteStore {
    async fn upsert_server_key(
        &self,
        client_id: &str,
        public_key: &[u8],
        now: i64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO webpush_server_keys (client_id, public_key, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT(client_id) DO UPDATE SET
                public_key = excluded.public_key,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(client_id)
        .bind(public_key)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_server_key(
        &self,
        client_id: &str,
    ) -> Result<Option<ServerKeyRecord>, StorageError> {
        let row = sqlx::query_as::<_, ServerKeyRow>(
            "SELECT client_id, public_key, updated_at FROM webpush_server_keys WHERE client_id = ?1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl TokenCheckStore for SqliteStore {
    async fn insert_token_check(
        &self,
        token_digest: &str,
        install_id: &str,
        now: i64,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webpush_token_checks (token_digest, install_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT(token_digest) DO NOTHING
            "#,
        )
        .bind(token_digest)
        .bind(install_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_token_check(
        &self,
        token_digest: &str,
    ) -> Result<Option<TokenCheckRecord>, StorageError> {
        let row = sqlx::query_as::<_, TokenCheckRow>(
            r#"
            SELECT token_digest, install_id, created_at, updated_at
            FROM webpush_token_checks
            WHERE token_digest = ?1
            "#,
        )
        .bind(token_digest)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn touch_token_check(
        &self,
        token_digest: &str,
        install_id: &str,
        now: i64,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "UPDATE webpush_token_checks SET updated_at = ?3 WHERE token_digest = ?1 AND install_id = ?2",
        )
        .bind(token_digest)
        .bind(install_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
