use crate::error::StorageError;
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};

/// The VAPID public key registered for a client application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyRecord {
    pub client_id: String,
    /// Raw key bytes exactly as registered; not validated on write.
    pub public_key: Vec<u8>,
    /// Unix timestamp (milliseconds) of the last upsert.
    pub updated_at: i64,
}

/// Binding of a push token digest to the installation that first registered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCheckRecord {
    pub token_digest: String,
    pub install_id: String,
    /// Unix timestamp (milliseconds) of the first registration.
    pub created_at: i64,
    /// Unix timestamp (milliseconds) of the last matching check.
    pub updated_at: i64,
}

/// Storage for [`ServerKeyRecord`]s, unique by `client_id`.
#[async_trait]
pub trait ServerKeyStore: Send + Sync {
    /// Insert or replace the key for `client_id` in a single atomic write.
    async fn upsert_server_key(
        &self,
        client_id: &str,
        public_key: &[u8],
        now: i64,
    ) -> Result<(), StorageError>;

    async fn find_server_key(&self, client_id: &str)
    -> Result<Option<ServerKeyRecord>, StorageError>;
}

/// Storage for [`TokenCheckRecord`]s, unique by `token_digest`.
#[async_trait]
pub trait TokenCheckStore: Send + Sync {
    /// Insert a record unless one already exists for `token_digest`.
    ///
    /// Returns `true` if this call created the record. The uniqueness
    /// constraint of the store decides between concurrent callers: exactly
    /// one of them gets `true`.
    async fn insert_token_check(
        &self,
        token_digest: &str,
        install_id: &str,
        now: i64,
    ) -> Result<bool, StorageError>;

    async fn find_token_check(
        &self,
        token_digest: &str,
    ) -> Result<Option<TokenCheckRecord>, StorageError>;

    /// Set `updated_at` on the record matching both `token_digest` and
    /// `install_id`. Returns the number of rows touched.
    async fn touch_token_check(
        &self,
        token_digest: &str,
        install_id: &str,
        now: i64,
    ) -> Result<u64, StorageError>;
}

/// Current time as unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
