use crate::error::StorageError;
use crate::store::{ServerKeyRecord, ServerKeyStore, now_millis};
use std::sync::Arc;

/// Maps each client application to the single VAPID public key it signs with.
#[derive(Clone)]
pub struct ServerKeyRegistry {
    store: Arc<dyn ServerKeyStore>,
}

impl ServerKeyRegistry {
    pub fn new(store: Arc<dyn ServerKeyStore>) -> Self {
        Self { store }
    }

    /// Replaces any key previously registered for `client_id`.
    ///
    /// The key is stored as given; it is only checked when a request is verified against it.
    pub async fn upsert(&self, client_id: &str, public_key: &[u8]) -> Result<(), StorageError> {
        self.store
            .upsert_server_key(client_id, public_key, now_millis())
            .await?;
        tracing::info!(client_id, key_len = public_key.len(), "server key registered");
        Ok(())
    }

    pub async fn lookup(&self, client_id: &str) -> Result<Option<ServerKeyRecord>, StorageError> {
        self.store.find_server_key(client_id).await
    }
}
