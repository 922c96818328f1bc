//! Deduplication of device registrations.
//!
//! A token digest is bound to the installation that first presents it. Later
//! checks from the same installation refresh the record; checks from a
//! different installation are reported and leave the record untouched.

use crate::error::StorageError;
use crate::store::{TokenCheckStore, now_millis};
use std::sync::Arc;

/// Result of [`TokenRegistry::check_or_register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCheck {
    /// No record existed; this call created it.
    Registered,
    /// A record for the same installation existed; its `updated_at` was refreshed.
    Refreshed,
    /// The digest belongs to a different installation. Nothing was written.
    IdentityMismatch { registered_install_id: String },
}

impl TokenCheck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TokenCheck::Registered | TokenCheck::Refreshed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenCheck::Registered => "registered",
            TokenCheck::Refreshed => "refreshed",
            TokenCheck::IdentityMismatch { .. } => "identity_mismatch",
        }
    }
}

#[derive(Clone)]
pub struct TokenRegistry {
    store: Arc<dyn TokenCheckStore>,
}

impl TokenRegistry {
    pub fn new(store: Arc<dyn TokenCheckStore>) -> Self {
        Self { store }
    }

    /// Registers `token_digest` for `install_id`, or confirms an existing registration.
    ///
    /// The insert is attempted first so that the store's uniqueness constraint
    /// arbitrates concurrent first registrations. Callers that lose fall through
    /// to the compare-and-refresh path.
    pub async fn check_or_register(
        &self,
        token_digest: &str,
        install_id: &str,
    ) -> Result<TokenCheck, StorageError> {
        let now = now_millis();

        if self
            .store
            .insert_token_check(token_digest, install_id, now)
            .await?
        {
            tracing::debug!(token_digest, install_id, "token registered");
            return Ok(TokenCheck::Registered);
        }

        let existing = self
            .store
            .find_token_check(token_digest)
            .await?
            .ok_or_else(|| {
                StorageError::Inconsistent(format!(
                    "token check for {token_digest} rejected as duplicate but not found"
                ))
            })?;

        if existing.install_id != install_id {
            tracing::warn!(
                token_digest,
                install_id,
                registered_install_id = %existing.install_id,
                "token digest presented by a different installation"
            );
            return Ok(TokenCheck::IdentityMismatch {
                registered_install_id: existing.install_id,
            });
        }

        let touched = self
            .store
            .touch_token_check(token_digest, install_id, now)
            .await?;
        if touched != 1 {
            tracing::warn!(token_digest, touched, "unexpected row count refreshing token check");
        }

        Ok(TokenCheck::Refreshed)
    }
}
