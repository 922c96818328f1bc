//! Persistent registries backing the push relay.
//!
//! - [`ServerKeyRegistry`]: one VAPID public key per client application.
//! - [`TokenRegistry`]: first-write-wins binding of a push token digest to
//!   the installation that registered it.
//!
//! Both sit on top of small store traits ([`ServerKeyStore`],
//! [`TokenCheckStore`]); [`SqliteStore`] implements both.

pub mod config;
mod error;
mod server_keys;
mod sqlite;
mod store;
mod token_check;

pub use config::DatabaseConfig;
pub use error::StorageError;
pub use server_keys::ServerKeyRegistry;
pub use sqlite::SqliteStore;
pub use store::{ServerKeyRecord, ServerKeyStore, TokenCheckRecord, TokenCheckStore, now_millis};
pub use token_check::{TokenCheck, TokenRegistry};
