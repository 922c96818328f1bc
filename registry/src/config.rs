use serde::Deserialize;
use std::path::PathBuf;

fn default_max_connections() -> u32 {
    10
}

fn default_busy_timeout_secs() -> u64 {
    5
}

/// SQLite database configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path of the database file, created if missing
    pub path: PathBuf,
    /// Upper bound of the connection pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}
