use registry::DatabaseConfig;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("No upstream server key configured")]
    MissingServerKey,

    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Upstream timeout cannot be 0")]
    InvalidTimeout,

    #[error("Body limit '{0}' cannot be 0")]
    InvalidBodyLimit(&'static str),

    #[error("Database pool needs at least one connection")]
    InvalidPoolSize,
}

/// What to do with a callback that cannot be verified because it names no
/// client, or names a client without a registered server key.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Deliver such callbacks unauthenticated.
    Optional,
    /// Reject such callbacks.
    Required,
}

/// Relay configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for health and readiness endpoints
    pub admin_listener: Listener,
    /// Has no default: operators must pick the behaviour for unauthenticated callbacks
    pub auth_mode: AuthMode,
    /// Push delivery service
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub limits: Limits,
    pub database: DatabaseConfig,
}

impl Config {
    /// Validates the relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.upstream.validate()?;
        self.limits.validate()?;

        if self.database.max_connections == 0 {
            return Err(ValidationError::InvalidPoolSize);
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

fn default_upstream_url() -> String {
    "https://fcm.googleapis.com/fcm/send".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Push delivery service configuration
#[derive(Clone, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Send endpoint of the push service
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// Static credential sent as `Authorization: key=<server_key>`.
    /// May be left out and supplied from the environment at startup.
    #[serde(default)]
    pub server_key: Option<String>,
    /// Bound on the whole upstream call, connect through body
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.url()?;
        self.server_key()?;
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }

    pub fn url(&self) -> Result<Url, ValidationError> {
        Ok(Url::parse(&self.url)?)
    }

    pub fn server_key(&self) -> Result<&str, ValidationError> {
        match self.server_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ValidationError::MissingServerKey),
        }
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url)
            .field("server_key", &self.server_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Request body size limits, in bytes
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Limits {
    #[serde(default = "Limits::default_callback_body_bytes")]
    pub callback_body_bytes: usize,
    #[serde(default = "Limits::default_form_body_bytes")]
    pub form_body_bytes: usize,
}

impl Limits {
    fn default_callback_body_bytes() -> usize {
        40 * 1024
    }

    fn default_form_body_bytes() -> usize {
        1024 * 1024
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.callback_body_bytes == 0 {
            return Err(ValidationError::InvalidBodyLimit("callback_body_bytes"));
        }
        if self.form_body_bytes == 0 {
            return Err(ValidationError::InvalidBodyLimit("form_body_bytes"));
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            callback_body_bytes: Self::default_callback_body_bytes(),
            form_body_bytes: Self::default_form_body_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            listener: Listener {
                host: "0.0.0.0".to_string(),
                port: 4005,
            },
            admin_listener: Listener {
                host: "127.0.0.1".to_string(),
                port: 4006,
            },
            auth_mode: AuthMode::Optional,
            upstream: UpstreamConfig {
                url: default_upstream_url(),
                server_key: Some("fcm-secret".to_string()),
                timeout_secs: 10,
            },
            limits: Limits::default(),
            database: DatabaseConfig::new("/tmp/pushgate.db"),
        }
    }

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 4005
admin_listener:
    host: "127.0.0.1"
    port: 4006
auth_mode: required
upstream:
    url: "http://127.0.0.1:9000/fcm/send"
    server_key: "fcm-secret"
    timeout_secs: 3
limits:
    callback_body_bytes: 1024
database:
    path: /var/lib/pushgate/relay.db
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.listener.port, 4005);
        assert_eq!(config.auth_mode, AuthMode::Required);
        assert_eq!(
            config.upstream.url().unwrap().as_str(),
            "http://127.0.0.1:9000/fcm/send"
        );
        assert_eq!(config.upstream.server_key().unwrap(), "fcm-secret");
        assert_eq!(config.upstream.timeout_secs, 3);
        assert_eq!(config.limits.callback_body_bytes, 1024);
        assert_eq!(config.limits.form_body_bytes, 1024 * 1024);
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
listener: {host: "0.0.0.0", port: 4005}
admin_listener: {host: "127.0.0.1", port: 4006}
auth_mode: optional
upstream: {}
database: {path: relay.db}
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.upstream.url, default_upstream_url());
        assert_eq!(config.upstream.timeout_secs, 10);
        assert_eq!(config.upstream.server_key, None);
        assert_eq!(config.limits, Limits::default());
        assert_eq!(config.limits.callback_body_bytes, 40960);

        // Without a server key the config is not usable yet.
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::MissingServerKey
        ));
    }

    #[test]
    fn test_auth_mode_is_required() {
        let yaml = r#"
listener: {host: "0.0.0.0", port: 4005}
admin_listener: {host: "127.0.0.1", port: 4006}
upstream: {server_key: abc}
database: {path: relay.db}
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
        assert!(serde_yaml::from_str::<AuthMode>("maybe").is_err());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = base_config();
        config.listener.port = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidPort
        ));

        let mut config = base_config();
        config.upstream.server_key = Some("  ".to_string());
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::MissingServerKey
        ));

        let mut config = base_config();
        config.upstream.url = "not-a-url".to_string();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidUrl(_)
        ));

        let mut config = base_config();
        config.upstream.timeout_secs = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidTimeout
        ));

        let mut config = base_config();
        config.limits.callback_body_bytes = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidBodyLimit("callback_body_bytes")
        ));

        let mut config = base_config();
        config.database.max_connections = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidPoolSize
        ));
    }

    #[test]
    fn test_debug_redacts_server_key() {
        let rendered = format!("{:?}", base_config().upstream);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("fcm-secret"));
    }

    #[test]
    fn test_deserialization_errors() {
        // Invalid timeout type
        assert!(serde_yaml::from_str::<UpstreamConfig>(r#"{timeout_secs: "soon"}"#).is_err());

        // Invalid port type
        assert!(serde_yaml::from_str::<Listener>(r#"{host: "0.0.0.0", port: "x"}"#).is_err());

        // Missing required field
        assert!(serde_yaml::from_str::<Listener>(r#"{host: "0.0.0.0"}"#).is_err());
    }
}
