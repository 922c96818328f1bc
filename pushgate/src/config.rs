use relay::config::Config as RelayConfig;
use serde::Deserialize;
use std::fs::File;

fn default_metrics_prefix() -> String {
    "pushgate".to_string()
}

#[derive(Deserialize, Debug)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    /// `tracing_subscriber::EnvFilter` directives. `RUST_LOG` takes precedence.
    pub filter: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub relay: RelayConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Fills in the upstream server key from the environment when the file has none.
    pub fn apply_server_key_fallback(&mut self, from_env: Option<String>) {
        let upstream = &mut self.relay.upstream;
        if upstream.server_key.is_none() {
            upstream.server_key = from_env;
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay::config::AuthMode;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    const RELAY_YAML: &str = r#"
            relay:
                listener:
                    host: 0.0.0.0
                    port: 4005
                admin_listener:
                    host: 127.0.0.1
                    port: 4006
                auth_mode: optional
                upstream:
                    timeout_secs: 5
                database:
                    path: /var/lib/pushgate/relay.db
            "#;

    #[test]
    fn relay_config() {
        let yaml = format!(
            r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://key@sentry.example.com/1
            {RELAY_YAML}"#
        );
        let tmp = write_tmp_file(&yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(metrics.prefix, "pushgate");
        let logging = config.common.logging.expect("logging config");
        assert!(logging.sentry_dsn.is_some());
        assert_eq!(logging.filter, None);

        assert_eq!(config.relay.listener.port, 4005);
        assert_eq!(config.relay.auth_mode, AuthMode::Optional);
        assert_eq!(config.relay.upstream.timeout_secs, 5);
    }

    #[test]
    fn server_key_fallback() {
        let tmp = write_tmp_file(RELAY_YAML);
        let mut config = Config::from_file(tmp.path()).expect("load config");
        assert!(config.relay.validate().is_err());

        config.apply_server_key_fallback(Some("from-env".to_string()));
        assert_eq!(config.relay.upstream.server_key().unwrap(), "from-env");
        assert!(config.relay.validate().is_ok());
    }

    #[test]
    fn file_server_key_wins() {
        let yaml = RELAY_YAML.replace(
            "timeout_secs: 5",
            "timeout_secs: 5\n                    server_key: from-file",
        );
        let tmp = write_tmp_file(&yaml);
        let mut config = Config::from_file(tmp.path()).expect("load config");

        config.apply_server_key_fallback(Some("from-env".to_string()));
        assert_eq!(config.relay.upstream.server_key().unwrap(), "from-file");
    }

    #[test]
    fn missing_file_and_bad_yaml() {
        assert!(matches!(
            Config::from_file(std::path::Path::new("/nonexistent/pushgate.yaml")),
            Err(ConfigError::LoadError(_))
        ));

        let tmp = write_tmp_file("relay: [1, 2");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
