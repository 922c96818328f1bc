mod config;
mod keygen;
mod observability;

use clap::Parser;
use config::{Config, ConfigError};
use observability::MetricsInitError;
use relay::config::ValidationError;
use relay::errors::RelayError;
use std::path::PathBuf;
use std::process::ExitCode;

const SERVER_KEY_ENV: &str = "FCM_SERVER_KEY";

#[derive(Parser)]
#[command(name = "pushgate", version, about = "WebPush to FCM relay")]
enum CliCommand {
    /// Serve the relay and its admin listener
    Relay {
        #[arg(long, short, default_value = "pushgate.yaml")]
        config: PathBuf,
    },
    /// Print a new P-256 key pair and auth secret for an application server
    GenerateKey,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Metrics(#[from] MetricsInitError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("relay stopped: {0}")]
    Relay(#[from] RelayError),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    let result = match cli {
        CliCommand::Relay { config } => run_relay(&config),
        CliCommand::GenerateKey => {
            let keys = keygen::generate();
            println!("public key:  {}", keys.public_key);
            println!("private key: {}", keys.private_key);
            println!("auth secret: {}", keys.auth_secret);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "pushgate exited with an error");
            eprintln!("pushgate: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_relay(path: &std::path::Path) -> Result<(), CliError> {
    let mut config = Config::from_file(path)?;
    config.apply_server_key_fallback(std::env::var(SERVER_KEY_ENV).ok());

    let _sentry = observability::init_logging(config.common.logging.as_ref());
    observability::init_metrics(config.common.metrics.as_ref())?;
    config.relay.validate()?;

    tracing::info!(config = %path.display(), "starting relay");
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(relay::run(config.relay))?;

    Ok(())
}
