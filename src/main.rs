//! amqp-link - Main Entry Point
//!
//! Connects to the configured broker, holds the channel until a termination
//! signal runs the shutdown sequence, then exits.

use amqp_link::config::ServiceConfig;
use amqp_link::error::redact_endpoint;
use amqp_link::lifecycle::{ConnectionEstablisher, SignalRegistrar};
use amqp_link::observability::{init_default_logging, init_logging};
use amqp_link::service_span;
use amqp_link::transport::amqp::AmqpConnector;
use amqp_link::LinkError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Instrument};

/// AMQP connection lifecycle manager
#[derive(Parser)]
#[command(name = "amqp-link")]
#[command(about = "Single AMQP connection with ordered, one-shot shutdown")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "AMQP_LINK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and hold the channel until a termination signal arrives
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from the file, so fall back to env-only settings
            let _ = init_default_logging();
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let settings = config.logging_settings().with_env_overrides();
    if let Err(e) = init_logging(&settings) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let span = service_span!(settings);
    let result = async {
        info!("Starting amqp-link v{}", env!("CARGO_PKG_VERSION"));
        match cli.command {
            Commands::Run => run_service(config).await,
            Commands::Config { show } => handle_config_command(&config, show),
        }
    }
    .instrument(span)
    .await;

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<ServiceConfig, LinkError> {
    if let Some(path) = config_path {
        return Ok(ServiceConfig::load_from_file(path)?);
    }

    let default_paths = ["amqp-link.toml", "config/amqp-link.toml"];
    for path_str in default_paths {
        let path = PathBuf::from(path_str);
        if path.exists() {
            return Ok(ServiceConfig::load_from_file(&path)?);
        }
    }

    Err(LinkError::internal_error(
        "No configuration file found. Provide one with -c/--config or create amqp-link.toml",
    ))
}

async fn run_service(config: ServiceConfig) -> Result<(), LinkError> {
    let endpoint = config.broker_endpoint()?;

    let establisher = ConnectionEstablisher::new(AmqpConnector::new(), SignalRegistrar::new())
        .with_close_timeout(config.close_timeout());

    let Some(established) = establisher
        .establish_watched(&endpoint, config.connection_name())
        .await
    else {
        return Err(LinkError::NotConnected);
    };

    // The messaging layer would take the channel from here
    let _channel = established.channel;
    let mut shutdown = established.shutdown;

    info!("Holding broker channel until termination signal");
    if shutdown.wait_closed().await? {
        info!("Broker resources released");
        Ok(())
    } else {
        Err(LinkError::internal_error(
            "broker resources did not close cleanly",
        ))
    }
}

fn handle_config_command(config: &ServiceConfig, show: bool) -> Result<(), LinkError> {
    if show {
        let shown = redacted(config);

        println!("Current configuration:");
        let rendered = toml::to_string_pretty(&shown)
            .map_err(|e| LinkError::internal_error(e.to_string()))?;
        println!("{rendered}");
    }

    info!("Configuration validation complete");
    Ok(())
}

/// Copy of `config` with credentials removed from every URL it carries
fn redacted(config: &ServiceConfig) -> ServiceConfig {
    let mut shown = config.clone();
    for url in [
        shown.broker.endpoint.as_mut(),
        shown.logging.sink_url.as_mut(),
    ]
    .into_iter()
    .flatten()
    {
        *url = redact_endpoint(url);
    }
    shown
}
