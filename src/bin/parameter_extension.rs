//! parameter-extension: Lambda extension binary.
//!
//! Deployed in a layer under `/opt/extensions/`. The host starts it before
//! the function runtime and supplies `AWS_LAMBDA_RUNTIME_API`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use parameter_extension::runner::{self, Extension};
use parameter_extension::{Config, LifecycleClient, SsmParameterStore};

/// Lambda extension serving a cached SSM parameter on loopback HTTP.
#[derive(Parser)]
#[command(name = "parameter-extension")]
#[command(version = parameter_extension::PKG_VERSION)]
#[command(about = "Serve a cached SSM parameter to the function over loopback HTTP")]
struct Args {
    /// Host and port of the Lambda runtime API.
    #[arg(long, env = "AWS_LAMBDA_RUNTIME_API")]
    runtime_api: String,

    /// Path to a TOML configuration file.
    #[arg(short, long, env = "PARAMETER_EXTENSION_CONFIG")]
    config: Option<PathBuf>,

    /// Loopback port for the local endpoint.
    #[arg(short, long, env = "EXTENSION_HTTP_PORT")]
    port: Option<u16>,

    /// Name of the parameter to serve.
    #[arg(long, env = "EXTENSION_PARAMETER_NAME")]
    parameter_name: Option<String>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with_ansi(false)
        .init();

    info!(version = parameter_extension::version_string(), "extension starting");

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let client = LifecycleClient::new(&args.runtime_api).extension_name(&config.extension.name);
    let store = SsmParameterStore::from_env()
        .await
        .with_decryption(config.parameter.with_decryption);

    let shutdown = CancellationToken::new();
    runner::cancel_on_signal(shutdown.clone());

    match Extension::new(client, Arc::new(store), config).run(shutdown).await {
        Ok(reason) => {
            info!(?reason, "extension stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "extension failed");
            ExitCode::FAILURE
        }
    }
}

/// Config file (if any), then CLI/env overrides.
fn load_config(args: &Args) -> parameter_extension::Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(name) = &args.parameter_name {
        config.parameter.name = name.clone();
    }
    config.validate()?;
    Ok(config)
}
