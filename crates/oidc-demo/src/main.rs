//! OIDC demo relying party - Entry Point
//!
//! Reads configuration from the environment (and `.env`), discovers the
//! identity provider and serves the login flow over HTTPS.

use std::fs::{File, OpenOptions};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use oidc_demo::{ProviderClient, config::Config, pidfile::PidFile, server::OidcServer};

#[derive(Parser, Debug)]
#[command(name = "oidc-demo")]
#[command(about = "OpenID Connect relying-party demo")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Write logs to {OIDC_LOG_PATH}/oidc_demo.log instead of stderr
    #[arg(long)]
    log_file: bool,

    /// Serve plain HTTP (TLS terminated by a proxy in front)
    #[arg(long)]
    plain_http: bool,
}

fn init_tracing(log_level: &str, json: bool, file: Option<File>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let (writer, ansi) = match file {
        Some(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json().with_writer(writer)).init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact().with_ansi(ansi).with_writer(writer))
            .init();
    }
}

fn open_log_file(config: &Config) -> anyhow::Result<File> {
    let path = config.log_file();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env();

    let log_file = match (&config, cli.log_file) {
        (Ok(config), true) => Some(open_log_file(config)?),
        _ => None,
    };
    init_tracing(&cli.log_level, cli.json_logs, log_file);

    let config = match config {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e).context("loading configuration");
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        provider = %config.provider_url,
        callback = %config.callback_url,
        "Starting OIDC demo"
    );

    // Both TLS backends may be compiled in; pick one explicitly.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let provider = ProviderClient::discover(Arc::clone(&config))
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Provider discovery failed"))
        .context("discovering identity provider")?;

    let metadata = provider.metadata();
    tracing::info!(
        issuer = %metadata.issuer,
        authorization_endpoint = %metadata.authorization_endpoint,
        token_endpoint = %metadata.token_endpoint,
        "Discovered provider"
    );

    let pid_file = PidFile::create(config.pid_file())
        .with_context(|| format!("writing PID file {}", config.pid_file().display()))?;
    tracing::info!(path = %pid_file.path().display(), "Wrote PID file");

    let server = OidcServer::new(config, provider);
    let result = if cli.plain_http { server.run_plain().await } else { server.run_tls().await };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Server failed");
    }
    result
}
