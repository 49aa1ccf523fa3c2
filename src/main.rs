//! hotenv server.
//!
//! Serves the JSON API and HTML pages, and applies `.env` changes at runtime:
//! a new `DATABASE_URL` reconnects the pool, a new `PORT` or `NODE_ENV`
//! moves the listener.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use hotenv::config::{ConfigSource, WatchStrategy, WatcherConfig};
use hotenv::db::PgConnector;
use hotenv::http::PageOptions;
use hotenv::lifecycle::{launch, signals, RuntimeOptions};
use hotenv::observability::logging::{init_tracing, LogFormat};
use hotenv::observability::metrics::init_metrics;

#[derive(Parser, Debug)]
#[command(name = "hotenv", version, about = "Web server with .env hot reload")]
struct Args {
    /// Path to the dotenv file (default: ./.env, then ../.env)
    #[arg(long, env = "HOTENV_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Address the listener binds; the port comes from PORT
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// How to observe the dotenv file
    #[arg(long, value_enum, default_value_t = WatchStrategy::Auto)]
    watch: WatchStrategy,

    #[arg(long, default_value_t = 100)]
    debounce_ms: u64,

    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Bound on database connect and liveness probe
    #[arg(long, default_value_t = 5)]
    connect_timeout_secs: u64,

    /// Time in-flight requests get before the listener is aborted
    #[arg(long, default_value_t = 10)]
    drain_timeout_secs: u64,

    /// Page template used in development
    #[arg(long, default_value = "index.html")]
    template: PathBuf,

    /// Client build directory served in production
    #[arg(long, default_value = "dist/client")]
    static_dir: PathBuf,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    /// Also read keys missing from the file from the process environment
    #[arg(long)]
    env_fallback: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.log_format)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "hotenv starting");

    if let Some(addr) = args.metrics_address {
        if let Err(e) = init_metrics(addr) {
            tracing::error!(metrics_address = %addr, error = %e, "Failed to start metrics exporter");
        }
    }

    let path = match args.env_file {
        Some(path) => path,
        None => ConfigSource::locate(&std::env::current_dir()?),
    };
    let mut source = ConfigSource::new(path);
    if args.env_fallback {
        source = source.with_environment_fallback();
    }

    let options = RuntimeOptions {
        host: args.host,
        watcher: WatcherConfig {
            strategy: args.watch,
            debounce: Duration::from_millis(args.debounce_ms),
            poll_interval: Duration::from_millis(args.poll_interval_ms),
        },
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        drain_timeout: Duration::from_secs(args.drain_timeout_secs),
        pages: PageOptions {
            template: args.template,
            static_dir: args.static_dir,
        },
    };

    let connector = Arc::new(PgConnector::default());
    let runtime = launch(source, connector, options).await?;

    signals::shutdown_signal().await;
    runtime.shutdown().await;
    Ok(())
}
