//! Main entry point for the Queue EWT service
//!
//! Loads configuration, wires the resolver and either serves HTTP requests
//! until a shutdown signal arrives or answers a single `--resolve` query.

use anyhow::Result;
use clap::Parser;
use queue_ewt::config::AppConfig;
use queue_ewt::metrics::{HttpServer, HttpServerConfig};
use queue_ewt::service::{AppState, HealthCheck};
use queue_ewt::types::EwtResponse;
use queue_ewt::utils::current_millis;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// Queue EWT Service - expected wait time for contact-center queues
#[derive(Parser)]
#[command(
    name = "queue-ewt",
    version,
    about = "Resolves the expected wait time of a contact-center queue in whole minutes",
    long_about = "Queue EWT answers contact-flow requests with a bounded expected wait time. \
                 A recent stored estimate is reused; otherwise the wait is derived from live \
                 queue metrics with a historical fallback, clamped to 1-20 minutes and stored."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Queue snapshots backing the metrics source
    #[arg(
        long,
        value_name = "FILE",
        help = "JSON file of per-queue live snapshots and historical averages"
    )]
    snapshots: Option<PathBuf>,

    /// Resolve a single locator and exit
    #[arg(
        long,
        value_name = "LOCATOR",
        help = "Resolve the expected wait for one queue locator, print the reply and exit"
    )]
    resolve: Option<String>,

    /// Channel hint for --resolve
    #[arg(long, value_name = "CHANNEL", requires = "resolve")]
    channel: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Log store health periodically
async fn health_check_task(app_state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while app_state.is_running() {
        interval.tick().await;

        match HealthCheck::check(app_state.clone()).await {
            Ok(health) => {
                info!(
                    "Health check: {} - table '{}', uptime {}s",
                    health.status, health.stats.table_name, health.stats.uptime_seconds
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Queue EWT Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   HTTP: {}:{}",
        config.service.http_host, config.service.http_port
    );
    info!("   Instance: {}", config.backend.instance_id);
    info!("   Table: {}", config.backend.table_name);
    info!(
        "   Freshness window: {}m, historical lookback: {}h",
        config.estimation.freshness_window_minutes, config.estimation.historical_lookback_hours
    );
    info!(
        "   Persistence policy: {:?}",
        config.estimation.persistence_policy
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    queue_ewt::config::validate_config(&config)?;
    Ok(config)
}

fn build_app_state(config: AppConfig, snapshots: Option<&PathBuf>) -> Result<AppState> {
    match snapshots {
        Some(path) => {
            info!("Loading queue snapshots from: {}", path.display());
            AppState::with_snapshot_file(config, path)
        }
        None => AppState::new(config),
    }
}

/// Answer one locator on stdout
async fn resolve_once(app_state: AppState, locator: &str, channel: Option<&str>) -> Result<()> {
    let resolution = app_state
        .resolver()
        .resolve(Some(locator), channel, current_millis())
        .await?;

    info!(
        "Resolved '{}' from {} in {} minutes",
        resolution.queue_id, resolution.source, resolution.minutes
    );
    println!(
        "{}",
        serde_json::to_string(&EwtResponse::from_minutes(resolution.minutes))?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    let app_state = match build_app_state(config.clone(), args.snapshots.as_ref()) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(locator) = &args.resolve {
        return resolve_once(app_state, locator, args.channel.as_deref()).await;
    }

    display_startup_banner(&config);

    let app_state = Arc::new(app_state);
    app_state.start();

    let server = Arc::new(
        HttpServer::new(
            HttpServerConfig {
                host: config.service.http_host.clone(),
                port: config.service.http_port,
            },
            app_state.metrics_collector(),
        )
        .with_app_state(app_state.clone()),
    );

    let mut server_task = {
        let server = server.clone();
        tokio::spawn(async move { server.start().await })
    };

    let health_task = {
        let app_state = app_state.clone();
        tokio::spawn(async move {
            health_check_task(app_state).await;
        })
    };

    info!("✅ Queue EWT Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("🛑 Shutdown signal received, beginning graceful shutdown...");
        }
        result = &mut server_task => {
            // Server exited on its own, usually a bind failure
            app_state.stop();
            health_task.abort();
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(anyhow::anyhow!("HTTP server task failed: {}", e)),
            };
        }
    }

    app_state.stop();
    health_task.abort();
    server.stop().await?;

    match tokio::time::timeout(config.shutdown_timeout(), server_task).await {
        Ok(Ok(Ok(()))) => info!("✅ Graceful shutdown completed successfully"),
        Ok(Ok(Err(e))) => error!("HTTP server exited with error: {}", e),
        Ok(Err(e)) => error!("HTTP server task failed: {}", e),
        Err(_) => warn!("⚠️  Shutdown timeout exceeded, forcing exit"),
    }

    info!("🛑 Queue EWT Service stopped");
    Ok(())
}
