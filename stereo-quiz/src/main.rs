//! stereo-quiz - Stereotype annotation survey
//!
//! Loads the stereotype definitions, opens the results database and serves
//! the survey over HTTP until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use stereo_common::config::{resolve_config, ConfigOverrides};
use stereo_common::db::{count_rows, init_database};
use stereo_common::DefinitionsStore;
use stereo_quiz::{build_router, AppState};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Command-line arguments for stereo-quiz
#[derive(Parser, Debug)]
#[command(name = "stereo-quiz")]
#[command(about = "Stereotype annotation survey")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/stereo-quiz/config.toml)
    #[arg(short, long, env = "STEREO_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "STEREO_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "STEREO_PORT")]
    port: Option<u16>,

    /// Stereotype definitions CSV
    #[arg(short, long, env = "STEREO_DEFINITIONS")]
    definitions: Option<PathBuf>,

    /// SQLite results database
    #[arg(long, env = "STEREO_DATABASE")]
    database: Option<PathBuf>,

    /// Target regions each participant annotates
    #[arg(short = 'k', long, env = "STEREO_REGIONS_PER_PARTICIPANT")]
    regions_per_participant: Option<usize>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "STEREO_LOG_LEVEL")]
    log_level: Option<String>,

    /// Idle minutes before an unfinished quiz session is discarded
    #[arg(long, env = "STEREO_SESSION_TTL_MINUTES")]
    session_ttl_minutes: Option<u64>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            definitions_path: self.definitions.clone(),
            database_path: self.database.clone(),
            regions_per_participant: self.regions_per_participant,
            log_level: self.log_level.clone(),
            session_ttl_minutes: self.session_ttl_minutes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is resolved before tracing so the log level can come from it;
    // config file warnings emitted here are not shown.
    let config = resolve_config(&args.overrides(), args.config.as_deref())
        .context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting stereo-quiz v{}", env!("CARGO_PKG_VERSION"));
    info!("Definitions: {}", config.definitions_path.display());
    info!("Database: {}", config.database_path.display());
    info!("Regions per participant: {}", config.regions_per_participant);
    info!("Session idle timeout: {} min", config.session_ttl_minutes);

    let definitions = DefinitionsStore::load_or_unavailable(&config.definitions_path);
    if !definitions.is_available() {
        warn!("Serving without stereotype definitions; quizzes cannot be started");
    } else if definitions.regions().len() <= config.regions_per_participant {
        warn!(
            "Only {} regions defined; participants need {} besides their native region",
            definitions.regions().len(),
            config.regions_per_participant
        );
    }

    let pool = match init_database(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open results database: {}", e);
            return Err(e.into());
        }
    };

    let (annotations, familiarity) = count_rows(&pool).await?;
    info!(
        "Results database ready ({} annotations, {} familiarity ratings)",
        annotations, familiarity
    );

    let state = AppState::new(pool.clone(), definitions, config.regions_per_participant)
        .with_session_ttl(config.session_ttl());

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut sweep = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            sweep.tick().await;
            let dropped = sessions.prune_expired().await;
            if dropped > 0 {
                debug!("Discarded {} idle sessions", dropped);
            }
        }
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("stereo-quiz listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
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
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
