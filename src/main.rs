use std::sync::Arc;
use std::time::Duration;

use autohub::db::memory_service::{MemoryStore, user_service};
use autohub::server::config::ServerConfig;
use autohub::services::{
    auth_service,
    summary_service::{GeminiClient, SummaryService},
};
use autohub::version::VERSION;
use autohub::web::{AppState, create_axum_router};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "autohub.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Logging needs the configured directory, so configuration errors go to stderr.
    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!("Starting AutoHub server, version: {}", VERSION);

    let pool = MemoryStore::new_pool();

    match server_config.admin_password.as_deref() {
        Some(password) => {
            let password_hash =
                auth_service::hash_password(password, server_config.bcrypt_cost).await?;
            if user_service::ensure_admin(&pool, &server_config.admin_username, password_hash)
                .await?
            {
                info!(username = %server_config.admin_username, "Seeded administrator account.");
            }
        }
        None => warn!("ADMIN_PASSWORD not set; no administrator account was seeded."),
    }

    if server_config.api_key.is_none() {
        warn!("API_KEY not set; car summaries will use the fallback message.");
    }
    let gemini = GeminiClient::from_config(&server_config)?;
    let summary = SummaryService::new(Arc::new(gemini));

    let app_state = AppState::new(server_config.clone(), pool, summary);
    let draft_idle = Duration::from_secs(server_config.draft_idle_secs);
    let sweep_every = Duration::from_secs((server_config.draft_idle_secs / 4).clamp(1, 60));
    let _draft_sweeper = app_state.drafts.spawn_sweeper(draft_idle, sweep_every);
    let app = create_axum_router(app_state);

    let listener = tokio::net::TcpListener::bind(&server_config.bind_address).await?;
    info!("HTTP server listening on http://{}", server_config.bind_address);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Box::new)?;

    Ok(())
}
