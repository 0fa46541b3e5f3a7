use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quotevote::auth::token::{generate_secret, TokenService};
use quotevote::config::{Cli, Config};
use quotevote::quotes::archive::spawn_archiver;
use quotevote::state::AppState;
use quotevote::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let db_path = config.db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;

    let secret = match config.auth.jwt_secret.clone() {
        Some(secret) => secret,
        None => {
            tracing::warn!(
                "No JWT secret configured; generated one for this run. \
                 Tokens will not survive a restart."
            );
            generate_secret()
        }
    };
    let tokens = TokenService::new(
        secret.as_bytes(),
        chrono::Duration::hours(config.auth.token_hours),
    )?;

    let state = AppState::new(pool, config.clone(), tokens);

    if config.archive.enabled {
        let _archiver = spawn_archiver(
            state.quotes.clone(),
            state.clock,
            Duration::from_secs(config.archive.interval_secs.max(1)),
        );
    }

    let app = routes::app(state)?;

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
