use std::sync::Arc;

use anyhow::Context;
use sportmatch::{app, config::Config, db, identity::FirebaseIdentity, AppState};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sportmatch=info,tower_http=info")))
        .with(fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url, config.db_max_connections)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    db::migrate(&db_pool).await.context("creating schema")?;

    let identity = FirebaseIdentity::new(&config.identity_lookup_url, &config.identity_api_key)?;
    let app_state = AppState::new(db_pool, Arc::new(identity), &config);

    let app = app(app_state, config.session_idle());
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
