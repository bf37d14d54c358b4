//! cortex-chat-server – entry point.
//!
//! Reads `CORTEX_CHAT_*` configuration, opens the SQLite conversation store,
//! builds the Cortex client and serves the chat UI and JSON API until
//! SIGINT/SIGTERM.

mod config;
mod entities;
mod error;
mod middleware;
mod routes;
mod schemas;
mod session;
mod state;
mod templates;

use std::net::SocketAddr;
use std::sync::Arc;

use cortex_chat_core::{CompletionClient, CortexSqlService, ServiceError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env();
    init_tracing(&cfg);
    info!(version = env!("CARGO_PKG_VERSION"), "cortex-chat-server starting");

    let store = SqliteStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");

    let service = cortex_service(&cfg)?;
    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        store: Arc::new(store),
        completion: CompletionClient::new(Arc::new(service)),
        templates: Arc::new(templates::environment()),
    });

    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, routes::build(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("cortex-chat-server stopped");
    Ok(())
}

/// `RUST_LOG` wins over `CORTEX_CHAT_LOG`; an unparsable filter falls back
/// to `info`.
fn init_tracing(cfg: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        cfg.log_level.parse::<EnvFilter>().unwrap_or_else(|e| {
            eprintln!(
                "WARN: CORTEX_CHAT_LOG='{}' is not a valid tracing filter ({e}); falling back to 'info'",
                cfg.log_level
            );
            EnvFilter::new("info")
        })
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);
    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Snowflake SQL API client from `CORTEX_CHAT_SNOWFLAKE_*`.
fn cortex_service(cfg: &Config) -> Result<CortexSqlService, ServiceError> {
    let sf = &cfg.snowflake;
    if sf.url.is_empty() || sf.token.is_empty() {
        warn!("CORTEX_CHAT_SNOWFLAKE_URL or CORTEX_CHAT_SNOWFLAKE_TOKEN unset; completions will fail");
    }
    let service = CortexSqlService::builder(&sf.url, &sf.token)
        .token_type(&sf.token_type)
        .warehouse(sf.warehouse.clone())
        .role(sf.role.clone())
        .database(sf.database.clone())
        .schema(sf.schema.clone())
        .timeout_secs(sf.timeout_secs)
        .build()?;
    info!(account_url = %sf.url, token_type = %sf.token_type, "cortex client ready");
    Ok(service)
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
