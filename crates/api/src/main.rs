use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hookreel_events::ProgressChannel;
use hookreel_pipeline::FileStateStore;
use hookreel_render::{HttpObjectStore, RenderApi};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hookreel_api::config::ServerConfig;
use hookreel_api::router::build_app_router;
use hookreel_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "hookreel_api=debug,hookreel_pipeline=debug,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(
        host = %config.host,
        port = %config.port,
        render_service = %config.render_service_url,
        state_path = %config.state_path.display(),
        "Loaded server configuration",
    );

    // --- Collaborators ---
    let render = Arc::new(RenderApi::new(config.render_service_url.clone()));
    let storage = Arc::new(HttpObjectStore::new(config.storage_url.clone()));
    let store = Arc::new(FileStateStore::new(config.state_path.clone()));

    // --- App state ---
    let state = AppState::new(config.clone(), render, storage, store);

    // Spawn the batch event logger (stops when the bus is dropped).
    let events_handle = tokio::spawn(hookreel_events::bus::log_events(state.events.subscribe()));

    if let Some(pending) = state.batches.init().await {
        tracing::warn!(
            total = pending.total_to_generate,
            generated = pending.generated_count,
            "Interrupted batch found; resume or decline via /api/v1/batches/pending",
        );
    }

    let batches = Arc::clone(&state.batches);
    let progress = Arc::clone(&state.progress);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&progress)))
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    batches.shutdown(shutdown_timeout).await;
    tracing::info!("Batch engine stopped");

    drop(batches);
    let _ = tokio::time::timeout(Duration::from_secs(5), events_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal, then end every open progress stream so
/// graceful shutdown does not wait on them forever.
async fn shutdown_signal(progress: Arc<ProgressChannel>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }

    progress.shutdown().await;
}
