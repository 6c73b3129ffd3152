use std::sync::Arc;

use hookreel_core::types::Percent;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hookreel_watch::{ProgressClient, SseProgressSource, WatchConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hookreel_watch=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let config = WatchConfig::from_env().expect("Invalid watcher configuration");
    tracing::info!(url = %config.progress_url, max_retries = config.retry.max_retries, "Watching progress");

    let source = Arc::new(SseProgressSource::new(config.progress_url.clone()));
    let client = ProgressClient::new(source, config.retry);
    let mut progress = client.progress();
    let mut state = client.state();

    let cancel = CancellationToken::new();
    let printer_cancel = cancel.clone();
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = printer_cancel.cancelled() => break,
                changed = progress.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Some(value) = *progress.borrow_and_update() {
                        println!("{value:>3}% {}", bar(value));
                    }
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *state.borrow_and_update();
                    tracing::info!(state = current.as_str(), "Connection state");
                }
            }
        }
    });

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received SIGINT (Ctrl-C), stopping");
            ctrl_c_cancel.cancel();
        }
    });

    let result = client.run(cancel.clone()).await;
    cancel.cancel();
    let _ = printer.await;

    if let Err(e) = result {
        tracing::error!(error = %e, "Progress watcher stopped");
        std::process::exit(1);
    }
}

fn bar(value: Percent) -> String {
    let filled = usize::from(value.min(100)) / 2;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(50 - filled))
}
