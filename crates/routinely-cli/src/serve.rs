use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use routinely_assistant::{Assistant, OllamaClient};
use routinely_scheduler::{Notifier, Scheduler};
use routinely_server::AppState;
use routinely_storage::TaskStore;

/// Start the reminder scheduler and the HTTP API server.
pub async fn run_serve(port_override: Option<u16>) -> anyhow::Result<()> {
    let config = routinely_config::load_config().unwrap_or_default();
    let port = port_override.unwrap_or(config.server.port);

    let config_dir =
        routinely_config::ensure_config_dir().context("Failed to resolve config directory")?;
    let db_path = config_dir.join("routinely.db");
    let store =
        Arc::new(TaskStore::open(&db_path).context("Failed to open task database")?);

    let desktop = routinely_notify::detect_desktop();
    let speech = routinely_notify::detect_speech();
    let notifier = Arc::new(Notifier::new(
        store.clone(),
        desktop,
        speech,
        config.scheduler.speech_repeats,
        Duration::from_secs(config.scheduler.speech_pause_secs),
    ));
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        notifier,
        Duration::from_secs(config.scheduler.poll_interval_secs),
    ));
    scheduler.start().await?;
    info!("Reminder scheduler started");

    let ollama = OllamaClient::new(
        config.assistant.ollama_url.clone(),
        config.assistant.model.clone(),
    );
    info!(
        model = ollama.model(),
        url = %config.assistant.ollama_url,
        "Assistant configured"
    );
    let assistant = Arc::new(Assistant::new(ollama));

    let state = Arc::new(AppState {
        store,
        scheduler: scheduler.clone(),
        assistant,
        auth_token: config.server.auth_token.clone(),
    });

    let result = routinely_server::start_server(state, &config.server.host, port)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"));

    // Normally unreachable; if the server loop exits, shut the dispatcher down
    let _ = scheduler.stop().await;
    result
}
