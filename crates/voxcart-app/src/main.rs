//! Voxcart application binary - composition root.
//!
//! 1. Load configuration from TOML (CLI overrides applied)
//! 2. Open SQLite for call records and the agent audit trail
//! 3. Build the agent orchestrator over the commerce gateway
//! 4. Start the cleanup sweeper and the call session manager
//! 5. Serve the status API and the telephony media stream until Ctrl-C

use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;

use voxcart_agents::{
    AgentOrchestrator, AgentRegistry, CleanupSweeper, CommerceConnector, InMemoryCommerce,
};
use voxcart_app::cli::CliArgs;
use voxcart_app::{create_router, AppState, HttpCommerceConnector};
use voxcart_calls::CallSessionManager;
use voxcart_core::config::VoxcartConfig;
use voxcart_core::events::CallEvent;
use voxcart_speech::WebSocketTransport;
use voxcart_storage::{ActionRepository, CallRepository, Database};

/// Log call lifecycle events until the manager goes away.
async fn log_call_events(mut events: broadcast::Receiver<CallEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match &event {
                CallEvent::CallStarted { .. } | CallEvent::CallEnded { .. } => {
                    tracing::info!(call_id = %event.call_id(), event = event.event_name(), "Call event")
                }
                CallEvent::SpeechFailed { reason, .. } => {
                    tracing::warn!(call_id = %event.call_id(), reason = %reason, "Speech session failed")
                }
                _ => tracing::debug!(call_id = %event.call_id(), event = ?event, "Call event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Call event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn commerce_connector(
    config: &VoxcartConfig,
) -> Result<Arc<dyn CommerceConnector>, Box<dyn std::error::Error>> {
    if config.commerce.base_url.trim().is_empty() {
        tracing::warn!("commerce.base_url not set; using the in-memory catalogue");
        return Ok(Arc::new(InMemoryCommerce::new()));
    }
    let connector = HttpCommerceConnector::from_config(&config.commerce)?;
    tracing::info!(base_url = %config.commerce.base_url, "Commerce gateway configured");
    Ok(Arc::new(connector))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = VoxcartConfig::load_or_default(&config_file);
    args.apply(&mut config);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Voxcart v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");
    config.validate()?;

    // Storage.
    let data_dir = config.general.data_dir_path();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join(&config.storage.db_filename);
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Agents.
    let orchestrator = Arc::new(AgentOrchestrator::new(
        AgentRegistry::with_defaults(),
        commerce_connector(&config)?,
        Arc::new(ActionRepository::new(Arc::clone(&db))),
        &config.agents,
    ));

    let sweeper = Arc::new(CleanupSweeper::new(Arc::clone(&orchestrator)));
    let sweeper_task = {
        let sweeper = Arc::clone(&sweeper);
        tokio::spawn(async move { sweeper.run().await })
    };

    // Calls.
    let transport = Arc::new(WebSocketTransport::from_config(&config.speech)?);
    let call_records = CallRepository::new(Arc::clone(&db));
    let calls = CallSessionManager::new(
        Arc::clone(&orchestrator),
        transport,
        config.speech.clone(),
        Some(call_records.clone()),
    );
    tokio::spawn(log_call_events(calls.subscribe()));

    // Server.
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let media_path = config.server.media_stream_path.clone();
    let state = AppState::new(config, Arc::clone(&calls), Some(call_records));
    let router = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind - is another instance running?");
            return Err(e.into());
        }
    };
    tracing::info!(addr = %addr, media_path = %media_path, "Server listening");

    // Hang up live calls first so their sockets close and serve() can drain.
    let shutdown_calls = Arc::clone(&calls);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
            shutdown_calls.shutdown();
        })
        .await?;

    sweeper.shutdown();
    let _ = sweeper_task.await;
    let cancelled = orchestrator.cancel_all();
    tracing::info!(cancelled, "Voxcart stopped");
    Ok(())
}
