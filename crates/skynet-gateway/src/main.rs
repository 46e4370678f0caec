use std::net::SocketAddr;
use std::sync::Arc;

use rusqlite::Connection;
use tracing::{info, warn};

mod app;
mod http;
mod ws;

use skynet_agent::{AgentOrchestrator, AgentRegistry};
use skynet_core::config::SkynetConfig;
use skynet_core::types::TriggerEnvelope;
use skynet_credentials::CredentialStore;
use skynet_memory::MemoryService;
use skynet_scheduler::{SchedulerEngine, SchedulerHandle, DEFAULT_MAX_CONCURRENT_JOBS};
use skynet_sessions::{SessionManager, TriggerOrigin};
use skynet_webhooks::WebhookStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skynet_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path > SKYNET_CONFIG env > ~/.skynet/skynet.toml
    let config_path = std::env::var("SKYNET_CONFIG").ok();
    let config: SkynetConfig = SkynetConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({}), using defaults", e);
        SkynetConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let db_path = config.database.path.clone();
    let credential_key = config.credential_key.clone();
    let agent_defs = config.agents.clone();

    let resolver = Arc::new(skynet_core::config::ConfigResolver::new(config));

    let credentials = Arc::new(CredentialStore::new(Connection::open(&db_path)?, &credential_key)?);
    let memory = MemoryService::open(&db_path)?;
    let session_conn = Connection::open(&db_path)?;
    skynet_sessions::db::init_db(&session_conn)?;
    let sessions = Arc::new(SessionManager::new(session_conn));
    let scheduler = Arc::new(SchedulerHandle::new(Connection::open(&db_path)?)?);
    let webhook_conn = Connection::open(&db_path)?;
    skynet_webhooks::db::init_db(&webhook_conn)?;
    let webhooks = Arc::new(WebhookStore::new(webhook_conn));

    let agents = Arc::new(AgentRegistry::from_defs(&agent_defs)?);
    let tools = Arc::new(skynet_agent::build_tool_registry());
    let orchestrator = Arc::new(AgentOrchestrator::new(
        agents.clone(),
        tools,
        memory,
        resolver.clone(),
        credentials.clone(),
    ));

    let state = Arc::new(app::AppState::new(
        resolver,
        sessions,
        scheduler,
        webhooks,
        agents,
        orchestrator,
        credentials,
    ));

    let (fired_tx, mut fired_rx) = tokio::sync::mpsc::channel(32);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine = SchedulerEngine::new(
        Connection::open(&db_path)?,
        fired_tx,
        DEFAULT_MAX_CONCURRENT_JOBS,
    )?;
    tokio::spawn(engine.run(shutdown_rx));

    let firing_state = state.clone();
    tokio::spawn(async move {
        while let Some(task) = fired_rx.recv().await {
            let runner = firing_state.clone();
            tokio::spawn(async move {
                let session_id = task
                    .session_id
                    .clone()
                    .unwrap_or_else(|| "scheduler-default".to_string());
                if let Err(e) = runner.sessions.get_or_create(&session_id, &session_id) {
                    warn!(%session_id, err = %e, "failed to ensure scheduled-task session exists");
                }
                let pending = match runner.sessions.create_pending(
                    TriggerOrigin::Scheduler,
                    &session_id,
                    &task.prompt,
                ) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        warn!(err = %e, "failed to record pending scheduled-task result");
                        None
                    }
                };

                let envelope = TriggerEnvelope {
                    session_id: session_id.clone(),
                    initial_prompt: task.prompt.clone(),
                    initial_agent: "root".to_string(),
                };
                let outcome = runner.run_trigger(envelope).await;

                if let (Some(pending), Some(text)) = (&pending, &outcome.final_text) {
                    if let Err(e) = runner.sessions.complete_pending(&pending.id, text) {
                        warn!(err = %e, "failed to complete pending scheduled-task result");
                    }
                }

                let broadcaster = runner.broadcasters.get_or_create(&session_id);
                broadcaster.publish(&skynet_protocol::session_ws::ServerFrame::ScheduledTaskResult {
                    task_name: task.name,
                    prompt: task.prompt,
                    response: outcome.final_text,
                });
            });
        }
    });

    let router = app::build_router(state.clone());

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("skynet gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    let _ = shutdown_tx.send(true);
    Ok(())
}
