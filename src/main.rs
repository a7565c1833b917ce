//! Postsmith server binary.
//!
//! Loads configuration, wires the orchestration engine to the Anthropic
//! gateway, and serves the chat WebSocket protocol.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use postsmith::adapters::http::chat::{chat_routes, ChatState};
use postsmith::adapters::{AnthropicConfig, AnthropicProvider, InMemoryDocumentReader};
use postsmith::application::handlers::{
    ClearMemoryHandler, GatewayHealthHandler, InterruptHandler, SubmitMessageHandler,
};
use postsmith::config::AppConfig;
use postsmith::domain::engine::{
    ConversationMemoryManager, MemoryConfig, SessionRegistry, StageGraph, StageGraphExecutor,
};
use postsmith::ports::AIProvider;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    let provider: Arc<dyn AIProvider> = Arc::new(AnthropicProvider::new(
        AnthropicConfig::new(
            config
                .ai
                .anthropic_api_key
                .clone()
                .expect("validated configuration carries an API key"),
        )
        .with_model(&config.ai.model)
        .with_timeout(config.ai.timeout())
        .with_max_retries(config.ai.max_retries),
    ));

    let registry = Arc::new(SessionRegistry::new());
    let memory = Arc::new(ConversationMemoryManager::new(MemoryConfig {
        window_size: config.engine.window_size,
        retained_after_summary: config.engine.retained_after_summary,
        summarize_threshold: config.engine.summarize_threshold,
    }));
    let executor = Arc::new(StageGraphExecutor::new(StageGraph::standard(
        provider.clone(),
        config.engine.confidence_floor,
    )));
    let documents = Arc::new(InMemoryDocumentReader::new());

    let state = ChatState {
        submit: Arc::new(SubmitMessageHandler::new(
            registry.clone(),
            memory.clone(),
            executor,
            provider.clone(),
            documents,
        )),
        interrupt: Arc::new(InterruptHandler::new(registry.clone())),
        clear_memory: Arc::new(ClearMemoryHandler::new(memory.clone())),
        gateway_health: Arc::new(GatewayHealthHandler::new(provider)),
        stream_buffer: config.engine.stream_buffer,
    };

    spawn_sweeper(registry, memory, &config);

    let addr = config.server.socket_addr();
    tracing::info!(%addr, environment = ?config.server.environment, "starting postsmith");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, chat_routes(state)).await?;

    Ok(())
}

/// Initializes the tracing subscriber from config.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));

    if config.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Periodically sweeps stale registry handles and idle session memory.
fn spawn_sweeper(
    registry: Arc<SessionRegistry>,
    memory: Arc<ConversationMemoryManager>,
    config: &AppConfig,
) {
    let interval = config.engine.sweep_interval();
    let idle = config.engine.session_idle();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let swept_handles = registry.sweep_inactive(idle);
            let swept_sessions = memory.sweep_inactive(idle);
            if swept_handles > 0 || swept_sessions > 0 {
                tracing::info!(swept_handles, swept_sessions, "inactivity sweep");
            }
        }
    });
}
