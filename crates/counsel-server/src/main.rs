mod routes;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get, post},
    Router,
};
use counsel_agent::{openai::OpenAiBackend, tavily::TavilyClient};
use counsel_core::{
    agent::{LlmBackend, SearchBackend},
    config::Config,
    db::SessionStore,
    extract::RegexExtractor,
    pipeline::Pipeline,
    retention,
    types::AgentRole,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use routes::AppState;

/// One explicitly constructed client per agent role — model and
/// temperature come from config, nothing is global.
fn build_backends(config: &Config) -> HashMap<AgentRole, Arc<dyn LlmBackend>> {
    let mut backends: HashMap<AgentRole, Arc<dyn LlmBackend>> = HashMap::new();
    for role in AgentRole::ALL {
        let rc = config.role(role);
        info!(
            role = role.as_str(),
            model = %rc.model,
            temperature = rc.temperature,
            "initializing agent backend"
        );
        backends.insert(
            role,
            Arc::new(
                OpenAiBackend::new(
                    &config.openai_base_url,
                    &config.openai_api_key,
                    &rc.model,
                    rc.temperature,
                )
                .with_timeout(config.llm_timeout_s),
            ),
        );
    }
    backends
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counsel_server=info,counsel_core=info,counsel_agent=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = format!("{}/counsel.db", config.data_dir);
    let store = SessionStore::open(&db_path)?;
    store.migrate()?;
    let store = Arc::new(store);
    let config = Arc::new(config);

    let backends = build_backends(&config);

    let search: Option<Arc<dyn SearchBackend>> = if config.tavily_api_key.is_empty() {
        info!("no search API key configured, research will run model-only");
        None
    } else {
        Some(Arc::new(TavilyClient::new(config.tavily_api_key.clone())))
    };

    let pipeline = Arc::new(Pipeline::new(backends, search, Arc::new(RegexExtractor)));

    // Retention sweep runs on its own schedule, decoupled from request
    // handling; failures there only log.
    let data_dir = PathBuf::from(&config.data_dir);
    retention::spawn_sweeper(
        vec![data_dir.join("tmp"), data_dir.join("users")],
        Duration::from_secs(config.retention_seconds),
        Duration::from_secs(config.retention_sweep_interval_s),
    );

    let state = Arc::new(AppState {
        store,
        pipeline,
        config: Arc::clone(&config),
    });

    let app = Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/chat", post(routes::chat))
        .route("/api/sessions", get(routes::list_sessions))
        .route("/api/sessions/:id", get(routes::get_session))
        .route("/api/sessions/:id", delete(routes::delete_session))
        .route("/api/sessions/:id/rename", post(routes::rename_session))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.web_bind, config.web_port);
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
