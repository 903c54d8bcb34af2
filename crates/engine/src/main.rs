//! NPC chat engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use npcchat_engine::api;
use npcchat_engine::app::{App, Repositories};
use npcchat_engine::infrastructure::{
    clock::SystemClock,
    config::AppConfig,
    ollama::OllamaClient,
    ports::{ClockPort, LlmPort},
    resilient_llm::{ResilientLlmClient, RetryConfig},
    sqlite::{self, SqliteRepositories},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the binary may run from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "npcchat_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting NPC chat engine");

    let config = AppConfig::from_env();

    tracing::info!(path = %config.database_path, "Opening SQLite database");
    let pool = sqlite::connect(&config.database_path).await?;
    let repositories = Repositories::from(SqliteRepositories::new(pool));

    // HTTP deadline must outlast the per-reply deadline.
    let ollama = Arc::new(OllamaClient::new(
        &config.ollama_base_url,
        &config.ollama_model,
        config.llm_timeout + std::time::Duration::from_secs(5),
    ));
    let retry_config = RetryConfig::default().with_max_retries(config.llm_max_retries);
    tracing::info!(
        base_url = %config.ollama_base_url,
        model = %config.ollama_model,
        timeout_secs = config.llm_timeout.as_secs(),
        max_retries = retry_config.max_retries,
        "LLM client configured"
    );
    let llm: Arc<dyn LlmPort> = Arc::new(ResilientLlmClient::new(ollama, retry_config));
    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());

    let app = Arc::new(App::new(repositories, llm, clock, config.llm_timeout));

    let mut router = api::http::routes()
        .with_state(app)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = build_cors_layer(config.cors_allowed_origins.as_deref()) {
        router = router.layer(cors);
    }

    // Start server
    let addr: SocketAddr = config.bind_address().parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

fn build_cors_layer(allowed_origins: Option<&str>) -> Option<CorsLayer> {
    let allowed_origins = allowed_origins?;

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        // Clients send X-User-Id and JSON content types which trigger CORS preflights.
        .allow_headers([
            HeaderName::from_static(api::http::USER_ID_HEADER),
            axum::http::header::CONTENT_TYPE,
        ]);

    if allowed_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        if origins.is_empty() {
            return None;
        }

        cors = cors.allow_origin(origins);
    }

    Some(cors)
}
